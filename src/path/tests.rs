use serde_json::json;

use super::*;

#[test]
fn get_nested_object() {
    let state = json!({ "counter": { "value": 3 } });
    assert_eq!(get(&state, "counter.value"), Some(&json!(3)));
    assert_eq!(get(&state, "counter"), Some(&json!({ "value": 3 })));
}

#[test]
fn get_root() {
    let state = json!({ "a": 1 });
    assert_eq!(get(&state, ""), Some(&state));
}

#[test]
fn get_array_index() {
    let state = json!({ "items": [10, { "name": "x" }] });
    assert_eq!(get(&state, "items.0"), Some(&json!(10)));
    assert_eq!(get(&state, "items.1.name"), Some(&json!("x")));
    assert_eq!(get(&state, "items.2"), None);
    assert_eq!(get(&state, "items.first"), None);
}

#[test]
fn get_missing() {
    let state = json!({ "a": { "b": 1 } });
    assert_eq!(get(&state, "a.c"), None);
    assert_eq!(get(&state, "a.b.c"), None);
    assert_eq!(get_or_null(&state, "x.y"), Value::Null);
}

#[test]
fn from_segments_joins_with_dot() {
    assert_eq!(StatePath::from(["counters", "test"]).as_str(), "counters.test");
    assert_eq!(StatePath::from(vec!["a"]).as_str(), "a");
    assert_eq!(StatePath::from(Vec::<String>::new()).as_str(), "");
    assert!(StatePath::default().is_root());
}

#[test]
fn join_segment() {
    assert_eq!(StatePath::default().join("a").join("b").as_str(), "a.b");
}

#[test]
fn ancestors_innermost_first() {
    let all: Vec<_> = with_ancestors("a.b.c").collect();
    assert_eq!(all, ["a.b.c", "a.b", "a"]);
    assert_eq!(with_ancestors("").count(), 0);
}
