use serde_json::json;

use super::*;

fn children(s: &Selector) -> Vec<&str> {
    s.children().collect()
}

#[test]
fn leaf_watches_its_path() {
    let s = Selector::compile("counter.value").unwrap();
    assert_eq!(children(&s), ["counter.value"]);
    assert!(!s.is_dynamic());
}

#[test]
fn array_path_is_joined() {
    let s = Selector::compile(["counter", "value"]).unwrap();
    assert_eq!(children(&s), ["counter.value"]);
}

#[test]
fn composite_propagates_to_every_ancestor() {
    let s = Selector::compile(SelectorSpec::composite([
        ("some", SelectorSpec::from("counter.value")),
        (
            "deep",
            SelectorSpec::composite([("last", "counter.lastChanged")]),
        ),
    ]))
    .unwrap();
    assert_eq!(children(&s), ["counter.lastChanged", "counter.value"]);
    let deep = s.get("deep").unwrap();
    assert_eq!(children(deep), ["counter.lastChanged"]);
}

#[test]
fn dynamic_leaves_propagate() {
    let f = DynamicPath::new(|props: &Value, _: &Value| {
        StatePath::from(["counters", props["id"].as_str().unwrap_or("default")])
    });
    let s = Selector::compile(SelectorSpec::composite([
        ("byId", SelectorSpec::Composite(BTreeMap::from([(
            "inner".to_string(),
            SelectorSpec::Dynamic(f.clone()),
        )]))),
        ("total", SelectorSpec::from("shared")),
    ]))
    .unwrap();
    assert_eq!(children(&s), ["shared"]);
    assert_eq!(s.dynamic(), [f.clone()]);
    assert_eq!(s.get("byId").unwrap().dynamic(), [f]);
}

#[test]
fn compiled_selector_is_reused() {
    let inner = Selector::compile(SelectorSpec::composite([("v", "counter.value")])).unwrap();
    let outer = Selector::compile(SelectorSpec::composite([
        ("inner", SelectorSpec::from(&inner)),
        ("other", SelectorSpec::from("other")),
    ]))
    .unwrap();
    assert!(outer.get("inner").unwrap().ptr_eq(&inner));
    assert_eq!(children(&outer), ["counter.value", "other"]);
}

#[test]
fn empty_path_is_invalid() {
    assert!(Selector::compile("").is_err());
    assert!(Selector::compile(SelectorSpec::composite([("a", "")])).is_err());
}

#[test]
fn from_value_rejects_non_selectors() {
    assert!(SelectorSpec::from_value(&json!(1)).is_err());
    assert!(SelectorSpec::from_value(&json!(null)).is_err());
    assert!(SelectorSpec::from_value(&json!(["a", 1])).is_err());
    let spec = SelectorSpec::from_value(&json!({ "v": "a.b", "w": ["c", "d"] })).unwrap();
    let s = Selector::compile(spec).unwrap();
    assert_eq!(children(&s), ["a.b", "c.d"]);
}

#[test]
fn select_composite() {
    let state = json!({ "counter": { "value": 3, "lastChanged": 9 } });
    let s = Selector::compile(SelectorSpec::composite([
        ("value", SelectorSpec::from("counter.value")),
        (
            "deep",
            SelectorSpec::composite([("last", "counter.lastChanged")]),
        ),
        ("missing", SelectorSpec::from("nope.here")),
    ]))
    .unwrap();
    assert_eq!(
        s.select(&state, &Value::Null),
        json!({ "value": 3, "deep": { "last": 9 }, "missing": null })
    );
}

#[test]
fn select_dynamic_uses_props() {
    let state = json!({ "counters": { "a": 1, "b": 2 } });
    let s = Selector::compile(SelectorSpec::dynamic(|props: &Value, _: &Value| {
        vec!["counters".to_string(), props["id"].as_str().unwrap_or("a").to_string()]
    }))
    .unwrap();
    assert_eq!(s.select(&state, &json!({ "id": "b" })), json!(2));
    assert_eq!(s.select(&state, &Value::Null), json!(1));
}
