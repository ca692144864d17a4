use std::{cell::Cell, rc::Rc};

use assert_call::{call, CallRecorder};
use futures::executor::block_on;
use serde_json::{json, Value};

use super::*;
use crate::{test_utils::counter, ActionSpec, ChangedPaths};

fn store() -> Store {
    Store::builder().mid("test").build()
}

#[test]
fn duplicate_component_is_rejected() {
    let store = store();
    store.component(counter()).unwrap();
    let e = store.component(counter()).unwrap_err();
    assert!(matches!(e, Error::DuplicateComponent { .. }));
    assert_eq!(
        e.to_string(),
        "module test: component counter has already been defined"
    );
    assert_eq!(store.components(), vec!["counter".to_string()]);
}

#[test]
fn duplicate_selector_across_components() {
    let store = store();
    store.component(counter()).unwrap();
    let e = store
        .component(Component::new("other").selector("value", "other"))
        .unwrap_err();
    assert!(matches!(e, Error::DuplicateSelector { ref id, .. } if id == "value"));
}

#[test]
fn rejected_component_registers_nothing() {
    let store = store();
    store.component(counter()).unwrap();
    let before = store.state();
    let e = store
        .component(
            Component::new("broken")
                .state(json!({ "fresh": true }))
                .action("reset", ActionSpec::none())
                .selector("fresh", "fresh")
                .selector("value", "counter.value"),
        )
        .unwrap_err();
    assert!(matches!(e, Error::DuplicateSelector { .. }));
    assert!(Rc::ptr_eq(&before, &store.state()));
    assert!(store.action("reset").is_none());
    assert!(store.selector("fresh").is_err());
    assert_eq!(store.components(), vec!["counter".to_string()]);
}

#[test]
fn state_is_merged_recursively() {
    let store = store();
    store.component(counter()).unwrap();
    store
        .component(Component::new("flags").state(json!({ "counter": { "enabled": true }, "flags": [] })))
        .unwrap();
    assert_eq!(
        *store.state(),
        json!({ "counter": { "value": 0, "enabled": true }, "flags": [] })
    );
}

#[test]
fn state_collision_names_the_path() {
    let store = store();
    store.component(counter()).unwrap();
    let e = store
        .component(Component::new("clash").state(json!({ "counter": { "value": 5 } })))
        .unwrap_err();
    assert_eq!(
        e.to_string(),
        "module test: component clash: state collision at counter.value"
    );

    store
        .component(Component::new("same").state(json!({ "counter": { "value": 0 } })))
        .unwrap();
}

#[test]
fn arrays_never_merge() {
    let store = store();
    store
        .component(Component::new("a").state(json!({ "list": [1] })))
        .unwrap();
    let e = store
        .component(Component::new("b").state(json!({ "list": [2] })))
        .unwrap_err();
    assert!(matches!(e, Error::StateCollision { ref path, .. } if path == "list"));
}

#[test]
fn empty_state_is_skipped() {
    let store = store();
    let before = store.state();
    store
        .component(Component::new("empty").state(json!({})))
        .unwrap();
    store
        .component(Component::new("null").state(Value::Null))
        .unwrap();
    assert!(Rc::ptr_eq(&before, &store.state()));
}

#[test]
fn prefixed_types() {
    let store = store();
    store
        .component(
            Component::new("list")
                .prefix("myList")
                .state(json!({ "items": [] }))
                .action("addItem", ActionSpec::args(["item"]))
                .reducer("addItem", |_, action, draft| {
                    let item = action.field("item").cloned().unwrap_or(Value::Null);
                    if let Some(items) = draft["items"].as_array_mut() {
                        items.push(item);
                    }
                    Ok(())
                }),
        )
        .unwrap();
    let add = store.action("addItem").unwrap();
    assert_eq!(add.ty().to_string(), "MY_LIST_ADD_ITEM");
    let changed = add.call([json!("x")]).unwrap();
    assert_eq!(changed, Some(ChangedPaths::from_iter(["items", "items.0"])));
    assert_eq!(store.state()["items"], json!(["x"]));
}

#[test]
fn missing_route() {
    let store = store();
    let e = store
        .component(Component::new("fx").route("increment", "nothing"))
        .unwrap_err();
    assert_eq!(
        e.to_string(),
        "module test: component fx: route increment has no matching effect nothing"
    );
}

#[test]
fn duplicate_helper() {
    let store = store();
    let helper = |_: &mut Value, _: &[Value]| Ok(Value::Null);
    store
        .component(Component::new("a").helper("h", helper))
        .unwrap();
    let e = store
        .component(Component::new("b").helper("h", helper))
        .unwrap_err();
    assert!(matches!(e, Error::DuplicateHelper { ref name, .. } if name == "h"));
}

#[test]
fn helpers_run_inside_reducers() {
    let store = store();
    store.component(counter()).unwrap();
    store
        .component(
            Component::new("math")
                .helper("double", |draft, _| {
                    let v = draft["counter"]["value"].as_i64().unwrap_or(0);
                    draft["counter"]["value"] = json!(v * 2);
                    Ok(json!(v * 2))
                })
                .reducer("increment", |cx, _, draft| {
                    cx.call_helper("double", draft, &[])?;
                    Ok(())
                }),
        )
        .unwrap();
    store.action("increment").unwrap().call([json!(3)]).unwrap();
    assert_eq!(store.state()["counter"]["value"], json!(6));

    let e = ModuleContext::new(&store).helper("missing").err().unwrap();
    assert!(matches!(e, Error::UnknownHelper { .. }));
}

#[test]
fn scope_is_loaded_by_resolve() {
    let mut cr = CallRecorder::new();
    let store = store();
    store
        .component(
            Component::new("remote")
                .scope(|| async { Ok(json!({ "url": "https://example.com" })) })
                .effect("log", |_, _| {
                    call!("effect");
                    Effect::done()
                })
                .route("ping", "log")
                .on_load(|cx| call!("loaded {}", cx.scope("remote").unwrap_or_default())),
        )
        .unwrap();
    assert_eq!(store.pending_scopes(), 1);
    assert_eq!(store.scope("remote"), None);

    store.dispatch(Action::new("PING")).unwrap();
    cr.verify(());

    assert_eq!(block_on(store.resolve()).unwrap(), 1);
    cr.verify(r#"loaded {"url":"https://example.com"}"#);
    assert_eq!(block_on(store.resolve()).unwrap(), 0);

    store.dispatch(Action::new("PING")).unwrap();
    cr.verify("effect");
}

#[test]
fn scope_id_overrides_the_key() {
    let store = store();
    store
        .component(
            Component::new("remote")
                .scope_id("api")
                .scope(|| async { Ok(json!(1)) }),
        )
        .unwrap();
    block_on(store.resolve()).unwrap();
    assert_eq!(store.scope("api"), Some(json!(1)));
}

#[test]
fn failing_scope() {
    let store = store();
    store
        .component(Component::new("remote").scope(|| async { Err("offline".into()) }))
        .unwrap();
    let e = block_on(store.resolve()).unwrap_err();
    assert_eq!(
        e.to_string(),
        "module test: failed to load scope remote: offline"
    );
}

#[test]
fn loads_on_action_defers_routes() {
    let mut cr = CallRecorder::new();
    let store = store();
    store.component(counter()).unwrap();
    let loads = Rc::new(Cell::new(0));
    let loads2 = loads.clone();
    store
        .component(
            Component::new("lazy")
                .loads_on_action("INCREMENT")
                .effect("log", |_, action| {
                    call!("effect {}", action.i64_or("by", 1));
                    Effect::done()
                })
                .route("increment", "log")
                .on_load(move |_| loads2.set(loads2.get() + 1)),
        )
        .unwrap();
    assert!(!store.has_effects(&"INCREMENT".into()));
    assert_eq!(loads.get(), 0);
    assert_eq!(store.0.tables.borrow().deferred.len(), 1);

    store.action("increment").unwrap().call([json!(2)]).unwrap();
    cr.verify("effect 2");
    assert!(store.0.tables.borrow().deferred.is_empty());
    store.action("increment").unwrap().call([json!(3)]).unwrap();
    cr.verify("effect 3");
    assert_eq!(loads.get(), 1);
    assert_eq!(store.action_condition_count(), 0);
}

#[test]
fn on_load_runs_immediately_without_scope() {
    let mut cr = CallRecorder::new();
    let store = store();
    store
        .component(Component::new("plain").on_load(|cx| call!("loaded {}", cx.components().len())))
        .unwrap();
    cr.verify("loaded 1");
}
