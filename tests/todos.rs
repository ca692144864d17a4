use std::rc::Rc;

use assert_call::{call, CallRecorder};
use futures::{channel::oneshot, executor::block_on};
use serde_json::{json, Value};
use state_modules::*;

use test_utils::record;

fn todos() -> Component {
    Component::new("todos")
        .prefix("todos")
        .state(json!({ "todos": { "items": {}, "saving": false } }))
        .action("add", ActionSpec::args(["id", "text"]))
        .action("saved", ActionSpec::args(["id"]))
        .reducer("add", |_, action, draft| {
            let id = action.field("id").and_then(Value::as_str).unwrap_or_default();
            draft["todos"]["items"][id] = json!({
                "text": action.field("text").cloned().unwrap_or(Value::Null),
                "saved": false,
            });
            draft["todos"]["saving"] = json!(true);
            Ok(())
        })
        .reducer("saved", |_, action, draft| {
            let id = action.field("id").and_then(Value::as_str).unwrap_or_default();
            draft["todos"]["items"][id]["saved"] = json!(true);
            draft["todos"]["saving"] = json!(false);
            Ok(())
        })
        .selector(
            "item",
            SelectorSpec::composite([
                (
                    "item",
                    SelectorSpec::dynamic(|props: &Value, _: &Value| {
                        format!(
                            "todos.items.{}",
                            props["id"].as_str().unwrap_or("none")
                        )
                    }),
                ),
                ("saving", SelectorSpec::from("todos.saving")),
            ]),
        )
        .effect("save", |cx, action| {
            let id = action.field("id").cloned().unwrap_or(Value::Null);
            Effect::awaited(async move {
                call!("saving {id}");
                cx.dispatch(Action::new("TODOS_SAVED").with("id", id))?;
                Ok(())
            })
        })
        .route("add", "save")
}

#[test]
fn saving_a_todo() {
    let mut cr = CallRecorder::new();
    let store = Store::builder().mid("todos").build();
    store.component(todos()).unwrap();
    let r = record(&store, store.selector("item").unwrap());
    assert!(r.subscription().set_selector_props(json!({ "id": "a" })));
    assert_eq!(
        store.watched_paths(),
        vec!["todos.items.a".to_string(), "todos.saving".to_string()]
    );

    let changed = block_on(
        store
            .action("add")
            .unwrap()
            .create([json!("a"), json!("milk")])
            .map(|a| store.dispatch_async(a))
            .unwrap(),
    )
    .unwrap();
    assert!(changed.unwrap().contains("todos.items.a.text"));
    cr.verify("saving \"a\"");

    assert_eq!(
        r.finish(),
        vec![
            json!({ "item": { "text": "milk", "saved": false }, "saving": true }),
            json!({ "item": { "text": "milk", "saved": true }, "saving": false }),
        ]
    );
}

#[test]
fn effects_wait_for_external_completion() {
    let mut cr = CallRecorder::new();
    let (tx, rx) = oneshot::channel::<i64>();
    let rx = Rc::new(std::cell::RefCell::new(Some(rx)));
    let store = Store::builder().mid("remote").build();
    store
        .component(
            Component::new("remote")
                .state(json!({ "remote": null }))
                .reducer("loaded", |_, action, draft| {
                    draft["remote"] = action.field("value").cloned().unwrap_or(Value::Null);
                    Ok(())
                })
                .effect("fetch", move |cx, _| {
                    let rx = rx.borrow_mut().take();
                    Effect::awaited(async move {
                        let Some(rx) = rx else {
                            return Ok(());
                        };
                        let value = rx.await.map_err(Error::handler)?;
                        call!("received {value}");
                        cx.dispatch(Action::new("LOADED").with("value", value))?;
                        Ok(())
                    })
                })
                .route("fetch", "fetch"),
        )
        .unwrap();

    store.dispatch(Action::new("FETCH")).unwrap();
    assert_eq!(store.pending_effects(), 1);
    tx.send(42).unwrap();
    cr.verify(());
    block_on(store.flush_effects()).unwrap();
    cr.verify("received 42");
    assert_eq!(store.state()["remote"], json!(42));
}

#[test]
fn lazy_component_with_scope() {
    let mut cr = CallRecorder::new();
    let store = Store::builder().mid("lazy").build();
    store.component(todos()).unwrap();
    store
        .component(
            Component::new("analytics")
                .loads_on_action("TODOS_ADD")
                .scope(|| async { Ok(json!({ "endpoint": "/track" })) })
                .effect("track", |cx, action| {
                    let endpoint = cx.context().scope("analytics").unwrap_or_default();
                    call!("track {} {}", action.ty(), endpoint["endpoint"]);
                    Effect::done()
                })
                .route("todosSaved", "track")
                .on_load(|_| call!("analytics loaded")),
        )
        .unwrap();
    assert_eq!(store.pending_scopes(), 0);

    let add = store.action("add").unwrap();
    add.call([json!("a"), json!("milk")]).unwrap();
    assert_eq!(store.pending_scopes(), 1);
    cr.verify(());

    assert_eq!(block_on(store.resolve()).unwrap(), 1);
    cr.verify("analytics loaded");

    block_on(store.flush_effects()).unwrap();
    cr.verify(["saving \"a\"", "track TODOS_SAVED \"/track\""]);
}

#[test]
fn config_from_json() {
    let config: ModuleConfig =
        serde_json::from_value(json!({ "mid": "configured", "effectOrdering": "beforeNotify" }))
            .unwrap();
    let store = Store::with_config(config);
    assert_eq!(store.mid(), "configured");
    assert_eq!(store.effect_ordering(), EffectOrdering::BeforeNotify);
}
