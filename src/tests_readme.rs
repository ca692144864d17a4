// #![include_doc("../README.md", start)]
//! # state-modules
//!
//! `state-modules` is an immutable state container with reducers, compiled selectors and fine-grained subscriptions.
//!
//! > [!WARNING]
//! > Warning: This crate is still in the very early stages of development. APIs will change. Documentation is sparse.
//!
//! ## Features
//!
//! - One JSON state tree per module, replaced as a whole on every change
//! - Components that contribute state, bound action creators, reducers, selectors, helpers and effects
//! - Selectors compiled from dotted paths, composite objects and prop placeholders
//! - Subscribers notified only when a path they read has changed
//! - Effects run as `async` blocks on a single-threaded model
//!
//! ```rust
//! use serde_json::json;
//! use state_modules::{ActionSpec, Component, Store};
//!
//! let store = Store::builder().mid("app").build();
//! store
//!     .component(
//!         Component::new("counter")
//!             .state(json!({ "counter": { "value": 0 } }))
//!             .action("increment", ActionSpec::args(["by"]))
//!             .reducer("increment", |_, action, draft| {
//!                 let v = draft["counter"]["value"].as_i64().unwrap_or(0);
//!                 draft["counter"]["value"] = json!(v + action.i64_or("by", 1));
//!                 Ok(())
//!             })
//!             .selector("value", "counter.value"),
//!     )
//!     .unwrap();
//!
//! let sub = store
//!     .subscribe_to_selector("counter.value")
//!     .unwrap()
//!     .subscribe(|value: &serde_json::Value| println!("{value}"));
//!
//! store.action("increment").unwrap().call([json!(2)]).unwrap(); // prints "2"
//! assert_eq!(store.select("value").unwrap(), json!(2));
//! drop(sub);
//! ```
//!
//! ## License
//!
//! This project is dual licensed under Apache-2.0/MIT.
// #![include_doc("../README.md", end)]
