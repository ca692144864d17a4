use serde_json::{json, Value};

use crate::{ActionSpec, Component, Result};

/// `{ "counter": { "value": 0 } }` with an `increment(by)` action, defaulting `by` to 1.
pub fn counter() -> Component {
    Component::new("counter")
        .state(json!({ "counter": { "value": 0 } }))
        .action("increment", ActionSpec::args(["by"]))
        .reducer("increment", |_, action, draft| add(draft, action.i64_or("by", 1)))
        .selector("value", "counter.value")
}

pub fn add(draft: &mut Value, by: i64) -> Result<()> {
    let value = draft["counter"]["value"].as_i64().unwrap_or(0);
    draft["counter"]["value"] = json!(value + by);
    Ok(())
}
