//! `cortex_list_tags`: tag histogram.

use cortex_core::{Result, Storage};
use serde_json::Value;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub fn execute(storage: &Storage, _args: Option<Value>) -> Result<Value> {
    let tags = storage.list_tags()?;
    Ok(serde_json::json!({ "tags": tags }))
}
