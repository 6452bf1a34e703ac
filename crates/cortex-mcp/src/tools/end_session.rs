//! `cortex_end_session`: close and summarize the current session.

use cortex_core::{Result, Storage};
use serde_json::Value;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub fn execute(storage: &Storage, _args: Option<Value>) -> Result<Value> {
    let session = storage.end_session()?;
    Ok(serde_json::json!({
        "id": session.id,
        "summary": session.summary,
    }))
}
