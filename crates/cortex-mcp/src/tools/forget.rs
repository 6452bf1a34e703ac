//! `cortex_forget`: hard delete with cascade.

use cortex_core::{Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::parse_args;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "string",
                "description": "Memory to delete; unknown ids remove nothing"
            }
        },
        "required": ["id"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    id: String,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;
    let removed = storage.forget_memory(&args.id)?;
    Ok(serde_json::json!({ "removed": removed }))
}
