//! `cortex_get_timeline`: interleaved recent events.

use cortex_core::{CortexError, Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::parse_args;

/// Window when the caller does not supply one
const DEFAULT_HOURS: u32 = 24;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "hours": {
                "type": "integer",
                "minimum": 1,
                "default": DEFAULT_HOURS,
                "description": "How far back to look"
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default)]
    hours: Option<i64>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let hours = match args.hours {
        None => DEFAULT_HOURS,
        Some(n) if n < 1 => {
            return Err(CortexError::invalid_at("hours", "must be at least 1"));
        }
        Some(n) => n.min(u32::MAX as i64) as u32,
    };

    let events = storage.get_timeline(hours)?;
    Ok(serde_json::json!({ "events": events }))
}
