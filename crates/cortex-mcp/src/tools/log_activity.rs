//! `cortex_log_activity`: hook event ingestion.

use cortex_core::{ActivityInput, CortexError, EventType, Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::parse_args;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "event_type": {
                "type": "string",
                "enum": ["pre_tool_use", "post_tool_use", "stop", "subagent_stop"]
            },
            "tool_name": { "type": "string" },
            "tool_input": {
                "description": "Raw tool input; secrets are redacted before persistence"
            },
            "tool_output": {
                "description": "Raw tool output; redacted and possibly truncated"
            },
            "success": { "type": "boolean" },
            "error_message": {
                "type": "string",
                "description": "Required when success is false"
            },
            "duration_ms": { "type": "integer", "minimum": 0 },
            "file_path": { "type": "string" }
        },
        "required": ["event_type", "success"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(alias = "eventType")]
    event_type: String,
    #[serde(default, alias = "toolName")]
    tool_name: Option<String>,
    #[serde(default, alias = "toolInput")]
    tool_input: Option<Value>,
    #[serde(default, alias = "toolOutput")]
    tool_output: Option<Value>,
    success: bool,
    #[serde(default, alias = "errorMessage")]
    error_message: Option<String>,
    #[serde(default, alias = "durationMs")]
    duration_ms: Option<i64>,
    #[serde(default, alias = "filePath")]
    file_path: Option<String>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let event_type = EventType::try_parse(&args.event_type).ok_or_else(|| {
        CortexError::invalid_at(
            "event_type",
            format!("unknown event type: {}", args.event_type),
        )
    })?;
    let duration_ms = match args.duration_ms {
        Some(n) if n < 0 => {
            return Err(CortexError::invalid_at(
                "duration_ms",
                "must not be negative",
            ));
        }
        other => other.map(|n| n as u64),
    };

    let activity = storage.log_activity(ActivityInput {
        event_type,
        tool_name: args.tool_name,
        tool_input: args.tool_input,
        tool_output: args.tool_output,
        success: args.success,
        error_message: args.error_message,
        duration_ms,
        file_path: args.file_path,
    })?;

    Ok(serde_json::json!({
        "id": activity.id,
        "session_id": activity.session_id,
    }))
}
