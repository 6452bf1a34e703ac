//! `cortex_get_activities`: activity listing.

use chrono::{DateTime, Utc};
use cortex_core::{ActivityFilter, CortexError, EventType, Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_args, parse_limit, parse_offset};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "filters": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "tool_name": { "type": "string" },
                    "event_type": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "since": { "type": "string", "format": "date-time" },
                    "failed_only": { "type": "boolean" }
                }
            },
            "limit": { "type": "integer" },
            "offset": { "type": "integer" }
        }
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FilterArgs {
    #[serde(default, alias = "sessionId")]
    session_id: Option<String>,
    #[serde(default, alias = "toolName")]
    tool_name: Option<String>,
    #[serde(default, alias = "eventType")]
    event_type: Option<Vec<String>>,
    #[serde(default)]
    since: Option<DateTime<Utc>>,
    #[serde(default, alias = "failedOnly")]
    failed_only: bool,
}

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default)]
    filters: Option<FilterArgs>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;
    let raw = args.filters.unwrap_or_default();

    let event_type = raw
        .event_type
        .map(|kinds| {
            kinds
                .iter()
                .map(|k| {
                    EventType::try_parse(k).ok_or_else(|| {
                        CortexError::invalid_at(
                            "filters.event_type",
                            format!("unknown event type: {k}"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    let activities = storage.get_activities(
        &ActivityFilter {
            session_id: raw.session_id,
            tool_name: raw.tool_name,
            event_type,
            since: raw.since,
            failed_only: raw.failed_only,
        },
        parse_limit(args.limit)?,
        parse_offset(args.offset)?,
    )?;

    Ok(serde_json::json!({ "activities": activities }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_storage;
    use cortex_core::ActivityInput;

    fn log(storage: &Storage, tool: &str, success: bool) {
        storage
            .log_activity(ActivityInput {
                event_type: EventType::PostToolUse,
                tool_name: Some(tool.to_string()),
                tool_input: None,
                tool_output: None,
                success,
                error_message: (!success).then(|| "boom".to_string()),
                duration_ms: None,
                file_path: None,
            })
            .unwrap();
    }

    #[test]
    fn test_filter_by_tool_and_failure() {
        let (storage, _dir) = test_storage();
        log(&storage, "Read", true);
        log(&storage, "Bash", false);
        log(&storage, "Read", true);

        let result = execute(
            &storage,
            Some(serde_json::json!({"filters": {"tool_name": "Read"}})),
        )
        .unwrap();
        assert_eq!(result["activities"].as_array().unwrap().len(), 2);

        let result = execute(
            &storage,
            Some(serde_json::json!({"filters": {"failed_only": true}})),
        )
        .unwrap();
        let failures = result["activities"].as_array().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["toolName"], "Bash");
    }

    #[test]
    fn test_unknown_event_type_filter() {
        let (storage, _dir) = test_storage();
        let err = execute(
            &storage,
            Some(serde_json::json!({"filters": {"event_type": ["hiccup"]}})),
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("filters.event_type"));
    }
}
