//! `cortex_get_session_context`: where am I.

use cortex_core::{Result, Storage};
use serde_json::Value;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub fn execute(storage: &Storage, _args: Option<Value>) -> Result<Value> {
    let context = storage.session_context()?;
    Ok(serde_json::to_value(context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{remember, test_storage};
    use cortex_core::{ActivityInput, EventType};

    #[test]
    fn test_context_shape() {
        let (storage, _dir) = test_storage();
        remember(&storage, "context memory");
        storage
            .log_activity(ActivityInput {
                event_type: EventType::PreToolUse,
                tool_name: Some("Read".into()),
                tool_input: None,
                tool_output: None,
                success: true,
                error_message: None,
                duration_ms: None,
                file_path: None,
            })
            .unwrap();

        let result = execute(&storage, None).unwrap();
        assert!(result["currentSession"].is_object());
        assert_eq!(result["recentActivities"].as_array().unwrap().len(), 1);
        assert_eq!(result["recentMemories"].as_array().unwrap().len(), 1);
        assert!(result["stats"]["totalMemories"].as_u64().unwrap() >= 1);
    }
}
