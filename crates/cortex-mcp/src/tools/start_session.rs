//! `cortex_start_session`: explicit session start.

use cortex_core::{Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::parse_args;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "project_path": {
                "type": "string",
                "description": "Project the session belongs to; defaults to the catalog's project"
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default, alias = "projectPath")]
    project_path: Option<String>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;
    let session = storage.start_session(args.project_path)?;
    Ok(serde_json::json!({ "id": session.id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_storage;

    #[test]
    fn test_start_ends_previous() {
        let (storage, _dir) = test_storage();
        let first = execute(&storage, None).unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        let second = execute(&storage, None).unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_ne!(first, second);

        let previous = storage.get_session(&first).unwrap().unwrap();
        assert!(previous.ended_at.is_some());
        assert_eq!(storage.current_session().unwrap().unwrap().id, second);
    }
}
