//! `cortex_review_memories`: the review queue.

use cortex_core::{Result, Storage};
use serde_json::Value;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub fn execute(storage: &Storage, _args: Option<Value>) -> Result<Value> {
    let items = storage.review_memories()?;
    Ok(serde_json::json!({ "items": items }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{Broadcaster, FixedClock, RememberInput, Storage};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_review_surfaces_aged_memories() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::new());
        let storage = Storage::open(
            &dir.path().join(".omni-cortex/cortex.db"),
            dir.path(),
            cortex_core::null_embedder(),
            clock.clone(),
            Broadcaster::new(dir.path().display().to_string()),
        )
        .unwrap();

        storage
            .create_memory(RememberInput {
                content: "aging knowledge".into(),
                ..Default::default()
            })
            .unwrap();

        // Fresh memories are not up for review
        let result = execute(&storage, None).unwrap();
        assert!(result["items"].as_array().unwrap().is_empty());

        clock.advance(chrono::Duration::days(100));
        let result = execute(&storage, None).unwrap();
        let items = result["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["classification"], "outdated");
    }
}
