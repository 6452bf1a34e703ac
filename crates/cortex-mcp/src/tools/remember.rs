//! `cortex_remember`: store a durable memory.

use cortex_core::{CortexError, MemoryType, RememberInput, Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_args, parse_importance};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "description": "The knowledge to store"
            },
            "type": {
                "type": "string",
                "description": "decision, solution, insight, error, context, preference, todo, reference, workflow, api, conversation, other",
                "default": "other"
            },
            "context": {
                "type": "string",
                "description": "Surrounding context for the memory"
            },
            "tags": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Tags for categorization; duplicates collapse"
            },
            "importance": {
                "type": "integer",
                "minimum": 0,
                "maximum": 100,
                "description": "Importance score, defaults to 50"
            },
            "related_ids": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Existing memory ids to link with relates_to"
            }
        },
        "required": ["content"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    content: String,
    #[serde(default, rename = "type", alias = "memory_type", alias = "memoryType")]
    memory_type: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default, alias = "relatedIds")]
    related_ids: Vec<String>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let memory_type = match args.memory_type.as_deref() {
        None => MemoryType::default(),
        Some(raw) => MemoryType::try_parse(raw)
            .ok_or_else(|| CortexError::invalid_at("type", format!("unknown memory type: {raw}")))?,
    };

    let memory = storage.create_memory(RememberInput {
        content: args.content,
        memory_type,
        context: args.context,
        tags: args.tags,
        importance: parse_importance(args.importance, "importance")?,
        related_ids: args.related_ids,
    })?;

    Ok(serde_json::json!({ "id": memory.id }))
}
