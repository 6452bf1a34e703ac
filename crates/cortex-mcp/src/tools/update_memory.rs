//! `cortex_update_memory`: patch supplied fields only.

use cortex_core::{CortexError, MemoryPatch, MemoryStatus, MemoryType, Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::{nullable, parse_args, parse_importance};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "patch": {
                "type": "object",
                "properties": {
                    "content": { "type": "string" },
                    "context": { "type": ["string", "null"] },
                    "type": { "type": "string" },
                    "status": {
                        "type": "string",
                        "enum": ["fresh", "needs_review", "outdated", "archived"]
                    },
                    "importance": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "description": "Only supplied fields change; null context clears it"
            }
        },
        "required": ["id", "patch"]
    })
}

#[derive(Debug, Deserialize)]
struct PatchArgs {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    context: Option<Option<String>>,
    #[serde(default, rename = "type", alias = "memory_type", alias = "memoryType")]
    memory_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Args {
    id: String,
    patch: PatchArgs,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let memory_type = args
        .patch
        .memory_type
        .as_deref()
        .map(|raw| {
            MemoryType::try_parse(raw).ok_or_else(|| {
                CortexError::invalid_at("patch.type", format!("unknown memory type: {raw}"))
            })
        })
        .transpose()?;
    let status = args
        .patch
        .status
        .as_deref()
        .map(|raw| {
            MemoryStatus::try_parse(raw).ok_or_else(|| {
                CortexError::invalid_at("patch.status", format!("unknown status: {raw}"))
            })
        })
        .transpose()?;

    let updated = storage.update_memory(
        &args.id,
        MemoryPatch {
            content: args.patch.content,
            context: args.patch.context,
            memory_type,
            status,
            importance: parse_importance(args.patch.importance, "patch.importance")?,
            tags: args.patch.tags,
        },
    )?;

    Ok(serde_json::to_value(updated)?)
}
