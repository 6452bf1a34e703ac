//! `cortex_link_memories`: typed links between memories.

use cortex_core::{CortexError, LinkKind, Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::parse_args;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "from": { "type": "string" },
            "to": { "type": "string" },
            "kind": {
                "type": "string",
                "enum": ["relates_to", "supersedes", "contradicts", "depends_on", "caused_by", "other"],
                "default": "relates_to"
            }
        },
        "required": ["from", "to"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    from: String,
    to: String,
    #[serde(default)]
    kind: Option<String>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let kind = match args.kind.as_deref() {
        None => LinkKind::default(),
        Some(raw) => LinkKind::try_parse(raw)
            .ok_or_else(|| CortexError::invalid_at("kind", format!("unknown link kind: {raw}")))?,
    };

    let linked = storage.link_memories(&args.from, &args.to, kind)?;
    Ok(serde_json::json!({ "linked": linked }))
}
