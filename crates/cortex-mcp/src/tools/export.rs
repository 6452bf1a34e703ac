//! `cortex_export`: serialize the whole catalog.

use cortex_core::{CortexError, ExportFormat, Result, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::parse_args;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "format": {
                "type": "string",
                "enum": ["json", "jsonl"],
                "description": "json: one object; jsonl: one {kind, data} envelope per line"
            }
        },
        "required": ["format"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    format: String,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let format = match args.format.as_str() {
        "json" => ExportFormat::Json,
        "jsonl" => ExportFormat::Jsonl,
        other => {
            return Err(CortexError::invalid_at(
                "format",
                format!("unknown export format: {other}"),
            ));
        }
    };

    let data = storage.export(format)?;
    Ok(serde_json::json!({ "format": args.format, "data": data }))
}
