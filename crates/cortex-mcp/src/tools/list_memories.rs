//! `cortex_list_memories`: filtered, sorted listing.

use cortex_core::{CortexError, Result, SortBy, SortOrder, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_args, parse_limit, parse_offset, FilterArgs};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "filters": {
                "type": "object",
                "description": "memory_type, status, tags, min/max importance, last-accessed bounds"
            },
            "sort_by": {
                "type": "string",
                "enum": ["created_at", "last_accessed", "importance_score", "access_count"],
                "default": "created_at"
            },
            "sort_order": {
                "type": "string",
                "enum": ["asc", "desc"],
                "default": "desc"
            },
            "limit": { "type": "integer" },
            "offset": { "type": "integer" }
        }
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default)]
    filters: Option<FilterArgs>,
    #[serde(default, alias = "sortBy")]
    sort_by: Option<String>,
    #[serde(default, alias = "sortOrder")]
    sort_order: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let sort_by = match args.sort_by.as_deref() {
        None | Some("created_at") => SortBy::CreatedAt,
        Some("last_accessed") => SortBy::LastAccessed,
        Some("importance_score") => SortBy::ImportanceScore,
        Some("access_count") => SortBy::AccessCount,
        Some(other) => {
            return Err(CortexError::invalid_at(
                "sort_by",
                format!("unknown sort key: {other}"),
            ));
        }
    };
    let sort_order = match args.sort_order.as_deref() {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => {
            return Err(CortexError::invalid_at(
                "sort_order",
                format!("unknown sort order: {other}"),
            ));
        }
    };

    let filter = args.filters.unwrap_or_default().into_filter()?;
    let memories = storage.list_memories(
        &filter,
        sort_by,
        sort_order,
        parse_limit(args.limit)?,
        parse_offset(args.offset)?,
    )?;

    Ok(serde_json::json!({ "memories": memories }))
}
