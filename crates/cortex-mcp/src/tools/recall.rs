//! `cortex_recall`: ranked retrieval over memories.

use cortex_core::{CortexError, Result, SearchMode, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_args, parse_limit, parse_offset, FilterArgs};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query; quoted substrings stay literal"
            },
            "mode": {
                "type": "string",
                "enum": ["keyword", "semantic", "hybrid"],
                "default": "hybrid"
            },
            "filters": {
                "type": "object",
                "description": "memory_type, status, tags, min/max importance, last-accessed bounds"
            },
            "limit": {
                "type": "integer",
                "description": "Page size, default 20, capped at 200"
            },
            "offset": {
                "type": "integer",
                "description": "Items to skip"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    filters: Option<FilterArgs>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

pub fn execute(storage: &Storage, args: Option<Value>) -> Result<Value> {
    let args: Args = parse_args(args)?;

    let mode = match args.mode.as_deref() {
        None => SearchMode::Hybrid,
        Some("keyword") => SearchMode::Keyword,
        Some("semantic") => SearchMode::Semantic,
        Some("hybrid") => SearchMode::Hybrid,
        Some(other) => {
            return Err(CortexError::invalid_at(
                "mode",
                format!("unknown search mode: {other}"),
            ));
        }
    };

    let filter = args.filters.unwrap_or_default().into_filter()?;
    let limit = parse_limit(args.limit)?;
    let offset = parse_offset(args.offset)?;

    let outcome = storage.recall(&args.query, mode, &filter, limit, offset)?;

    Ok(serde_json::json!({
        "results": outcome.results,
        "degraded": outcome.degraded,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{remember, test_storage};

    #[test]
    fn test_recall_keyword_hit() {
        let (storage, _dir) = test_storage();
        let id = remember(&storage, "Use AES-GCM for envelope encryption");

        let result = execute(
            &storage,
            Some(serde_json::json!({"query": "AES", "mode": "keyword", "limit": 5})),
        )
        .unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["memory"]["id"], id);
        assert!(results[0]["score"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_recall_empty_query_is_invalid() {
        let (storage, _dir) = test_storage();
        let err = execute(&storage, Some(serde_json::json!({"query": "   "}))).unwrap_err();
        assert_eq!(err.path(), Some("query"));
    }

    #[test]
    fn test_recall_semantic_degrades_without_embedder() {
        let (storage, _dir) = test_storage();
        remember(&storage, "degraded semantic target");

        let result = execute(
            &storage,
            Some(serde_json::json!({"query": "degraded", "mode": "semantic"})),
        )
        .unwrap();
        assert_eq!(result["degraded"], true);
        assert_eq!(result["results"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_recall_unknown_mode_is_invalid() {
        let (storage, _dir) = test_storage();
        let err = execute(
            &storage,
            Some(serde_json::json!({"query": "x", "mode": "psychic"})),
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("mode"));
    }

    #[test]
    fn test_recall_limit_cap_is_silent() {
        let (storage, _dir) = test_storage();
        remember(&storage, "cap check target");
        let result = execute(
            &storage,
            Some(serde_json::json!({"query": "cap", "limit": 5000})),
        )
        .unwrap();
        assert_eq!(result["results"].as_array().unwrap().len(), 1);
    }
}
