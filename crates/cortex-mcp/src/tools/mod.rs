//! The 15 tools.
//!
//! Each tool module exposes a `schema()` describing its input and a
//! synchronous `execute(&Storage, Option<Value>)`. The dispatch table below
//! is the single registry the server consults; it also drives the
//! `initialize` listing. Tool inputs ignore unknown fields; missing or
//! malformed required fields come back as invalid-input errors carrying the
//! offending field path.

pub mod end_session;
pub mod export;
pub mod forget;
pub mod get_activities;
pub mod get_session_context;
pub mod get_timeline;
pub mod link_memories;
pub mod list_memories;
pub mod list_tags;
pub mod log_activity;
pub mod recall;
pub mod remember;
pub mod review_memories;
pub mod start_session;
pub mod update_memory;

use chrono::{DateTime, Utc};
use cortex_core::{
    CortexError, MemoryFilter, MemoryStatus, MemoryType, Result, Storage,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One entry of the dispatch table
pub struct ToolSpec {
    /// Wire name
    pub name: &'static str,
    /// One-line description for the `initialize` listing
    pub description: &'static str,
    /// Input schema
    pub schema: fn() -> Value,
    /// Handler
    pub run: fn(&Storage, Option<Value>) -> Result<Value>,
}

/// The dispatch table, constructed at startup
pub const REGISTRY: &[ToolSpec] = &[
    ToolSpec {
        name: "cortex_remember",
        description: "Store a durable memory with tags, importance, and links",
        schema: remember::schema,
        run: remember::execute,
    },
    ToolSpec {
        name: "cortex_recall",
        description: "Search memories by keyword, meaning, or both",
        schema: recall::schema,
        run: recall::execute,
    },
    ToolSpec {
        name: "cortex_list_memories",
        description: "List memories with filters, sorting, and pagination",
        schema: list_memories::schema,
        run: list_memories::execute,
    },
    ToolSpec {
        name: "cortex_update_memory",
        description: "Patch a memory's content, status, tags, or importance",
        schema: update_memory::schema,
        run: update_memory::execute,
    },
    ToolSpec {
        name: "cortex_forget",
        description: "Hard-delete a memory and everything that references it",
        schema: forget::schema,
        run: forget::execute,
    },
    ToolSpec {
        name: "cortex_link_memories",
        description: "Relate two memories with a typed link",
        schema: link_memories::schema,
        run: link_memories::execute,
    },
    ToolSpec {
        name: "cortex_list_tags",
        description: "Tag histogram over non-archived memories",
        schema: list_tags::schema,
        run: list_tags::execute,
    },
    ToolSpec {
        name: "cortex_review_memories",
        description: "Memories that need review or look outdated",
        schema: review_memories::schema,
        run: review_memories::execute,
    },
    ToolSpec {
        name: "cortex_export",
        description: "Serialize the whole catalog as json or jsonl",
        schema: export::schema,
        run: export::execute,
    },
    ToolSpec {
        name: "cortex_log_activity",
        description: "Ingest a hook event: redact, summarize, assign session",
        schema: log_activity::schema,
        run: log_activity::execute,
    },
    ToolSpec {
        name: "cortex_get_activities",
        description: "List logged activities, newest first",
        schema: get_activities::schema,
        run: get_activities::execute,
    },
    ToolSpec {
        name: "cortex_get_timeline",
        description: "Interleaved memory and activity events, newest first",
        schema: get_timeline::schema,
        run: get_timeline::execute,
    },
    ToolSpec {
        name: "cortex_start_session",
        description: "Start a session, ending any current one",
        schema: start_session::schema,
        run: start_session::execute,
    },
    ToolSpec {
        name: "cortex_end_session",
        description: "End the current session and summarize it",
        schema: end_session::schema,
        run: end_session::execute,
    },
    ToolSpec {
        name: "cortex_get_session_context",
        description: "Current session, recent activity, and recent memories",
        schema: get_session_context::schema,
        run: get_session_context::execute,
    },
];

/// Look a tool up by wire name
pub fn find(name: &str) -> Option<&'static ToolSpec> {
    REGISTRY.iter().find(|spec| spec.name == name)
}

// ============================================================================
// SHARED ARG HELPERS
// ============================================================================

/// Parse tool arguments, mapping serde failures to invalid-input errors that
/// carry the offending field name when serde reports one.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Option<Value>) -> Result<T> {
    let value = args.unwrap_or(Value::Object(serde_json::Map::new()));
    serde_json::from_value(value).map_err(|e| {
        let message = e.to_string();
        match field_from_serde_message(&message) {
            Some(field) => CortexError::invalid_at(field, message),
            None => CortexError::invalid(message),
        }
    })
}

/// serde_json phrases missing/unexpected fields as ``... field `name` ...``
fn field_from_serde_message(message: &str) -> Option<String> {
    let start = message.find('`')? + 1;
    let end = message[start..].find('`')? + start;
    Some(message[start..end].to_string())
}

/// `Some(None)` when the wire value was an explicit null, `Some(Some(v))`
/// otherwise; combined with `#[serde(default)]` this distinguishes an absent
/// field from a null one.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validate a caller-supplied limit: non-negative; the >200 cap is applied
/// silently downstream
pub(crate) fn parse_limit(limit: Option<i64>) -> Result<Option<u32>> {
    match limit {
        None => Ok(None),
        Some(n) if n < 0 => Err(CortexError::invalid_at("limit", "must not be negative")),
        Some(n) => Ok(Some(n.min(u32::MAX as i64) as u32)),
    }
}

/// Validate a caller-supplied offset
pub(crate) fn parse_offset(offset: Option<i64>) -> Result<u32> {
    match offset {
        None => Ok(0),
        Some(n) if n < 0 => Err(CortexError::invalid_at("offset", "must not be negative")),
        Some(n) => Ok(n.min(u32::MAX as i64) as u32),
    }
}

/// Validate an importance value into [0, 100]
pub(crate) fn parse_importance(importance: Option<i64>, path: &str) -> Result<Option<u8>> {
    match importance {
        None => Ok(None),
        Some(n) if !(0..=100).contains(&n) => {
            Err(CortexError::invalid_at(path, "must be between 0 and 100"))
        }
        Some(n) => Ok(Some(n as u8)),
    }
}

/// Memory filter as it appears on the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct FilterArgs {
    #[serde(default, alias = "memoryType", alias = "type")]
    pub memory_type: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "minImportance")]
    pub min_importance: Option<i64>,
    #[serde(default, alias = "maxImportance")]
    pub max_importance: Option<i64>,
    #[serde(default, alias = "accessedAfter")]
    pub accessed_after: Option<DateTime<Utc>>,
    #[serde(default, alias = "accessedBefore")]
    pub accessed_before: Option<DateTime<Utc>>,
}

impl FilterArgs {
    /// Validate into the core filter
    pub fn into_filter(self) -> Result<MemoryFilter> {
        let memory_type = self
            .memory_type
            .map(|types| {
                types
                    .iter()
                    .map(|t| {
                        MemoryType::try_parse(t).ok_or_else(|| {
                            CortexError::invalid_at(
                                "filters.memory_type",
                                format!("unknown memory type: {t}"),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let status = self
            .status
            .map(|statuses| {
                statuses
                    .iter()
                    .map(|s| {
                        MemoryStatus::try_parse(s).ok_or_else(|| {
                            CortexError::invalid_at(
                                "filters.status",
                                format!("unknown status: {s}"),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(MemoryFilter {
            memory_type,
            status,
            tags: self.tags,
            min_importance: parse_importance(self.min_importance, "filters.min_importance")?,
            max_importance: parse_importance(self.max_importance, "filters.max_importance")?,
            accessed_after: self.accessed_after,
            accessed_before: self.accessed_before,
        })
    }
}
