//! Storage engine.
//!
//! All read/write operations on a catalog. Writes are serialized per catalog
//! behind a writer connection; reads use a second connection and see WAL
//! snapshots, so multi-table reads (memory + tags + links) cannot tear.

mod export;
mod sqlite;

pub use export::{ExportBundle, ExportFormat, ExportLink, ExportMemory, RestoreMode, TagRow};
pub use sqlite::{Storage, MAX_TOOL_OUTPUT_CHARS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Activity, Freshness, Memory, Session};

/// A memory plus its one-hop link neighborhood.
///
/// Link traversal never goes deeper than one hop; `more_available` flags
/// that a neighbor has further links of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedMemory {
    /// The memory
    pub memory: Memory,
    /// Ids one hop away (either direction), deduplicated
    pub related_ids: Vec<String>,
    /// True when any neighbor has links beyond this hop
    pub more_available: bool,
}

/// One entry of the review queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    /// The memory plus its immediate neighborhood
    #[serde(flatten)]
    pub linked: LinkedMemory,
    /// Why it needs attention; never `fresh`
    pub classification: Freshness,
}

/// An entry of the interleaved timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// A memory creation or update
    Memory {
        /// When it happened
        at: DateTime<Utc>,
        /// The memory
        memory: Memory,
    },
    /// A logged activity
    Activity {
        /// When it happened
        at: DateTime<Utc>,
        /// The activity
        activity: Activity,
    },
}

impl TimelineEvent {
    /// Instant of the event, for interleaving
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            TimelineEvent::Memory { at, .. } => *at,
            TimelineEvent::Activity { at, .. } => *at,
        }
    }
}

/// What the assistant gets when it asks "where am I"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// The current session, if one is open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_session: Option<Session>,
    /// Most recent activities, newest first
    pub recent_activities: Vec<Activity>,
    /// Most recently touched memories with one hop of links
    pub recent_memories: Vec<LinkedMemory>,
    /// Aggregate catalog statistics
    pub stats: CatalogStats,
}

/// Aggregate catalog statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    /// Non-archived memories
    pub active_memories: u64,
    /// All memories including archived
    pub total_memories: u64,
    /// Logged activities
    pub total_activities: u64,
    /// Sessions ever started
    pub total_sessions: u64,
    /// Distinct tags on non-archived memories
    pub distinct_tags: u64,
    /// Captured user messages
    pub total_user_messages: u64,
}
