//! Retrieval engine helpers.
//!
//! The SQL side of retrieval lives in the storage layer; this module holds
//! the pure pieces: FTS query preparation, score fusion for hybrid mode, and
//! the freshness classification.

mod hybrid;
mod keyword;

pub use hybrid::{hybrid_combine, max_normalize, HYBRID_KEYWORD_WEIGHT, HYBRID_SEMANTIC_WEIGHT};
pub use keyword::sanitize_fts_query;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Freshness, Memory, MemoryStatus};

/// Search mode for recall queries
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// FTS/BM25 only
    Keyword,
    /// Embedding cosine only
    Semantic,
    /// 0.5/0.5 fusion of max-normalized keyword and semantic scores (default)
    #[default]
    Hybrid,
}

/// Default minimum cosine similarity for semantic results
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.2;

/// Candidate-pool multiplier for hybrid mode: each side fetches
/// `limit * HYBRID_POOL_FACTOR` before fusion
pub const HYBRID_POOL_FACTOR: u32 = 3;

/// A ranked retrieval hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMemory {
    /// The memory
    pub memory: Memory,
    /// Mode-dependent relevance score
    pub score: f32,
}

/// Result of a recall operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallOutcome {
    /// Ranked hits, already paginated
    pub results: Vec<ScoredMemory>,
    /// True when semantic ranking was requested but the embedder was
    /// unavailable and keyword results were substituted
    pub degraded: bool,
}

// ============================================================================
// FRESHNESS
// ============================================================================

/// Days within which an accessed memory counts as fresh
pub const FRESH_WINDOW_DAYS: i64 = 30;
/// Days after which an unaccessed memory counts as outdated
pub const OUTDATED_AFTER_DAYS: i64 = 90;

/// Classify a memory's freshness from its status and last access time.
///
/// A memory never accessed is aged from its creation instant.
pub fn classify_freshness(memory: &Memory, now: DateTime<Utc>) -> Freshness {
    match memory.status {
        MemoryStatus::Archived => Freshness::Archived,
        MemoryStatus::Outdated => Freshness::Outdated,
        MemoryStatus::NeedsReview => Freshness::NeedsReview,
        MemoryStatus::Fresh => {
            let reference = memory.last_accessed.unwrap_or(memory.created_at);
            let age = now - reference;
            if age > Duration::days(OUTDATED_AFTER_DAYS) {
                Freshness::Outdated
            } else if age > Duration::days(FRESH_WINDOW_DAYS) {
                Freshness::NeedsReview
            } else {
                Freshness::Fresh
            }
        }
    }
}

// ============================================================================
// ORDERING
// ============================================================================

/// Deterministic ordering over scored hits: score descending, then
/// `last_accessed` descending (never-accessed sorts last), then id
/// descending. Total and stable, so offset/limit slices of the same query
/// are disjoint and contiguous.
pub fn rank_order(a: &ScoredMemory, b: &ScoredMemory) -> std::cmp::Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.memory.last_accessed.cmp(&a.memory.last_accessed))
        .then_with(|| b.memory.id.cmp(&a.memory.id))
}
