//! # Cortex Core
//!
//! Per-project knowledge store for AI coding assistants. One catalog per
//! project holds three kinds of records:
//!
//! - **Memories**: durable facts, decisions, and solutions with tags, typed
//!   links, importance, and freshness tracking
//! - **Activities**: tool-call events emitted by the host assistant's hooks,
//!   redacted and summarized before persistence
//! - **Sessions**: time-bounded groupings of activities, managed implicitly
//!
//! Retrieval is keyword (SQLite FTS5/BM25), semantic (embedding cosine), or
//! hybrid (equal-weight fusion of both after max-normalization).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cortex_core::{
//!     Broadcaster, MemoryFilter, RememberInput, SearchMode, Storage, SystemClock,
//! };
//!
//! # fn main() -> cortex_core::Result<()> {
//! let project = std::path::Path::new("/work/my-project");
//! let storage = Storage::open(
//!     &cortex_core::catalog::project_catalog_path(project),
//!     project,
//!     cortex_core::embeddings::default_embedder(),
//!     Arc::new(SystemClock),
//!     Broadcaster::new(project.display().to_string()),
//! )?;
//!
//! let memory = storage.create_memory(RememberInput {
//!     content: "Use AES-GCM for envelope encryption".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let hits = storage.recall(
//!     "encryption",
//!     SearchMode::Hybrid,
//!     &MemoryFilter::default(),
//!     None,
//!     0,
//! )?;
//! # let _ = (memory, hits);
//! # Ok(())
//! # }
//! ```
//!
//! ## Capabilities
//!
//! The engine owns no singletons. An [`Embedder`], a [`Clock`], and a
//! [`Broadcaster`] are injected at open time; tests swap in fakes. The
//! `OMNI_CORTEX_EMBED=off` environment selects the null embedder, under
//! which writes store no vector and semantic retrieval degrades to keyword
//! results marked `degraded`.
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local 384-dim sentence encoder via fastembed
//! - `bundled-sqlite` (default): compile SQLite into the binary

// Only warn about missing docs at the crate level; internal struct fields
// and enum variants don't need documentation
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod broadcast;
pub mod catalog;
pub mod clock;
pub mod embeddings;
pub mod error;
pub mod search;
pub mod session;
pub mod storage;
pub mod summarize;
pub mod types;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Entity types
pub use types::{
    effective_limit, Activity, ActivityFilter, ActivityInput, CommandScope, EventType, Freshness,
    Link, LinkKind, Memory, MemoryFilter, MemoryPatch, MemoryStatus, MemoryType, RememberInput,
    Session, SortBy, SortOrder, TagCount, ToneIndicator, UserMessage, DEFAULT_IMPORTANCE,
    DEFAULT_LIMIT, MAX_LIMIT,
};

// Storage layer
pub use storage::{
    CatalogStats, ExportBundle, ExportFormat, ExportLink, ExportMemory, LinkedMemory, RestoreMode,
    ReviewItem, SessionContext, Storage, TagRow, TimelineEvent,
};

// Errors
pub use error::{CortexError, Result};

// Capabilities
pub use clock::{Clock, FixedClock, SystemClock};
pub use embeddings::{
    cosine_similarity, default_embedder, null_embedder, EmbedError, Embedder, NullEmbedder,
    DEFAULT_DIMENSIONS,
};

// Retrieval
pub use search::{
    classify_freshness, sanitize_fts_query, RecallOutcome, ScoredMemory, SearchMode,
    DEFAULT_SEMANTIC_THRESHOLD, HYBRID_POOL_FACTOR,
};

// Change notification
pub use broadcast::{
    touch_catalog, Broadcaster, ChangeEvent, ChangeKind, ExternalChangeWatcher, Subscriber,
    SUBSCRIBER_QUEUE_CAPACITY,
};

// Catalog locations and registry
pub use catalog::{
    global_catalog_path, project_catalog_path, Capabilities, CatalogRegistry, ENV_EMBED, ENV_HOME,
};

// Session state
pub use session::{SessionState, SessionStateFile};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Activity, ActivityInput, Broadcaster, ChangeEvent, ChangeKind, CortexError, EventType,
        Memory, MemoryFilter, MemoryPatch, MemoryStatus, MemoryType, RecallOutcome, RememberInput,
        Result, SearchMode, Session, Storage, SystemClock,
    };

    pub use crate::embeddings::{default_embedder, null_embedder, Embedder};
}
