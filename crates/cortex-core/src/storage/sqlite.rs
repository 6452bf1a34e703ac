//! SQLite storage implementation.
//!
//! Uses separate reader/writer connections for interior mutability. All
//! methods take `&self`, making `Storage` `Send + Sync` so the dispatcher can
//! hold `Arc<Storage>` without an outer lock. The writer mutex is the
//! per-catalog write gate; the reader connection sees WAL snapshots.

use chrono::{DateTime, SecondsFormat, Utc};
use lru::LruCache;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::broadcast::{touch_catalog, Broadcaster, ChangeKind, Subscriber};
use crate::catalog::{configure_connection, migrations};
use crate::clock::{new_id, Clock};
use crate::embeddings::{cosine_similarity, vector_from_bytes, vector_to_bytes, Embedder};
use crate::error::{CortexError, Result};
use crate::search::{
    classify_freshness, hybrid_combine, rank_order, sanitize_fts_query, RecallOutcome,
    ScoredMemory, SearchMode, DEFAULT_SEMANTIC_THRESHOLD, HYBRID_POOL_FACTOR,
};
use crate::session::{derive_session_summary, SessionState, SessionStateFile};
use crate::summarize::{project, redact, summarize};
use crate::types::{
    effective_limit, Activity, ActivityFilter, ActivityInput, CommandScope, EventType, Freshness,
    Link, LinkKind, Memory, MemoryFilter, MemoryPatch, MemoryStatus, MemoryType, RememberInput,
    Session, SortBy, SortOrder, TagCount, ToneIndicator, UserMessage, DEFAULT_IMPORTANCE,
};

use super::{CatalogStats, LinkedMemory, ReviewItem, SessionContext, TimelineEvent};

/// Tool output beyond this many characters is truncated before persistence
pub const MAX_TOOL_OUTPUT_CHARS: usize = 10_000;

/// How many recent items `session_context` returns per list
const CONTEXT_RECENT: u32 = 10;

/// Catalog metadata key holding the fixed vector dimension
const META_EMBEDDING_DIMENSION: &str = "embedding_dimension";

// ============================================================================
// STORAGE
// ============================================================================

/// Handle to one catalog
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    db_path: PathBuf,
    project_path: String,
    embedder: Arc<dyn Embedder>,
    clock: Arc<dyn Clock>,
    broadcaster: Broadcaster,
    session_state: SessionStateFile,
    /// Memoized query embeddings; repeated recalls skip the model
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("db_path", &self.db_path)
            .field("project_path", &self.project_path)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Open (creating and migrating as needed) the catalog at `db_path`.
    ///
    /// The vector dimension is fixed at first open; reopening with an
    /// embedder that reports a different dimension fails with
    /// `EmbeddingMismatch`.
    pub fn open(
        db_path: &Path,
        project_dir: &Path,
        embedder: Arc<dyn Embedder>,
        clock: Arc<dyn Clock>,
        broadcaster: Broadcaster,
    ) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open(db_path).map_err(CortexError::from)?;
        configure_connection(&writer)?;
        migrations::apply_migrations(&writer)?;

        // Pin or verify the catalog's vector dimension
        let declared = embedder.dimension();
        let stored: Option<String> = writer
            .query_row(
                "SELECT value FROM catalog_meta WHERE key = ?1",
                params![META_EMBEDDING_DIMENSION],
                |row| row.get(0),
            )
            .optional()
            .map_err(CortexError::from)?;
        match stored.and_then(|v| v.parse::<usize>().ok()) {
            Some(dim) if dim != declared => {
                return Err(CortexError::EmbeddingMismatch {
                    catalog: dim,
                    embedder: declared,
                });
            }
            Some(_) => {}
            None => {
                writer
                    .execute(
                        "INSERT OR REPLACE INTO catalog_meta (key, value) VALUES (?1, ?2)",
                        params![META_EMBEDDING_DIMENSION, declared.to_string()],
                    )
                    .map_err(CortexError::from)?;
            }
        }

        let reader = Connection::open(db_path).map_err(CortexError::from)?;
        configure_connection(&reader)?;

        // SAFETY: 128 is non-zero
        let query_cache = Mutex::new(LruCache::new(NonZeroUsize::new(128).expect("non-zero")));

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            db_path: db_path.to_path_buf(),
            project_path: project_dir.display().to_string(),
            embedder,
            clock,
            broadcaster,
            session_state: SessionStateFile::for_project(project_dir),
            query_cache,
        })
    }

    /// Catalog file location
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Project this catalog belongs to
    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    /// Fixed vector dimension of this catalog
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Whether semantic retrieval is currently possible
    pub fn embedder_available(&self) -> bool {
        self.embedder.is_available()
    }

    /// Subscribe to change events for this catalog
    pub fn subscribe(&self) -> Subscriber {
        self.broadcaster.subscribe()
    }

    /// The catalog's broadcaster (for wiring external watchers)
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    // ========================================================================
    // LOCK / TIME HELPERS
    // ========================================================================

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| CortexError::Internal("writer lock poisoned".to_string()))
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| CortexError::Internal("reader lock poisoned".to_string()))
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn emit(&self, kind: ChangeKind, entity_id: Option<String>) {
        self.broadcaster.emit(kind, entity_id, self.now());
        touch_catalog(&self.db_path);
    }

    // ========================================================================
    // MEMORY WRITES
    // ========================================================================

    /// Create a memory. Tags are deduplicated, `related_ids` become
    /// `relates_to` links, and a vector is stored when the embedder is
    /// available. Missing related ids roll the whole write back.
    pub fn create_memory(&self, input: RememberInput) -> Result<Memory> {
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(CortexError::invalid_at("content", "must not be empty"));
        }
        let importance = match input.importance {
            Some(value) if value > 100 => {
                return Err(CortexError::invalid_at(
                    "importance",
                    "must be between 0 and 100",
                ));
            }
            Some(value) => value,
            None => DEFAULT_IMPORTANCE,
        };

        let now = self.now();
        let id = new_id("mem", self.clock.as_ref());
        let tags = dedupe_tags(&input.tags);

        // Suspension point: embed outside the write transaction. A failed or
        // unavailable embedder downgrades to the no-vector path.
        let vector = self.embed_for_write(&content, input.context.as_deref());

        {
            let mut writer = self.writer()?;
            let tx = writer.transaction().map_err(CortexError::from)?;

            tx.execute(
                "INSERT INTO memories (
                    id, content, context, memory_type, status,
                    importance_score, access_count, created_at, updated_at, last_accessed
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7, NULL)",
                params![
                    id,
                    content,
                    input.context,
                    input.memory_type.as_str(),
                    MemoryStatus::Fresh.as_str(),
                    importance as i64,
                    ts(now),
                ],
            )
            .map_err(CortexError::from)?;

            for tag in &tags {
                tx.execute(
                    "INSERT OR IGNORE INTO memory_tags (memory_id, tag) VALUES (?1, ?2)",
                    params![id, tag],
                )
                .map_err(CortexError::from)?;
            }

            for related in &input.related_ids {
                let exists: bool = tx
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1)",
                        params![related],
                        |row| row.get(0),
                    )
                    .map_err(CortexError::from)?;
                if !exists {
                    // Dropping the transaction rolls everything back
                    return Err(CortexError::NotFound(format!(
                        "related memory {related} does not exist"
                    )));
                }
                tx.execute(
                    "INSERT OR IGNORE INTO memory_links (from_id, to_id, kind, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, related, LinkKind::RelatesTo.as_str(), ts(now)],
                )
                .map_err(CortexError::from)?;
            }

            if let Some(vector) = &vector {
                tx.execute(
                    "INSERT INTO memory_embeddings (memory_id, embedding, dimensions)
                     VALUES (?1, ?2, ?3)",
                    params![id, vector_to_bytes(vector), vector.len() as i64],
                )
                .map_err(CortexError::from)?;
            }

            tx.commit().map_err(CortexError::from)?;
        }

        self.emit(ChangeKind::MemoryCreated, Some(id.clone()));

        self.get_memory_raw(&id)?
            .ok_or_else(|| CortexError::Internal(format!("memory {id} vanished after insert")))
    }

    /// Update only the supplied fields. Content changes re-run the embedder;
    /// an empty patch still advances `updated_at`.
    pub fn update_memory(&self, id: &str, patch: MemoryPatch) -> Result<Memory> {
        let existing = self
            .get_memory_raw(id)?
            .ok_or_else(|| CortexError::NotFound(format!("memory {id} does not exist")))?;

        if let Some(content) = &patch.content {
            if content.trim().is_empty() {
                return Err(CortexError::invalid_at("content", "must not be empty"));
            }
        }
        if let Some(importance) = patch.importance {
            if importance > 100 {
                return Err(CortexError::invalid_at(
                    "importance",
                    "must be between 0 and 100",
                ));
            }
        }

        let now = self.now();
        if now < existing.created_at {
            return Err(CortexError::Conflict(format!(
                "updated_at would precede created_at for {id}"
            )));
        }

        let new_content = patch
            .content
            .as_ref()
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|| existing.content.clone());
        let new_context = match &patch.context {
            Some(replacement) => replacement.clone(),
            None => existing.context.clone(),
        };
        let content_changed =
            new_content != existing.content || new_context != existing.context;

        // Suspension point: re-embed before taking the write gate
        let vector = if content_changed {
            self.embed_for_write(&new_content, new_context.as_deref())
        } else {
            None
        };

        let new_type = patch.memory_type.unwrap_or(existing.memory_type);
        let new_status = patch.status.unwrap_or(existing.status);
        let new_importance = patch.importance.unwrap_or(existing.importance_score);

        {
            let mut writer = self.writer()?;
            let tx = writer.transaction().map_err(CortexError::from)?;

            tx.execute(
                "UPDATE memories SET
                    content = ?2, context = ?3, memory_type = ?4, status = ?5,
                    importance_score = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    id,
                    new_content,
                    new_context,
                    new_type.as_str(),
                    new_status.as_str(),
                    new_importance as i64,
                    ts(now),
                ],
            )
            .map_err(CortexError::from)?;

            if let Some(tags) = &patch.tags {
                tx.execute("DELETE FROM memory_tags WHERE memory_id = ?1", params![id])
                    .map_err(CortexError::from)?;
                for tag in dedupe_tags(tags) {
                    tx.execute(
                        "INSERT OR IGNORE INTO memory_tags (memory_id, tag) VALUES (?1, ?2)",
                        params![id, tag],
                    )
                    .map_err(CortexError::from)?;
                }
            }

            if content_changed {
                tx.execute(
                    "DELETE FROM memory_embeddings WHERE memory_id = ?1",
                    params![id],
                )
                .map_err(CortexError::from)?;
                if let Some(vector) = &vector {
                    tx.execute(
                        "INSERT INTO memory_embeddings (memory_id, embedding, dimensions)
                         VALUES (?1, ?2, ?3)",
                        params![id, vector_to_bytes(vector), vector.len() as i64],
                    )
                    .map_err(CortexError::from)?;
                }
            }

            tx.commit().map_err(CortexError::from)?;
        }

        self.emit(ChangeKind::MemoryUpdated, Some(id.to_string()));

        self.get_memory_raw(id)?
            .ok_or_else(|| CortexError::Internal(format!("memory {id} vanished after update")))
    }

    /// Hard-delete a memory, cascading tags, links (both directions), the
    /// FTS row, and the vector row. Unknown ids are a successful no-op.
    pub fn forget_memory(&self, id: &str) -> Result<usize> {
        let removed = {
            let writer = self.writer()?;
            writer
                .execute("DELETE FROM memories WHERE id = ?1", params![id])
                .map_err(CortexError::from)?
        };

        if removed > 0 {
            self.emit(ChangeKind::MemoryDeleted, Some(id.to_string()));
            self.emit(ChangeKind::StatsUpdated, None);
        }
        Ok(removed)
    }

    /// Insert a typed link. A duplicate `(from, to, kind)` is a no-op that
    /// returns `false`; self-links and unknown endpoints are errors.
    pub fn link_memories(&self, from: &str, to: &str, kind: LinkKind) -> Result<bool> {
        if from == to {
            return Err(CortexError::invalid_at("to", "cannot link a memory to itself"));
        }

        let now = self.now();
        let inserted = {
            let writer = self.writer()?;
            for endpoint in [from, to] {
                let exists: bool = writer
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1)",
                        params![endpoint],
                        |row| row.get(0),
                    )
                    .map_err(CortexError::from)?;
                if !exists {
                    return Err(CortexError::NotFound(format!(
                        "memory {endpoint} does not exist"
                    )));
                }
            }

            writer
                .execute(
                    "INSERT OR IGNORE INTO memory_links (from_id, to_id, kind, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![from, to, kind.as_str(), ts(now)],
                )
                .map_err(CortexError::from)?
                > 0
        };

        if inserted {
            self.emit(ChangeKind::MemoryUpdated, Some(from.to_string()));
        }
        Ok(inserted)
    }

    // ========================================================================
    // MEMORY READS
    // ========================================================================

    /// Fetch one memory and record the access
    pub fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        let memory = self.get_memory_raw(id)?;
        if let Some(memory) = &memory {
            self.record_access(&[memory.id.clone()])?;
        }
        Ok(memory)
    }

    /// Fetch one memory without access bookkeeping
    pub fn get_memory_raw(&self, id: &str) -> Result<Option<Memory>> {
        let reader = self.reader()?;
        let memory = reader
            .query_row(
                &format!("{MEMORY_SELECT} WHERE m.id = ?1"),
                params![id],
                row_to_memory,
            )
            .optional()
            .map_err(CortexError::from)?;

        match memory {
            Some(mut memory) => {
                memory.tags = load_tags(&reader, &memory.id)?;
                Ok(Some(memory))
            }
            None => Ok(None),
        }
    }

    /// List memories with filters, sorting, and pagination. Archived rows
    /// are excluded unless asked for; derived-outdated rows are excluded
    /// when no explicit status filter is given.
    pub fn list_memories(
        &self,
        filter: &MemoryFilter,
        sort_by: SortBy,
        sort_order: SortOrder,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<Memory>> {
        let limit = effective_limit(limit) as usize;

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        push_filter_sql(filter, &mut clauses, &mut values);

        let direction = match sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            "{MEMORY_SELECT} {} ORDER BY m.{} {direction}, m.id DESC",
            where_clause(&clauses),
            sort_by.column(),
        );

        let rows = self.query_memories(&sql, &values)?;
        let visible = self.apply_derived_visibility(rows, filter);
        let page: Vec<Memory> = visible.into_iter().skip(offset as usize).take(limit).collect();

        self.record_access(&page.iter().map(|m| m.id.clone()).collect::<Vec<_>>())?;
        Ok(page)
    }

    /// Tag histogram over non-archived memories: count descending, then
    /// lexicographic.
    pub fn list_tags(&self) -> Result<Vec<TagCount>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT t.tag, COUNT(*) AS n
                 FROM memory_tags t
                 JOIN memories m ON m.id = t.memory_id
                 WHERE m.status <> 'archived'
                 GROUP BY t.tag
                 ORDER BY n DESC, t.tag ASC",
            )
            .map_err(CortexError::from)?;

        let tags = stmt
            .query_map([], |row| {
                Ok(TagCount {
                    tag: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u32,
                })
            })
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?;

        Ok(tags)
    }

    /// Memories whose freshness classification is not `fresh`, each with one
    /// hop of links. Review does not count as access.
    pub fn review_memories(&self) -> Result<Vec<ReviewItem>> {
        let filter = MemoryFilter::default();
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        push_filter_sql(&filter, &mut clauses, &mut values);

        let sql = format!(
            "{MEMORY_SELECT} {} ORDER BY m.last_accessed ASC, m.id DESC",
            where_clause(&clauses)
        );
        let rows = self.query_memories(&sql, &values)?;

        let now = self.now();
        let mut items = Vec::new();
        for memory in rows {
            let classification = classify_freshness(&memory, now);
            if matches!(classification, Freshness::NeedsReview | Freshness::Outdated) {
                let linked = self.link_neighborhood(memory)?;
                items.push(ReviewItem {
                    linked,
                    classification,
                });
            }
        }
        Ok(items)
    }

    /// All links touching a memory, either direction
    pub fn links_of(&self, id: &str) -> Result<Vec<Link>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT from_id, to_id, kind FROM memory_links
                 WHERE from_id = ?1 OR to_id = ?1
                 ORDER BY from_id, to_id, kind",
            )
            .map_err(CortexError::from)?;
        let links = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?
            .into_iter()
            .map(|(from_id, to_id, kind)| Link {
                from_id,
                to_id,
                kind: LinkKind::try_parse(&kind).unwrap_or(LinkKind::Other),
            })
            .collect();
        Ok(links)
    }

    /// One-hop neighborhood of a memory; deeper hops are only flagged
    fn link_neighborhood(&self, memory: Memory) -> Result<LinkedMemory> {
        let links = self.links_of(&memory.id)?;
        let mut related_ids: Vec<String> = Vec::new();
        for link in &links {
            let other = if link.from_id == memory.id {
                &link.to_id
            } else {
                &link.from_id
            };
            if !related_ids.contains(other) {
                related_ids.push(other.clone());
            }
        }

        let mut more_available = false;
        {
            let reader = self.reader()?;
            for neighbor in &related_ids {
                let beyond: i64 = reader
                    .query_row(
                        "SELECT COUNT(*) FROM memory_links
                         WHERE (from_id = ?1 OR to_id = ?1)
                           AND from_id <> ?2 AND to_id <> ?2",
                        params![neighbor, memory.id],
                        |row| row.get(0),
                    )
                    .map_err(CortexError::from)?;
                if beyond > 0 {
                    more_available = true;
                    break;
                }
            }
        }

        Ok(LinkedMemory {
            memory,
            related_ids,
            more_available,
        })
    }

    // ========================================================================
    // RECALL
    // ========================================================================

    /// Ranked retrieval. Hybrid is the default mode upstream; when the
    /// embedder is unavailable, semantic and hybrid degrade to keyword
    /// results with the outcome marked `degraded`.
    pub fn recall(
        &self,
        query: &str,
        mode: SearchMode,
        filter: &MemoryFilter,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<RecallOutcome> {
        if query.trim().is_empty() {
            return Err(CortexError::invalid_at("query", "must not be empty"));
        }

        let limit = effective_limit(limit);
        let pool = ((offset + limit) * HYBRID_POOL_FACTOR).max(limit) as usize;

        let (scores, degraded) = match mode {
            SearchMode::Keyword => (self.keyword_hits(query, filter, pool)?, false),
            SearchMode::Semantic => {
                if self.embedder.is_available() {
                    (
                        self.semantic_hits(query, filter, pool, DEFAULT_SEMANTIC_THRESHOLD)?,
                        false,
                    )
                } else {
                    tracing::warn!("semantic recall degraded to keyword: embedder unavailable");
                    (self.keyword_hits(query, filter, pool)?, true)
                }
            }
            SearchMode::Hybrid => {
                let keyword = self.keyword_hits(query, filter, pool)?;
                if self.embedder.is_available() {
                    let semantic =
                        self.semantic_hits(query, filter, pool, DEFAULT_SEMANTIC_THRESHOLD)?;
                    (hybrid_combine(&keyword, &semantic), false)
                } else {
                    tracing::warn!("hybrid recall degraded to keyword: embedder unavailable");
                    (keyword, true)
                }
            }
        };

        let mut hits = Vec::with_capacity(scores.len());
        for (id, score) in scores {
            if let Some(memory) = self.get_memory_raw(&id)? {
                hits.push(ScoredMemory { memory, score });
            }
        }

        // Default visibility: derived-outdated rows stay hidden unless the
        // caller filtered on status explicitly
        if filter.status.is_none() {
            let now = self.now();
            hits.retain(|hit| classify_freshness(&hit.memory, now) != Freshness::Outdated);
        }

        hits.sort_by(rank_order);
        let page: Vec<ScoredMemory> = hits
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        self.record_access(&page.iter().map(|h| h.memory.id.clone()).collect::<Vec<_>>())?;

        Ok(RecallOutcome {
            results: page,
            degraded,
        })
    }

    /// FTS hits with filters applied in SQL. Scores are sign-flipped BM25
    /// ranks (higher is better).
    fn keyword_hits(
        &self,
        query: &str,
        filter: &MemoryFilter,
        pool: usize,
    ) -> Result<Vec<(String, f32)>> {
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(vec![]);
        }

        let mut clauses: Vec<String> = vec!["memories_fts MATCH ?1".to_string()];
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(sanitized)];
        push_filter_sql(filter, &mut clauses, &mut values);
        values.push(Box::new(pool as i64));
        let limit_pos = values.len();

        let sql = format!(
            "SELECT m.id, rank FROM memories_fts f
             JOIN memories m ON m.id = f.id
             WHERE {}
             ORDER BY rank
             LIMIT ?{limit_pos}",
            clauses.join(" AND ")
        );

        let reader = self.reader()?;
        let mut stmt = reader.prepare(&sql).map_err(CortexError::from)?;
        let hits = stmt
            .query_map(
                params_from_iter(values.iter().map(|v| v.as_ref())),
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)? as f32)),
            )
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?
            .into_iter()
            .map(|(id, rank)| (id, (-rank).max(0.0)))
            .collect();

        Ok(hits)
    }

    /// Cosine similarity against every filtered candidate that has a vector
    fn semantic_hits(
        &self,
        query: &str,
        filter: &MemoryFilter,
        pool: usize,
        threshold: f32,
    ) -> Result<Vec<(String, f32)>> {
        let query_vector = match self.query_embedding(query) {
            Some(v) => v,
            None => return Ok(vec![]),
        };

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        push_filter_sql(filter, &mut clauses, &mut values);

        let sql = format!(
            "SELECT m.id, e.embedding FROM memories m
             JOIN memory_embeddings e ON e.memory_id = m.id
             {}",
            where_clause(&clauses)
        );

        let candidates: Vec<(String, Vec<u8>)> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare(&sql).map_err(CortexError::from)?;
            let rows = stmt
                .query_map(
                    params_from_iter(values.iter().map(|v| v.as_ref())),
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
                )
                .map_err(CortexError::from)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CortexError::from)?;
            rows
        };

        let mut hits: Vec<(String, f32)> = candidates
            .into_iter()
            .filter_map(|(id, bytes)| {
                let vector = vector_from_bytes(&bytes)?;
                let similarity = cosine_similarity(&query_vector, &vector);
                (similarity >= threshold).then_some((id, similarity))
            })
            .collect();

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(pool);
        Ok(hits)
    }

    /// Query embedding, memoized in the LRU cache
    fn query_embedding(&self, query: &str) -> Option<Vec<f32>> {
        {
            let mut cache = self.query_cache.lock().ok()?;
            if let Some(hit) = cache.get(query) {
                return Some(hit.clone());
            }
        }

        match self.embedder.embed(&[query]) {
            Ok(mut vectors) if !vectors.is_empty() => {
                let vector = vectors.remove(0);
                if let Ok(mut cache) = self.query_cache.lock() {
                    cache.put(query.to_string(), vector.clone());
                }
                Some(vector)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("query embedding failed: {}", e);
                None
            }
        }
    }

    /// Write-time embedding of `content + " " + context`; failures become
    /// the no-vector outcome
    fn embed_for_write(&self, content: &str, context: Option<&str>) -> Option<Vec<f32>> {
        if !self.embedder.is_available() {
            return None;
        }
        let text = match context {
            Some(ctx) if !ctx.trim().is_empty() => format!("{content} {ctx}"),
            _ => content.to_string(),
        };
        match self.embedder.embed(&[text.as_str()]) {
            Ok(mut vectors) if !vectors.is_empty() => Some(vectors.remove(0)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("write-time embedding failed, storing without vector: {}", e);
                None
            }
        }
    }

    /// Batched access bookkeeping: one UPDATE per read that returned N
    /// memories
    fn record_access(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let now = ts(self.now());

        let sql = format!(
            "UPDATE memories SET access_count = access_count + 1, last_accessed = ?1
             WHERE id IN ({})",
            placeholders(ids.len(), 2)
        );
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(now)];
        for id in ids {
            values.push(Box::new(id.clone()));
        }

        let writer = self.writer()?;
        writer
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))
            .map_err(CortexError::from)?;
        drop(writer);

        touch_catalog(&self.db_path);
        Ok(())
    }

    fn query_memories(&self, sql: &str, values: &[Box<dyn ToSql>]) -> Result<Vec<Memory>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(sql).map_err(CortexError::from)?;
        let mut memories = stmt
            .query_map(
                params_from_iter(values.iter().map(|v| v.as_ref())),
                row_to_memory,
            )
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?;

        for memory in &mut memories {
            memory.tags = load_tags(&reader, &memory.id)?;
        }
        Ok(memories)
    }

    /// Hide derived-outdated rows when the caller did not filter on status
    fn apply_derived_visibility(&self, rows: Vec<Memory>, filter: &MemoryFilter) -> Vec<Memory> {
        if filter.status.is_some() {
            return rows;
        }
        let now = self.now();
        rows.into_iter()
            .filter(|m| classify_freshness(m, now) != Freshness::Outdated)
            .collect()
    }

    // ========================================================================
    // ACTIVITIES
    // ========================================================================

    /// Ingest a hook event: redact, summarize, assign the current session
    /// (starting one if needed), persist, and broadcast. A `stop` event
    /// closes the session after being recorded.
    pub fn log_activity(&self, input: ActivityInput) -> Result<Activity> {
        if !input.success
            && input
                .error_message
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(CortexError::invalid_at(
                "errorMessage",
                "required when success is false",
            ));
        }

        // Redaction must never be skipped; a panic here aborts the write
        let redacted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let tool_input = input.tool_input.as_ref().map(redact::redact_to_string);
            let tool_output = input.tool_output.as_ref().map(|v| {
                let mut text = redact::redact_to_string(v);
                if text.chars().count() > MAX_TOOL_OUTPUT_CHARS {
                    text = text.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
                }
                text
            });
            (tool_input, tool_output)
        }))
        .map_err(|_| CortexError::Internal("redaction panicked; activity not written".into()))?;
        let (tool_input, tool_output) = redacted;

        let summaries = summarize(&input);
        let projections = project(input.tool_name.as_deref(), input.tool_input.as_ref());

        let file_path = input.file_path.clone().or_else(|| {
            input
                .tool_input
                .as_ref()
                .and_then(|v| v.get("file_path").or_else(|| v.get("path")))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

        let now = self.now();
        let session = self.ensure_current_session(now)?;
        let id = new_id("act", self.clock.as_ref());

        {
            let writer = self.writer()?;
            writer
                .execute(
                    "INSERT INTO activities (
                        id, session_id, event_type, tool_name, tool_input, tool_output,
                        success, error_message, duration_ms, file_path, timestamp,
                        command_name, command_scope, mcp_server, skill_name,
                        summary, summary_detail
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    params![
                        id,
                        session.id,
                        input.event_type.as_str(),
                        input.tool_name,
                        tool_input,
                        tool_output,
                        input.success,
                        input.error_message,
                        input.duration_ms.map(|d| d as i64),
                        file_path,
                        ts(now),
                        projections.command_name,
                        projections.command_scope.map(|s| s.as_str().to_string()),
                        projections.mcp_server,
                        projections.skill_name,
                        summaries.brief,
                        summaries.detail,
                    ],
                )
                .map_err(CortexError::from)?;
        }

        self.emit(ChangeKind::ActivityLogged, Some(id.clone()));

        // A stop event closes the session it was just recorded into
        if input.event_type == EventType::Stop {
            self.close_current_session(now)?;
        }

        self.get_activity(&id)?
            .ok_or_else(|| CortexError::Internal(format!("activity {id} vanished after insert")))
    }

    /// Fetch one activity
    pub fn get_activity(&self, id: &str) -> Result<Option<Activity>> {
        let reader = self.reader()?;
        reader
            .query_row(
                &format!("{ACTIVITY_SELECT} WHERE id = ?1"),
                params![id],
                row_to_activity,
            )
            .optional()
            .map_err(CortexError::from)
    }

    /// List activities, newest first
    pub fn get_activities(
        &self,
        filter: &ActivityFilter,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<Activity>> {
        let limit = effective_limit(limit);

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(session_id) = &filter.session_id {
            values.push(Box::new(session_id.clone()));
            clauses.push(format!("session_id = ?{}", values.len()));
        }
        if let Some(tool_name) = &filter.tool_name {
            values.push(Box::new(tool_name.clone()));
            clauses.push(format!("tool_name = ?{}", values.len()));
        }
        if let Some(event_types) = &filter.event_type {
            if !event_types.is_empty() {
                let start = values.len() + 1;
                for event_type in event_types {
                    values.push(Box::new(event_type.as_str().to_string()));
                }
                clauses.push(format!(
                    "event_type IN ({})",
                    placeholders(event_types.len(), start)
                ));
            }
        }
        if let Some(since) = &filter.since {
            values.push(Box::new(ts(*since)));
            clauses.push(format!("timestamp >= ?{}", values.len()));
        }
        if filter.failed_only {
            clauses.push("success = 0".to_string());
        }

        values.push(Box::new(limit as i64));
        let limit_pos = values.len();
        values.push(Box::new(offset as i64));
        let offset_pos = values.len();

        let sql = format!(
            "{ACTIVITY_SELECT} {} ORDER BY timestamp DESC, id DESC LIMIT ?{limit_pos} OFFSET ?{offset_pos}",
            where_clause(&clauses)
        );

        let reader = self.reader()?;
        let mut stmt = reader.prepare(&sql).map_err(CortexError::from)?;
        let activities = stmt
            .query_map(
                params_from_iter(values.iter().map(|v| v.as_ref())),
                row_to_activity,
            )
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?;

        Ok(activities)
    }

    /// Interleaved memory and activity events from the last `hours`, newest
    /// first
    pub fn get_timeline(&self, hours: u32) -> Result<Vec<TimelineEvent>> {
        let now = self.now();
        let since = now - chrono::Duration::hours(hours.max(1) as i64);

        let memory_sql = format!("{MEMORY_SELECT} WHERE m.updated_at >= ?1");
        let values: Vec<Box<dyn ToSql>> = vec![Box::new(ts(since))];
        let memories = self.query_memories(&memory_sql, &values)?;

        let activities = self.get_activities(
            &ActivityFilter {
                since: Some(since),
                ..Default::default()
            },
            Some(crate::types::MAX_LIMIT),
            0,
        )?;

        let mut events: Vec<TimelineEvent> = Vec::with_capacity(memories.len() + activities.len());
        for memory in memories {
            events.push(TimelineEvent::Memory {
                at: memory.updated_at,
                memory,
            });
        }
        for activity in activities {
            events.push(TimelineEvent::Activity {
                at: activity.timestamp,
                activity,
            });
        }

        events.sort_by(|a, b| b.at().cmp(&a.at()));
        Ok(events)
    }

    // ========================================================================
    // SESSIONS
    // ========================================================================

    /// The current session, if any
    pub fn current_session(&self) -> Result<Option<Session>> {
        let reader = self.reader()?;
        let session = reader
            .query_row(
                &format!("{SESSION_SELECT} WHERE s.ended_at IS NULL"),
                [],
                row_to_session,
            )
            .optional()
            .map_err(CortexError::from)?;
        Ok(session)
    }

    /// Fetch one session
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let reader = self.reader()?;
        reader
            .query_row(
                &format!("{SESSION_SELECT} WHERE s.id = ?1"),
                params![id],
                row_to_session,
            )
            .optional()
            .map_err(CortexError::from)
    }

    /// Explicitly start a session, ending any current one first
    pub fn start_session(&self, project_path: Option<String>) -> Result<Session> {
        let now = self.now();
        self.close_current_session(now)?;

        let id = new_id("ses", self.clock.as_ref());
        let project = project_path.unwrap_or_else(|| self.project_path.clone());

        {
            let writer = self.writer()?;
            writer
                .execute(
                    "INSERT INTO sessions (id, project_path, started_at) VALUES (?1, ?2, ?3)",
                    params![id, project, ts(now)],
                )
                .map_err(CortexError::from)?;
        }

        self.session_state.write(&SessionState {
            current_session_id: Some(id.clone()),
            started_at: Some(now),
        })?;
        self.emit(ChangeKind::SessionUpdated, Some(id.clone()));

        self.get_session(&id)?
            .ok_or_else(|| CortexError::Internal(format!("session {id} vanished after insert")))
    }

    /// Explicitly end the current session. Errors when none is open.
    pub fn end_session(&self) -> Result<Session> {
        let now = self.now();
        self.close_current_session(now)?
            .ok_or_else(|| CortexError::NotFound("no current session".to_string()))
    }

    /// Current session, recent activities, and recently touched memories
    /// with one hop of links
    pub fn session_context(&self) -> Result<SessionContext> {
        let current_session = self.current_session()?;
        let recent_activities =
            self.get_activities(&ActivityFilter::default(), Some(CONTEXT_RECENT), 0)?;

        let filter = MemoryFilter::default();
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        push_filter_sql(&filter, &mut clauses, &mut values);
        values.push(Box::new(CONTEXT_RECENT as i64));
        let limit_pos = values.len();

        let sql = format!(
            "{MEMORY_SELECT} {} ORDER BY COALESCE(m.last_accessed, m.created_at) DESC, m.id DESC LIMIT ?{limit_pos}",
            where_clause(&clauses)
        );
        let memories = self.query_memories(&sql, &values)?;

        let mut recent_memories = Vec::with_capacity(memories.len());
        for memory in memories {
            recent_memories.push(self.link_neighborhood(memory)?);
        }

        Ok(SessionContext {
            current_session,
            recent_activities,
            recent_memories,
            stats: self.stats()?,
        })
    }

    /// Read the session state file, falling back to the catalog when the
    /// cache is stale, and start a session when none is open
    fn ensure_current_session(&self, now: DateTime<Utc>) -> Result<Session> {
        let state = self.session_state.read();
        if let Some(id) = &state.current_session_id {
            if let Some(session) = self.get_session(id)? {
                if session.ended_at.is_none() {
                    return Ok(session);
                }
            }
            // Stale cache: the session ended or was removed underneath us
            tracing::debug!("session state file pointed at closed session {id}");
        }

        if let Some(session) = self.current_session()? {
            self.session_state.write(&SessionState {
                current_session_id: Some(session.id.clone()),
                started_at: Some(session.started_at),
            })?;
            return Ok(session);
        }

        let id = new_id("ses", self.clock.as_ref());
        {
            let writer = self.writer()?;
            writer
                .execute(
                    "INSERT INTO sessions (id, project_path, started_at) VALUES (?1, ?2, ?3)",
                    params![id, self.project_path, ts(now)],
                )
                .map_err(CortexError::from)?;
        }
        self.session_state.write(&SessionState {
            current_session_id: Some(id.clone()),
            started_at: Some(now),
        })?;
        self.emit(ChangeKind::SessionUpdated, Some(id.clone()));

        self.get_session(&id)?
            .ok_or_else(|| CortexError::Internal(format!("session {id} vanished after insert")))
    }

    /// Close the current session if one is open: set `ended_at`, derive the
    /// summary from its activities, clear the state file
    fn close_current_session(&self, now: DateTime<Utc>) -> Result<Option<Session>> {
        let Some(current) = self.current_session()? else {
            self.session_state.clear()?;
            return Ok(None);
        };

        let ended_at = now.max(current.started_at);

        let briefs: Vec<String> = {
            let reader = self.reader()?;
            let mut stmt = reader
                .prepare(
                    "SELECT summary FROM activities
                     WHERE session_id = ?1 AND summary IS NOT NULL
                     ORDER BY timestamp ASC",
                )
                .map_err(CortexError::from)?;
            stmt.query_map(params![current.id], |row| row.get::<_, String>(0))
                .map_err(CortexError::from)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CortexError::from)?
        };
        let summary = derive_session_summary(&briefs, current.activity_count);

        {
            let writer = self.writer()?;
            writer
                .execute(
                    "UPDATE sessions SET ended_at = ?2, summary = ?3 WHERE id = ?1",
                    params![current.id, ts(ended_at), summary],
                )
                .map_err(CortexError::from)?;
        }

        self.session_state.clear()?;
        self.emit(ChangeKind::SessionUpdated, Some(current.id.clone()));

        self.get_session(&current.id)
    }

    // ========================================================================
    // USER MESSAGES
    // ========================================================================

    /// Capture a user utterance with derived style metrics. Assigned to the
    /// current session when one exists; does not start one.
    pub fn record_user_message(&self, content: &str) -> Result<UserMessage> {
        if content.trim().is_empty() {
            return Err(CortexError::invalid_at("content", "must not be empty"));
        }

        let now = self.now();
        let id = new_id("msg", self.clock.as_ref());
        let session_id = self.current_session()?.map(|s| s.id);

        let word_count = content.split_whitespace().count() as u32;
        let char_count = content.chars().count() as u32;
        let line_count = content.lines().count().max(1) as u32;
        let has_code_blocks = content.contains("```");
        let has_questions = content.contains('?');
        let has_commands = content.contains('`') && !has_code_blocks
            || content.lines().any(|l| l.trim_start().starts_with('$'));
        let tones = derive_tones(content);
        let tones_json = serde_json::to_string(
            &tones.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        )?;

        {
            let writer = self.writer()?;
            writer
                .execute(
                    "INSERT INTO user_messages (
                        id, session_id, content, word_count, char_count, line_count,
                        has_code_blocks, has_questions, has_commands, tone_indicators, timestamp
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        id,
                        session_id,
                        content,
                        word_count as i64,
                        char_count as i64,
                        line_count as i64,
                        has_code_blocks,
                        has_questions,
                        has_commands,
                        tones_json,
                        ts(now),
                    ],
                )
                .map_err(CortexError::from)?;
        }

        self.emit(ChangeKind::StatsUpdated, Some(id.clone()));

        Ok(UserMessage {
            id,
            session_id,
            content: content.to_string(),
            word_count,
            char_count,
            line_count,
            has_code_blocks,
            has_questions,
            has_commands,
            tone_indicators: tones,
            timestamp: now,
        })
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Aggregate catalog statistics
    pub fn stats(&self) -> Result<CatalogStats> {
        let reader = self.reader()?;
        let one = |sql: &str| -> Result<u64> {
            reader
                .query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(CortexError::from)
        };

        Ok(CatalogStats {
            active_memories: one("SELECT COUNT(*) FROM memories WHERE status <> 'archived'")?,
            total_memories: one("SELECT COUNT(*) FROM memories")?,
            total_activities: one("SELECT COUNT(*) FROM activities")?,
            total_sessions: one("SELECT COUNT(*) FROM sessions")?,
            distinct_tags: one(
                "SELECT COUNT(DISTINCT t.tag) FROM memory_tags t
                 JOIN memories m ON m.id = t.memory_id WHERE m.status <> 'archived'",
            )?,
            total_user_messages: one("SELECT COUNT(*) FROM user_messages")?,
        })
    }
}

// ============================================================================
// EXPORT SUPPORT
// ============================================================================

impl Storage {
    pub(crate) fn writer_for_import(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer()
    }

    pub(crate) fn after_import(&self) {
        // Imported rows changed every aggregate at once; the state file may
        // also be stale if the bundle carried an open session
        if let Ok(Some(session)) = self.current_session() {
            let _ = self.session_state.write(&SessionState {
                current_session_id: Some(session.id.clone()),
                started_at: Some(session.started_at),
            });
        }
        self.emit(ChangeKind::DatabaseChanged, None);
        self.emit(ChangeKind::StatsUpdated, None);
    }

    pub(crate) fn export_memories(&self) -> Result<Vec<super::ExportMemory>> {
        let values: Vec<Box<dyn ToSql>> = Vec::new();
        let memories =
            self.query_memories(&format!("{MEMORY_SELECT} ORDER BY m.id ASC"), &values)?;

        let reader = self.reader()?;
        let mut out = Vec::with_capacity(memories.len());
        for memory in memories {
            let embedding: Option<Vec<u8>> = reader
                .query_row(
                    "SELECT embedding FROM memory_embeddings WHERE memory_id = ?1",
                    params![memory.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(CortexError::from)?;
            out.push(super::ExportMemory {
                memory,
                embedding: embedding.as_deref().and_then(vector_from_bytes),
            });
        }
        Ok(out)
    }

    pub(crate) fn export_activities(&self) -> Result<Vec<Activity>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(&format!("{ACTIVITY_SELECT} ORDER BY id ASC"))
            .map_err(CortexError::from)?;
        let activities = stmt
            .query_map([], row_to_activity)
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?;
        Ok(activities)
    }

    pub(crate) fn export_sessions(&self) -> Result<Vec<Session>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(&format!("{SESSION_SELECT} ORDER BY s.id ASC"))
            .map_err(CortexError::from)?;
        let sessions = stmt
            .query_map([], row_to_session)
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?;
        Ok(sessions)
    }

    pub(crate) fn export_links(&self) -> Result<Vec<super::ExportLink>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT from_id, to_id, kind, created_at FROM memory_links
                 ORDER BY from_id, to_id, kind",
            )
            .map_err(CortexError::from)?;
        let links = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    parse_ts_sql(row, 3)?,
                ))
            })
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?
            .into_iter()
            .map(|(from_id, to_id, kind, created_at)| super::ExportLink {
                from_id,
                to_id,
                kind: LinkKind::try_parse(&kind).unwrap_or(LinkKind::Other),
                created_at,
            })
            .collect();
        Ok(links)
    }

    pub(crate) fn export_user_messages(&self) -> Result<Vec<UserMessage>> {
        let reader = self.reader()?;
        let mut stmt = reader
            .prepare(
                "SELECT id, session_id, content, word_count, char_count, line_count,
                        has_code_blocks, has_questions, has_commands, tone_indicators, timestamp
                 FROM user_messages ORDER BY id ASC",
            )
            .map_err(CortexError::from)?;
        let messages = stmt
            .query_map([], |row| {
                let tones_json: String = row.get(9)?;
                let tones: Vec<String> =
                    serde_json::from_str(&tones_json).unwrap_or_default();
                Ok(UserMessage {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    content: row.get(2)?,
                    word_count: row.get::<_, i64>(3)?.max(0) as u32,
                    char_count: row.get::<_, i64>(4)?.max(0) as u32,
                    line_count: row.get::<_, i64>(5)?.max(0) as u32,
                    has_code_blocks: row.get(6)?,
                    has_questions: row.get(7)?,
                    has_commands: row.get(8)?,
                    tone_indicators: tones
                        .iter()
                        .filter_map(|t| ToneIndicator::try_parse(t))
                        .collect(),
                    timestamp: parse_ts_sql(row, 10)?,
                })
            })
            .map_err(CortexError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(CortexError::from)?;
        Ok(messages)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const MEMORY_SELECT: &str = "SELECT m.id, m.content, m.context, m.memory_type, m.status,
    m.importance_score, m.access_count, m.created_at, m.updated_at, m.last_accessed,
    EXISTS(SELECT 1 FROM memory_embeddings e WHERE e.memory_id = m.id) AS has_embedding
    FROM memories m";

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        context: row.get(2)?,
        memory_type: MemoryType::parse_name(&row.get::<_, String>(3)?),
        status: MemoryStatus::try_parse(&row.get::<_, String>(4)?)
            .unwrap_or(MemoryStatus::Fresh),
        importance_score: row.get::<_, i64>(5)?.clamp(0, 100) as u8,
        access_count: row.get::<_, i64>(6)?.max(0) as u32,
        created_at: parse_ts_sql(row, 7)?,
        updated_at: parse_ts_sql(row, 8)?,
        last_accessed: parse_ts_sql_opt(row, 9)?,
        tags: Vec::new(),
        has_embedding: row.get(10)?,
    })
}

/// Tags of one memory, alphabetical
fn load_tags(conn: &Connection, memory_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT tag FROM memory_tags WHERE memory_id = ?1 ORDER BY tag ASC")
        .map_err(CortexError::from)?;
    let tags = stmt
        .query_map(params![memory_id], |row| row.get::<_, String>(0))
        .map_err(CortexError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(CortexError::from)?;
    Ok(tags)
}

const ACTIVITY_SELECT: &str = "SELECT id, session_id, event_type, tool_name, tool_input,
    tool_output, success, error_message, duration_ms, file_path, timestamp,
    command_name, command_scope, mcp_server, skill_name, summary, summary_detail
    FROM activities";

fn row_to_activity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        session_id: row.get(1)?,
        event_type: EventType::try_parse(&row.get::<_, String>(2)?)
            .unwrap_or(EventType::PostToolUse),
        tool_name: row.get(3)?,
        tool_input: row.get(4)?,
        tool_output: row.get(5)?,
        success: row.get(6)?,
        error_message: row.get(7)?,
        duration_ms: row.get::<_, Option<i64>>(8)?.map(|d| d.max(0) as u64),
        file_path: row.get(9)?,
        timestamp: parse_ts_sql(row, 10)?,
        command_name: row.get(11)?,
        command_scope: row
            .get::<_, Option<String>>(12)?
            .as_deref()
            .and_then(CommandScope::try_parse),
        mcp_server: row.get(13)?,
        skill_name: row.get(14)?,
        summary: row.get(15)?,
        summary_detail: row.get(16)?,
    })
}

const SESSION_SELECT: &str = "SELECT s.id, s.project_path, s.started_at, s.ended_at, s.summary,
    (SELECT COUNT(*) FROM activities a WHERE a.session_id = s.id) AS activity_count
    FROM sessions s";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        project_path: row.get(1)?,
        started_at: parse_ts_sql(row, 2)?,
        ended_at: parse_ts_sql_opt(row, 3)?,
        summary: row.get(4)?,
        activity_count: row.get::<_, i64>(5)?.max(0) as u32,
    })
}

// ============================================================================
// SQL HELPERS
// ============================================================================

/// RFC-3339 at second precision, the catalog's canonical timestamp form
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_ts_sql(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("bad timestamp: {raw}").into(),
        )
    })
}

fn parse_ts_sql_opt(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_ts(&raw)
            .map(Some)
            .ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    format!("bad timestamp: {raw}").into(),
                )
            }),
    }
}

/// `?n, ?n+1, ...` placeholder list starting at position `start`
fn placeholders(count: usize, start: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", start + i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

/// Translate a [`MemoryFilter`] into SQL clauses over alias `m`
fn push_filter_sql(
    filter: &MemoryFilter,
    clauses: &mut Vec<String>,
    values: &mut Vec<Box<dyn ToSql>>,
) {
    match &filter.memory_type {
        Some(types) if !types.is_empty() => {
            let start = values.len() + 1;
            for t in types {
                values.push(Box::new(t.as_str().to_string()));
            }
            clauses.push(format!(
                "m.memory_type IN ({})",
                placeholders(types.len(), start)
            ));
        }
        _ => {}
    }

    match &filter.status {
        Some(statuses) if !statuses.is_empty() => {
            let start = values.len() + 1;
            for s in statuses {
                values.push(Box::new(s.as_str().to_string()));
            }
            clauses.push(format!(
                "m.status IN ({})",
                placeholders(statuses.len(), start)
            ));
        }
        Some(_) => {}
        None => clauses.push("m.status <> 'archived'".to_string()),
    }

    if !filter.tags.is_empty() {
        let start = values.len() + 1;
        for tag in &filter.tags {
            values.push(Box::new(tag.clone()));
        }
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM memory_tags t WHERE t.memory_id = m.id AND t.tag IN ({}))",
            placeholders(filter.tags.len(), start)
        ));
    }

    if let Some(min) = filter.min_importance {
        values.push(Box::new(min as i64));
        clauses.push(format!("m.importance_score >= ?{}", values.len()));
    }
    if let Some(max) = filter.max_importance {
        values.push(Box::new(max as i64));
        clauses.push(format!("m.importance_score <= ?{}", values.len()));
    }
    if let Some(after) = filter.accessed_after {
        values.push(Box::new(ts(after)));
        clauses.push(format!("m.last_accessed >= ?{}", values.len()));
    }
    if let Some(before) = filter.accessed_before {
        values.push(Box::new(ts(before)));
        clauses.push(format!("m.last_accessed <= ?{}", values.len()));
    }
}

/// Trim, drop empties, and collapse duplicates preserving first occurrence
fn dedupe_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Tone heuristics over a user message
fn derive_tones(content: &str) -> Vec<ToneIndicator> {
    let lower = content.to_lowercase();
    let mut tones = Vec::new();

    if ["asap", "urgent", "immediately", "right now", "!!"]
        .iter()
        .any(|m| lower.contains(m))
    {
        tones.push(ToneIndicator::Urgent);
    }
    if ["please", "thanks", "thank you", "could you", "would you"]
        .iter()
        .any(|m| lower.contains(m))
    {
        tones.push(ToneIndicator::Polite);
    }
    let first_word = lower.split_whitespace().next().unwrap_or("");
    if [
        "fix", "add", "make", "write", "update", "remove", "delete", "run", "change", "create",
        "implement", "refactor", "rename",
    ]
    .contains(&first_word)
    {
        tones.push(ToneIndicator::Direct);
    }
    if content.contains('?')
        || ["what ", "how ", "why ", "when ", "where ", "can ", "does "]
            .iter()
            .any(|m| lower.starts_with(m))
    {
        tones.push(ToneIndicator::Inquisitive);
    }
    if content.contains("```")
        || ["error", "compile", "function", "api", "stack trace", "panic", "segfault", ".rs", "null"]
            .iter()
            .any(|m| lower.contains(m))
    {
        tones.push(ToneIndicator::Technical);
    }
    if ["lol", "btw", "gonna", "kinda", "hey ", "yeah"]
        .iter()
        .any(|m| lower.contains(m))
    {
        tones.push(ToneIndicator::Casual);
    }

    tones
}

// ============================================================================
// TESTS
// ============================================================================
