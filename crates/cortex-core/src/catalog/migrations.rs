//! Catalog migrations.
//!
//! Append-only sequence; each migration runs in a single transaction and is
//! idempotent when re-run at its own version. A catalog whose stored version
//! exceeds the highest version known here refuses to open.

use crate::error::{CortexError, Result};

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: memories, tags, links, embeddings, FTS",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Sessions and activities with analytics projections",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "User message captures",
        up: MIGRATION_V3_UP,
    },
];

/// A catalog migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: memories and their side tables
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    context TEXT,
    memory_type TEXT NOT NULL DEFAULT 'other',
    status TEXT NOT NULL DEFAULT 'fresh',
    importance_score INTEGER NOT NULL DEFAULT 50,
    access_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_accessed TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
CREATE INDEX IF NOT EXISTS idx_memories_status ON memories(status);
CREATE INDEX IF NOT EXISTS idx_memories_last_accessed ON memories(last_accessed);
CREATE INDEX IF NOT EXISTS idx_memories_importance ON memories(importance_score);

-- Interned tags, one row per (memory, tag)
CREATE TABLE IF NOT EXISTS memory_tags (
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (memory_id, tag)
);

CREATE INDEX IF NOT EXISTS idx_memory_tags_tag ON memory_tags(tag);

-- Directed typed graph over memories
CREATE TABLE IF NOT EXISTS memory_links (
    from_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    to_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    kind TEXT NOT NULL DEFAULT 'relates_to',
    created_at TEXT NOT NULL,
    PRIMARY KEY (from_id, to_id, kind),
    CHECK (from_id <> to_id)
);

CREATE INDEX IF NOT EXISTS idx_memory_links_to ON memory_links(to_id);

-- Vector storage (raw little-endian f32 bytes)
CREATE TABLE IF NOT EXISTS memory_embeddings (
    memory_id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL
);

-- FTS5 over content + context
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    id,
    content,
    context,
    content='memories',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(rowid, id, content, context)
    VALUES (NEW.rowid, NEW.id, NEW.content, COALESCE(NEW.context, ''));
END;

CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, id, content, context)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, COALESCE(OLD.context, ''));
END;

CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, id, content, context)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, COALESCE(OLD.context, ''));
    INSERT INTO memories_fts(rowid, id, content, context)
    VALUES (NEW.rowid, NEW.id, NEW.content, COALESCE(NEW.context, ''));
END;

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: sessions and activities
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_path TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    summary TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at);

-- At most one session may be open at a time
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_current
    ON sessions((1)) WHERE ended_at IS NULL;

CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY,
    session_id TEXT REFERENCES sessions(id) ON DELETE SET NULL,
    event_type TEXT NOT NULL,
    tool_name TEXT,
    tool_input TEXT,
    tool_output TEXT,
    success INTEGER NOT NULL DEFAULT 1,
    error_message TEXT,
    duration_ms INTEGER,
    file_path TEXT,
    timestamp TEXT NOT NULL,

    -- Analytics projections
    command_name TEXT,
    command_scope TEXT,
    mcp_server TEXT,
    skill_name TEXT,

    -- Natural-language summaries
    summary TEXT,
    summary_detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_activities_timestamp ON activities(timestamp);
CREATE INDEX IF NOT EXISTS idx_activities_session ON activities(session_id);
CREATE INDEX IF NOT EXISTS idx_activities_tool ON activities(tool_name);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// V3: captured user messages for the style-analysis adapter
const MIGRATION_V3_UP: &str = r#"
CREATE TABLE IF NOT EXISTS user_messages (
    id TEXT PRIMARY KEY,
    session_id TEXT REFERENCES sessions(id) ON DELETE SET NULL,
    content TEXT NOT NULL,
    word_count INTEGER NOT NULL DEFAULT 0,
    char_count INTEGER NOT NULL DEFAULT 0,
    line_count INTEGER NOT NULL DEFAULT 0,
    has_code_blocks INTEGER NOT NULL DEFAULT 0,
    has_questions INTEGER NOT NULL DEFAULT 0,
    has_commands INTEGER NOT NULL DEFAULT 0,
    tone_indicators TEXT NOT NULL DEFAULT '[]',
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_user_messages_session ON user_messages(session_id);
CREATE INDEX IF NOT EXISTS idx_user_messages_timestamp ON user_messages(timestamp);

UPDATE schema_version SET version = 3, applied_at = datetime('now');
"#;

/// Get current schema version from the catalog
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Highest schema version this build understands
pub fn supported_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Apply pending migrations under the writer connection.
///
/// Returns the number of migrations applied. Fails with `SchemaNewer` when
/// the catalog was written by a later build.
pub fn apply_migrations(conn: &rusqlite::Connection) -> Result<u32> {
    let current_version = get_current_version(conn).map_err(CortexError::from)?;
    let supported = supported_version();

    if current_version > supported {
        return Err(CortexError::SchemaNewer {
            found: current_version,
            supported,
        });
    }

    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            // execute_batch handles the multi-statement SQL including triggers;
            // rusqlite wraps it in a transaction when none is open
            conn.execute_batch(migration.up)
                .map_err(CortexError::from)?;

            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_migrations_are_ordered_and_dense() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.version, i as u32 + 1);
        }
    }

    #[test]
    fn test_apply_from_empty() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied, MIGRATIONS.len() as u32);
        assert_eq!(get_current_version(&conn).unwrap(), supported_version());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn test_newer_catalog_refuses_to_open() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        conn.execute(
            "UPDATE schema_version SET version = ?1",
            [supported_version() + 5],
        )
        .unwrap();

        let err = apply_migrations(&conn).unwrap_err();
        assert!(matches!(err, CortexError::SchemaNewer { .. }));
    }

    #[test]
    fn test_one_current_session_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, project_path, started_at) VALUES ('ses-1', '/p', '2025-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO sessions (id, project_path, started_at) VALUES ('ses-2', '/p', '2025-01-01T00:00:01Z')",
            [],
        );
        assert!(second.is_err());
    }
}
