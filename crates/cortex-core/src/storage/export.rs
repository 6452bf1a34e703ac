//! Catalog export and restore.
//!
//! `json` emits the whole catalog as one object; `jsonl` emits one
//! `{kind, data}` envelope per line. Import replays a bundle into a catalog:
//! `restore` preserves access bookkeeping, `merge` resets it.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::embeddings::vector_to_bytes;
use crate::error::{CortexError, Result};
use crate::types::{Activity, LinkKind, Memory, Session, UserMessage};

use super::sqlite::{ts, Storage};

/// Serialized shape of the export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One JSON object holding every table
    Json,
    /// Newline-delimited `{kind, data}` envelopes
    Jsonl,
}

/// Whether an import preserves access bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Preserve `access_count` and `last_accessed` as exported
    Restore,
    /// Reset access bookkeeping; the rows are new to this catalog
    Merge,
}

/// A memory together with its stored vector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMemory {
    /// The memory row and its tags
    #[serde(flatten)]
    pub memory: Memory,
    /// Stored vector, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// One `(memory, tag)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRow {
    /// Owning memory
    pub memory_id: String,
    /// The tag
    pub tag: String,
}

/// A link row with its provenance timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportLink {
    /// Source memory id
    pub from_id: String,
    /// Target memory id
    pub to_id: String,
    /// Relationship kind
    pub kind: LinkKind,
    /// When the link was made
    pub created_at: DateTime<Utc>,
}

/// The full catalog, serialized
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    /// Schema version the exporting build ran
    pub version: u32,
    /// Every memory with tags and vector
    pub memories: Vec<ExportMemory>,
    /// Every activity
    pub activities: Vec<Activity>,
    /// Every session
    pub sessions: Vec<Session>,
    /// Every link
    pub links: Vec<ExportLink>,
    /// Every `(memory, tag)` pair
    pub tags: Vec<TagRow>,
    /// Every captured user message
    pub user_messages: Vec<UserMessage>,
}

impl ExportBundle {
    /// Render in the requested format
    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => serde_json::to_string_pretty(self).map_err(CortexError::from),
            ExportFormat::Jsonl => {
                let mut lines = Vec::new();
                let mut push = |kind: &str, data: serde_json::Value| {
                    lines.push(
                        serde_json::json!({"kind": kind, "data": data}).to_string(),
                    );
                };

                push("version", serde_json::json!(self.version));
                for m in &self.memories {
                    push("memory", serde_json::to_value(m)?);
                }
                for a in &self.activities {
                    push("activity", serde_json::to_value(a)?);
                }
                for s in &self.sessions {
                    push("session", serde_json::to_value(s)?);
                }
                for l in &self.links {
                    push("link", serde_json::to_value(l)?);
                }
                for t in &self.tags {
                    push("tag", serde_json::to_value(t)?);
                }
                for u in &self.user_messages {
                    push("user_message", serde_json::to_value(u)?);
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Parse back from either rendered format
    pub fn parse(raw: &str, format: ExportFormat) -> Result<Self> {
        match format {
            ExportFormat::Json => serde_json::from_str(raw)
                .map_err(|e| CortexError::invalid(format!("malformed export: {e}"))),
            ExportFormat::Jsonl => {
                let mut bundle = ExportBundle {
                    version: 0,
                    memories: vec![],
                    activities: vec![],
                    sessions: vec![],
                    links: vec![],
                    tags: vec![],
                    user_messages: vec![],
                };

                #[derive(Deserialize)]
                struct Envelope {
                    kind: String,
                    data: serde_json::Value,
                }

                for (lineno, line) in raw.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let envelope: Envelope = serde_json::from_str(line).map_err(|e| {
                        CortexError::invalid(format!("malformed export line {}: {e}", lineno + 1))
                    })?;
                    let bad = |e: serde_json::Error| {
                        CortexError::invalid(format!("malformed export line {}: {e}", lineno + 1))
                    };
                    match envelope.kind.as_str() {
                        "version" => {
                            bundle.version =
                                serde_json::from_value(envelope.data).map_err(bad)?;
                        }
                        "memory" => bundle
                            .memories
                            .push(serde_json::from_value(envelope.data).map_err(bad)?),
                        "activity" => bundle
                            .activities
                            .push(serde_json::from_value(envelope.data).map_err(bad)?),
                        "session" => bundle
                            .sessions
                            .push(serde_json::from_value(envelope.data).map_err(bad)?),
                        "link" => bundle
                            .links
                            .push(serde_json::from_value(envelope.data).map_err(bad)?),
                        "tag" => bundle
                            .tags
                            .push(serde_json::from_value(envelope.data).map_err(bad)?),
                        "user_message" => bundle
                            .user_messages
                            .push(serde_json::from_value(envelope.data).map_err(bad)?),
                        other => {
                            tracing::debug!("skipping unknown export record kind {other}");
                        }
                    }
                }
                Ok(bundle)
            }
        }
    }
}

impl Storage {
    /// Serialize the full catalog
    pub fn export_bundle(&self) -> Result<ExportBundle> {
        let memory_rows = self.export_memories()?;
        let mut tags = Vec::new();
        for m in &memory_rows {
            for tag in &m.memory.tags {
                tags.push(TagRow {
                    memory_id: m.memory.id.clone(),
                    tag: tag.clone(),
                });
            }
        }

        Ok(ExportBundle {
            version: crate::catalog::migrations::supported_version(),
            memories: memory_rows,
            activities: self.export_activities()?,
            sessions: self.export_sessions()?,
            links: self.export_links()?,
            tags,
            user_messages: self.export_user_messages()?,
        })
    }

    /// Serialize and render in one step
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        self.export_bundle()?.render(format)
    }

    /// Replay a bundle into this catalog. Rows keep their exported ids and
    /// timestamps; `merge` resets access bookkeeping. A bundle holding an
    /// open session conflicts with an already-open one here.
    pub fn import_bundle(&self, bundle: &ExportBundle, mode: RestoreMode) -> Result<()> {
        let supported = crate::catalog::migrations::supported_version();
        if bundle.version > supported {
            return Err(CortexError::SchemaNewer {
                found: bundle.version,
                supported,
            });
        }

        let dimension = self.dimension();
        for m in &bundle.memories {
            if let Some(vector) = &m.embedding {
                if vector.len() != dimension {
                    return Err(CortexError::EmbeddingMismatch {
                        catalog: dimension,
                        embedder: vector.len(),
                    });
                }
            }
        }

        {
            let mut writer = self.writer_for_import()?;
            let tx = writer.transaction().map_err(CortexError::from)?;

            for s in &bundle.sessions {
                tx.execute(
                    "INSERT OR REPLACE INTO sessions (id, project_path, started_at, ended_at, summary)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        s.id,
                        s.project_path,
                        ts(s.started_at),
                        s.ended_at.map(ts),
                        s.summary,
                    ],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        CortexError::Conflict(
                            "bundle holds an open session but one is already open here"
                                .to_string(),
                        )
                    }
                    other => CortexError::from(other),
                })?;
            }

            for m in &bundle.memories {
                let (access_count, last_accessed) = match mode {
                    RestoreMode::Restore => {
                        (m.memory.access_count as i64, m.memory.last_accessed.map(ts))
                    }
                    RestoreMode::Merge => (0, None),
                };
                tx.execute(
                    "INSERT OR REPLACE INTO memories (
                        id, content, context, memory_type, status,
                        importance_score, access_count, created_at, updated_at, last_accessed
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        m.memory.id,
                        m.memory.content,
                        m.memory.context,
                        m.memory.memory_type.as_str(),
                        m.memory.status.as_str(),
                        m.memory.importance_score as i64,
                        access_count,
                        ts(m.memory.created_at),
                        ts(m.memory.updated_at),
                        last_accessed,
                    ],
                )
                .map_err(CortexError::from)?;

                if let Some(vector) = &m.embedding {
                    tx.execute(
                        "INSERT OR REPLACE INTO memory_embeddings (memory_id, embedding, dimensions)
                         VALUES (?1, ?2, ?3)",
                        params![m.memory.id, vector_to_bytes(vector), vector.len() as i64],
                    )
                    .map_err(CortexError::from)?;
                }
            }

            for t in &bundle.tags {
                tx.execute(
                    "INSERT OR IGNORE INTO memory_tags (memory_id, tag) VALUES (?1, ?2)",
                    params![t.memory_id, t.tag],
                )
                .map_err(CortexError::from)?;
            }

            for l in &bundle.links {
                tx.execute(
                    "INSERT OR IGNORE INTO memory_links (from_id, to_id, kind, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![l.from_id, l.to_id, l.kind.as_str(), ts(l.created_at)],
                )
                .map_err(CortexError::from)?;
            }

            for a in &bundle.activities {
                tx.execute(
                    "INSERT OR REPLACE INTO activities (
                        id, session_id, event_type, tool_name, tool_input, tool_output,
                        success, error_message, duration_ms, file_path, timestamp,
                        command_name, command_scope, mcp_server, skill_name,
                        summary, summary_detail
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    params![
                        a.id,
                        a.session_id,
                        a.event_type.as_str(),
                        a.tool_name,
                        a.tool_input,
                        a.tool_output,
                        a.success,
                        a.error_message,
                        a.duration_ms.map(|d| d as i64),
                        a.file_path,
                        ts(a.timestamp),
                        a.command_name,
                        a.command_scope.map(|s| s.as_str().to_string()),
                        a.mcp_server,
                        a.skill_name,
                        a.summary,
                        a.summary_detail,
                    ],
                )
                .map_err(CortexError::from)?;
            }

            for u in &bundle.user_messages {
                let tones = serde_json::to_string(
                    &u.tone_indicators.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO user_messages (
                        id, session_id, content, word_count, char_count, line_count,
                        has_code_blocks, has_questions, has_commands, tone_indicators, timestamp
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        u.id,
                        u.session_id,
                        u.content,
                        u.word_count as i64,
                        u.char_count as i64,
                        u.line_count as i64,
                        u.has_code_blocks,
                        u.has_questions,
                        u.has_commands,
                        tones,
                        ts(u.timestamp),
                    ],
                )
                .map_err(CortexError::from)?;
            }

            tx.commit().map_err(CortexError::from)?;
        }

        self.after_import();
        Ok(())
    }
}
