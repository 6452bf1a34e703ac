//! Session state persistence.
//!
//! A project has at most one current session. Because hook invocations are
//! separate short-lived processes, the current session id is persisted in a
//! small state file next to the catalog
//! (`<project>/.omni-cortex/current_session.json`) and re-read on every hook
//! event. The catalog's partial unique index is the authority; the state
//! file is a cache that lets a fresh process find the session without a
//! table scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CortexError, Result};

/// File name of the session state cache
pub const STATE_FILE: &str = "current_session.json";

/// On-disk shape of the state file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionState {
    /// Id of the current session, if any
    pub current_session_id: Option<String>,
    /// When it started
    pub started_at: Option<DateTime<Utc>>,
}

/// Reader/writer for the session state file
#[derive(Debug, Clone)]
pub struct SessionStateFile {
    path: PathBuf,
}

impl SessionStateFile {
    /// State file inside a project's `.omni-cortex` directory
    pub fn for_project(project_dir: &Path) -> Self {
        Self {
            path: project_dir
                .join(crate::catalog::CORTEX_DIR)
                .join(STATE_FILE),
        }
    }

    /// Where the file lives
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state. A missing or unparseable file reads as "no current
    /// session" (a corrupt cache must never wedge ingestion).
    pub fn read(&self) -> SessionState {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("unreadable session state file, resetting: {}", e);
                SessionState::default()
            }),
            Err(_) => SessionState::default(),
        }
    }

    /// Persist the state, creating the directory if needed
    pub fn write(&self, state: &SessionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| CortexError::Internal(format!("session state serialize: {e}")))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Clear the state back to "no current session"
    pub fn clear(&self) -> Result<()> {
        self.write(&SessionState::default())
    }
}

/// Derive a session summary from its activities' brief summaries: the most
/// frequent briefs, joined, capped at five.
pub fn derive_session_summary(briefs: &[String], activity_count: u32) -> String {
    if briefs.is_empty() {
        return format!("{activity_count} activities");
    }

    let mut counts: Vec<(String, usize)> = Vec::new();
    for brief in briefs {
        match counts.iter_mut().find(|(b, _)| b == brief) {
            Some((_, n)) => *n += 1,
            None => counts.push((brief.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let highlights: Vec<String> = counts.into_iter().take(5).map(|(b, _)| b).collect();
    format!("{} activities: {}", activity_count, highlights.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionStateFile::for_project(dir.path());
        assert_eq!(file.read(), SessionState::default());
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionStateFile::for_project(dir.path());
        let state = SessionState {
            current_session_id: Some("ses-0000000000123-abcdef".to_string()),
            started_at: Some(Utc::now()),
        };
        file.write(&state).unwrap();
        let read = file.read();
        assert_eq!(read.current_session_id, state.current_session_id);
    }

    #[test]
    fn test_corrupt_file_resets() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionStateFile::for_project(dir.path());
        std::fs::create_dir_all(file.path().parent().unwrap()).unwrap();
        std::fs::write(file.path(), "{not json").unwrap();
        assert_eq!(file.read(), SessionState::default());
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionStateFile::for_project(dir.path());
        file.write(&SessionState {
            current_session_id: Some("ses-1".to_string()),
            started_at: Some(Utc::now()),
        })
        .unwrap();
        file.clear().unwrap();
        assert_eq!(file.read().current_session_id, None);
    }

    #[test]
    fn test_summary_highlights_frequent_briefs() {
        let briefs = vec![
            "edited src/main.rs".to_string(),
            "edited src/main.rs".to_string(),
            "ran cargo".to_string(),
        ];
        let summary = derive_session_summary(&briefs, 3);
        assert!(summary.starts_with("3 activities"));
        assert!(summary.contains("edited src/main.rs"));
    }

    #[test]
    fn test_summary_empty_session() {
        assert_eq!(derive_session_summary(&[], 0), "0 activities");
    }
}
