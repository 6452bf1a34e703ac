//! Catalog location and lifecycle.
//!
//! A catalog is one on-disk SQLite file (plus WAL sidecar) holding every
//! entity for a project. Project catalogs live at
//! `<project>/.omni-cortex/cortex.db`; a global catalog aggregating
//! cross-project memories lives under `OMNI_CORTEX_HOME` (or the platform
//! home directory) as `.omni-cortex/global.db`.

pub mod migrations;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::broadcast::Broadcaster;
use crate::clock::{Clock, SystemClock};
use crate::embeddings::{null_embedder, Embedder};
use crate::error::{CortexError, Result};
use crate::storage::Storage;

/// Directory component every catalog lives in
pub const CORTEX_DIR: &str = ".omni-cortex";
/// File name of a project catalog
pub const PROJECT_DB: &str = "cortex.db";
/// File name of the global catalog
pub const GLOBAL_DB: &str = "global.db";
/// Environment override for the global catalog's parent directory
pub const ENV_HOME: &str = "OMNI_CORTEX_HOME";
/// Environment selector for the embedder (`local` | `off`)
pub const ENV_EMBED: &str = "OMNI_CORTEX_EMBED";

/// Resolve the catalog file for a project directory
pub fn project_catalog_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CORTEX_DIR).join(PROJECT_DB)
}

/// Resolve the global catalog file, honoring `OMNI_CORTEX_HOME`
pub fn global_catalog_path() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(ENV_HOME) {
        if !home.is_empty() {
            return Ok(PathBuf::from(home).join(GLOBAL_DB));
        }
    }

    let base = directories::BaseDirs::new()
        .ok_or_else(|| CortexError::Io("could not determine home directory".to_string()))?;
    Ok(base.home_dir().join(CORTEX_DIR).join(GLOBAL_DB))
}

/// Apply PRAGMAs to a connection
pub(crate) fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -64000;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(CortexError::from)?;
    Ok(())
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Capabilities injected into every catalog opened by a registry
#[derive(Clone)]
pub struct Capabilities {
    /// Vector producer
    pub embedder: Arc<dyn Embedder>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl Capabilities {
    /// Capabilities resolved from the environment: the local embedder unless
    /// `OMNI_CORTEX_EMBED=off`, and the system clock.
    pub fn from_env() -> Self {
        let embed_mode = std::env::var(ENV_EMBED).unwrap_or_else(|_| "local".to_string());
        let embedder: Arc<dyn Embedder> = match embed_mode.as_str() {
            "off" => null_embedder(),
            _ => crate::embeddings::default_embedder(),
        };
        Self {
            embedder,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Lazily-opened handles to independent catalogs, keyed by file path.
///
/// The global catalog is just another entry; nothing syncs it with project
/// catalogs. Each handle holds its own advisory lock for its lifetime (the
/// SQLite WAL file lock).
pub struct CatalogRegistry {
    capabilities: Capabilities,
    open: Mutex<HashMap<PathBuf, Arc<Storage>>>,
}

impl CatalogRegistry {
    /// Create a registry with the given capabilities
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or return the already-open handle to) the catalog of a project
    pub fn project(&self, project_dir: &Path) -> Result<Arc<Storage>> {
        self.open_at(project_catalog_path(project_dir), project_dir)
    }

    /// Open (or return the already-open handle to) the global catalog
    pub fn global(&self) -> Result<Arc<Storage>> {
        let path = global_catalog_path()?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.open_at(path, &parent)
    }

    /// Open a project's catalog at an explicit data directory instead of the
    /// conventional `<project>/.omni-cortex/` location. The catalog file
    /// lands in `data_dir`; `project_dir` still names the project the rows
    /// belong to (and hosts the session state file).
    pub fn project_at(&self, data_dir: &Path, project_dir: &Path) -> Result<Arc<Storage>> {
        self.open_at(data_dir.join(PROJECT_DB), project_dir)
    }

    fn open_at(&self, db_path: PathBuf, project_dir: &Path) -> Result<Arc<Storage>> {
        let mut open = self
            .open
            .lock()
            .map_err(|_| CortexError::Internal("registry lock poisoned".to_string()))?;

        if let Some(existing) = open.get(&db_path) {
            return Ok(Arc::clone(existing));
        }

        let storage = Storage::open(
            &db_path,
            project_dir,
            Arc::clone(&self.capabilities.embedder),
            Arc::clone(&self.capabilities.clock),
            Broadcaster::new(project_dir.display().to_string()),
        )?;
        let storage = Arc::new(storage);
        open.insert(db_path, Arc::clone(&storage));
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_catalog_path() {
        let path = project_catalog_path(Path::new("/work/proj"));
        assert_eq!(path, PathBuf::from("/work/proj/.omni-cortex/cortex.db"));
    }

    #[test]
    fn test_project_at_relocates_the_catalog_file() {
        let project = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let registry = CatalogRegistry::new(Capabilities {
            embedder: null_embedder(),
            clock: Arc::new(SystemClock),
        });

        let storage = registry.project_at(data.path(), project.path()).unwrap();
        assert_eq!(storage.db_path(), data.path().join(PROJECT_DB));
        assert!(data.path().join(PROJECT_DB).exists());
        // The conventional location stays empty
        assert!(!project_catalog_path(project.path()).exists());
    }

    #[test]
    fn test_registry_reuses_handles() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CatalogRegistry::new(Capabilities {
            embedder: null_embedder(),
            clock: Arc::new(SystemClock),
        });
        let a = registry.project(dir.path()).unwrap();
        let b = registry.project(dir.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
