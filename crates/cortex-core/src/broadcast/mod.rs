//! Change broadcasting.
//!
//! In-process watchers subscribe to a per-catalog channel of [`ChangeEvent`]s.
//! Delivery is best-effort: each subscriber has a bounded queue and a slow
//! subscriber loses its own oldest events (never anyone else's); the number
//! lost is reported on the next event it does receive. Emitting never blocks
//! and never fails a storage write.
//!
//! Out-of-process watchers get a fallback signal instead: the engine bumps
//! the catalog file's mtime after every committed write, and
//! [`ExternalChangeWatcher`] turns foreign mtime changes back into
//! `database_changed` events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Per-subscriber queue bound; overflow drops that subscriber's oldest events
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A memory was created
    MemoryCreated,
    /// A memory was updated (including archive)
    MemoryUpdated,
    /// A memory was hard-deleted
    MemoryDeleted,
    /// An activity was ingested
    ActivityLogged,
    /// A session started, ended, or changed
    SessionUpdated,
    /// Aggregate statistics moved
    StatsUpdated,
    /// The catalog file changed underneath us (outside process)
    DatabaseChanged,
}

/// A change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// What changed
    pub kind: ChangeKind,
    /// The entity that changed, when there is a single one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Project whose catalog changed
    pub project_path: String,
    /// When the change committed
    pub timestamp: DateTime<Utc>,
    /// Events this subscriber lost since its previous delivery
    pub dropped_count: u64,
}

/// Per-catalog change fan-out
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<ChangeEvent>,
    project_path: String,
}

impl Broadcaster {
    /// Create a broadcaster for one catalog
    pub fn new(project_path: String) -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_QUEUE_CAPACITY);
        Self { tx, project_path }
    }

    /// Register a new subscriber. Unsubscribing is dropping the handle.
    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            rx: self.tx.subscribe(),
            carried_drops: 0,
        }
    }

    /// Emit a change. Never blocks and never fails: with no subscribers the event is
    /// discarded, and a full subscriber queue sheds that subscriber's oldest
    /// event instead of blocking the writer.
    pub fn emit(&self, kind: ChangeKind, entity_id: Option<String>, timestamp: DateTime<Utc>) {
        let event = ChangeEvent {
            kind,
            entity_id,
            project_path: self.project_path.clone(),
            timestamp,
            dropped_count: 0,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!("change event discarded: no subscribers");
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Project this broadcaster serves
    pub fn project_path(&self) -> &str {
        &self.project_path
    }
}

/// Receiving end of a subscription
pub struct Subscriber {
    rx: broadcast::Receiver<ChangeEvent>,
    carried_drops: u64,
}

impl Subscriber {
    /// Wait for the next event. Returns `None` when the broadcaster is gone.
    /// When this subscriber lagged, the lost-event count is folded into the
    /// next delivered event's `dropped_count`.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(mut event) => {
                    event.dropped_count += self.carried_drops;
                    self.carried_drops = 0;
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.carried_drops += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for the next event
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(mut event) => {
                    event.dropped_count += self.carried_drops;
                    self.carried_drops = 0;
                    return Some(event);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    self.carried_drops += n;
                }
                Err(_) => return None,
            }
        }
    }
}

// ============================================================================
// MTIME FALLBACK
// ============================================================================

/// Bump the catalog file's mtime so filesystem watchers see the write.
/// Failures are logged and swallowed; this is a fallback channel.
pub fn touch_catalog(path: &Path) {
    let result = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|file| file.set_modified(std::time::SystemTime::now()));
    if let Err(e) = result {
        tracing::debug!("could not touch catalog {:?}: {}", path, e);
    }
}

/// Watches the catalog file for out-of-process writes and re-emits them as
/// `database_changed` events. Holds the underlying OS watcher for its
/// lifetime; dropping it stops watching.
pub struct ExternalChangeWatcher {
    _watcher: notify::RecommendedWatcher,
}

impl ExternalChangeWatcher {
    /// Start watching `catalog_path`, forwarding modifications through
    /// `broadcaster`.
    pub fn spawn(catalog_path: PathBuf, broadcaster: Broadcaster) -> notify::Result<Self> {
        use notify::{Event, EventKind, RecursiveMode, Watcher};

        let watch_target = catalog_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| catalog_path.clone());

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let is_modify = matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    );
                    let touches_catalog = event.paths.iter().any(|p| p == &catalog_path);
                    if is_modify && touches_catalog {
                        broadcaster.emit(ChangeKind::DatabaseChanged, None, Utc::now());
                    }
                }
                Err(e) => tracing::debug!("catalog watcher error: {}", e),
            })?;

        watcher.watch(&watch_target, RecursiveMode::NonRecursive)?;
        Ok(Self { _watcher: watcher })
    }
}
