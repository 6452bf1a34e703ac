//! Omni-Cortex stdio server.
//!
//! Opens the project catalog (creating it on first touch), optionally the
//! global catalog instead, and serves the 15 tools over newline-delimited
//! JSON on stdio. Logging goes to stderr; stdout carries only frames.
//!
//! Exit codes: 0 on graceful EOF, non-zero on unrecoverable transport or
//! startup errors.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use cortex_core::{Capabilities, CatalogRegistry, ExternalChangeWatcher};
use cortex_mcp::server::Dispatcher;
use cortex_mcp::protocol::StdioTransport;

/// Stdio tool server for the Omni-Cortex knowledge store
#[derive(Debug, Parser)]
#[command(name = "cortex-mcp", version, about)]
struct Args {
    /// Project directory whose catalog to serve (defaults to the working
    /// directory)
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Put the catalog file in this directory instead of
    /// <project>/.omni-cortex/
    #[arg(long, conflicts_with = "global")]
    data_dir: Option<PathBuf>,

    /// Serve the cross-project global catalog instead of a project catalog
    #[arg(long, conflicts_with = "project_dir")]
    global: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging to stderr; stdout is for frames
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("cortex-mcp v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = CatalogRegistry::new(Capabilities::from_env());

    let storage = if args.global {
        registry.global()
    } else {
        let project_dir = match args.project_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        match args.data_dir {
            Some(data_dir) => registry.project_at(&data_dir, &project_dir),
            None => registry.project(&project_dir),
        }
    };
    let storage = match storage {
        Ok(s) => s,
        Err(e) => {
            error!("failed to open catalog: {e}");
            std::process::exit(1);
        }
    };

    info!(
        project = storage.project_path(),
        catalog = %storage.db_path().display(),
        embedder_available = storage.embedder_available(),
        "catalog open"
    );

    // Fallback signal for writes made by other processes: watch the catalog
    // file and re-broadcast as database_changed. Failure to start the
    // watcher is not fatal.
    let _watcher = match ExternalChangeWatcher::spawn(
        storage.db_path().to_path_buf(),
        storage.broadcaster().clone(),
    ) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("catalog file watcher unavailable: {e}");
            None
        }
    };

    let dispatcher = Dispatcher::new(Arc::clone(&storage));
    let transport = StdioTransport::new();

    info!("serving on stdio");
    if let Err(e) = transport.run(dispatcher).await {
        error!("transport error: {e}");
        std::process::exit(1);
    }

    info!("cortex-mcp shutting down");
    Ok(())
}
