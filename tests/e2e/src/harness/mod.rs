//! Test harness: throwaway catalogs with controllable capabilities.

use std::sync::Arc;

use cortex_core::{
    Broadcaster, Clock, EmbedError, Embedder, FixedClock, RememberInput, Storage,
};
use tempfile::TempDir;

/// Deterministic bag-of-words embedder. Tokens are lowercased and
/// singularized, so "keys" and "key" share a slot and related phrasings get
/// nonzero cosine similarity without a model download.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dimensions: 64 }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0_f32; self.dimensions];
                for token in text.to_lowercase().split_whitespace() {
                    let token = token.trim_end_matches('s');
                    let mut hash: u64 = 1469598103934665603;
                    for byte in token.bytes() {
                        hash ^= byte as u64;
                        hash = hash.wrapping_mul(1099511628211);
                    }
                    v[(hash % self.dimensions as u64) as usize] += 1.0;
                }
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for x in &mut v {
                        *x /= norm;
                    }
                }
                v
            })
            .collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// A throwaway catalog plus its pinned clock and temp directory
pub struct TestCatalog {
    pub storage: Arc<Storage>,
    pub clock: Arc<FixedClock>,
    pub dir: TempDir,
}

/// Catalog with a working (fake) embedder
pub fn catalog_with_embeddings() -> TestCatalog {
    catalog_with(Arc::new(HashEmbedder::new()))
}

/// Catalog with embeddings off, exercising the degraded paths
pub fn catalog_without_embeddings() -> TestCatalog {
    catalog_with(cortex_core::null_embedder())
}

fn catalog_with(embedder: Arc<dyn Embedder>) -> TestCatalog {
    let dir = TempDir::new().expect("temp dir");
    let clock = Arc::new(FixedClock::new());
    let clock_capability: Arc<dyn Clock> = clock.clone();
    let storage = Storage::open(
        &dir.path().join(".omni-cortex/cortex.db"),
        dir.path(),
        embedder,
        clock_capability,
        Broadcaster::new(dir.path().display().to_string()),
    )
    .expect("open catalog");

    TestCatalog {
        storage: Arc::new(storage),
        clock,
        dir,
    }
}

/// Store a memory with defaults and return its id
pub fn remember(storage: &Storage, content: &str) -> String {
    storage
        .create_memory(RememberInput {
            content: content.to_string(),
            ..Default::default()
        })
        .expect("create memory")
        .id
}
