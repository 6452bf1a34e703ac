//! Embedding capability.
//!
//! The storage engine consumes a pluggable [`Embedder`]; which model realizes
//! it is external. The reference realization is a local 384-dimension
//! sentence encoder producing L2-normalized vectors (behind the `embeddings`
//! cargo feature); a [`NullEmbedder`] realizes the `OMNI_CORTEX_EMBED=off`
//! path, under which writes store no vector and semantic reads degrade to
//! keyword search.

#[cfg(feature = "embeddings")]
pub mod local;

use std::sync::Arc;

/// Vector dimension of the reference embedder
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Maximum text length submitted to a model (longer inputs are truncated)
pub const MAX_TEXT_LENGTH: usize = 8192;

// ============================================================================
// ERROR
// ============================================================================

/// Embedding failure
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedError {
    /// The model could not be initialized or is disabled
    #[error("embedder unavailable: {0}")]
    Unavailable(String),
    /// The model failed on this input
    #[error("embedding failed: {0}")]
    Failed(String),
}

// ============================================================================
// CAPABILITY
// ============================================================================

/// Produces fixed-dimension vectors for indexable text
pub trait Embedder: Send + Sync {
    /// Dimension of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed an ordered sequence of texts into an equally ordered sequence
    /// of vectors of [`Embedder::dimension`] length
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Whether the model is loaded and usable right now
    fn is_available(&self) -> bool;
}

/// Embedder that is never available. Writes succeed without a vector and
/// semantic reads degrade.
#[derive(Debug, Default)]
pub struct NullEmbedder;

impl Embedder for NullEmbedder {
    fn dimension(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Unavailable(
            "embeddings disabled (OMNI_CORTEX_EMBED=off)".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Shared handle to a [`NullEmbedder`]
pub fn null_embedder() -> Arc<dyn Embedder> {
    Arc::new(NullEmbedder)
}

/// The embedder a default build ships: the local sentence encoder when the
/// `embeddings` feature is on, the null embedder otherwise.
pub fn default_embedder() -> Arc<dyn Embedder> {
    #[cfg(feature = "embeddings")]
    {
        Arc::new(local::LocalEmbedder::new())
    }
    #[cfg(not(feature = "embeddings"))]
    {
        null_embedder()
    }
}

// ============================================================================
// VECTOR HELPERS
// ============================================================================

/// Serialize a vector as little-endian f32 bytes for BLOB storage
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize a BLOB back into a vector; `None` when the byte length is not
/// a multiple of 4
pub fn vector_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Compute cosine similarity between two vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        dot / denominator
    } else {
        0.0
    }
}

/// L2-normalize a vector in place
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
