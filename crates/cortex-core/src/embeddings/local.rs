//! Local sentence embeddings.
//!
//! Uses fastembed for local ONNX inference with all-MiniLM-L6-v2
//! (384 dimensions, L2-normalized output). Each [`LocalEmbedder`] owns its
//! model lazily: the first embed (or availability probe) loads it, and a
//! load failure is remembered so the storage engine keeps taking the
//! no-vector path instead of retrying the download on every write.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use super::{EmbedError, Embedder, DEFAULT_DIMENSIONS, MAX_TEXT_LENGTH};

/// Local 384-dimension sentence encoder
pub struct LocalEmbedder {
    model: OnceLock<Result<Mutex<TextEmbedding>, EmbedError>>,
}

impl LocalEmbedder {
    /// Create the embedder handle. The model itself loads on first use.
    pub fn new() -> Self {
        Self {
            model: OnceLock::new(),
        }
    }

    fn model(&self) -> Result<&Mutex<TextEmbedding>, EmbedError> {
        match self.model.get_or_init(load_model) {
            Ok(model) => Ok(model),
            Err(e) => Err(e.clone()),
        }
    }
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// Load the ONNX model once per embedder. Model files land in
/// `FASTEMBED_CACHE_PATH` when set, else the platform cache directory, else
/// a dot-directory under the working directory.
fn load_model() -> Result<Mutex<TextEmbedding>, EmbedError> {
    let cache = std::env::var_os("FASTEMBED_CACHE_PATH")
        .map(PathBuf::from)
        .or_else(|| {
            directories::ProjectDirs::from("dev", "omni-cortex", "core")
                .map(|dirs| dirs.cache_dir().join("models"))
        })
        .unwrap_or_else(|| PathBuf::from(".omni-cortex-models"));

    std::fs::create_dir_all(&cache).map_err(|e| {
        EmbedError::Unavailable(format!(
            "cannot create model cache {}: {e}",
            cache.display()
        ))
    })?;

    tracing::debug!("loading all-MiniLM-L6-v2 (cache: {})", cache.display());

    TextEmbedding::try_new(
        InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(cache)
            .with_show_download_progress(false),
    )
    .map(Mutex::new)
    .map_err(|e| {
        EmbedError::Unavailable(format!(
            "all-MiniLM-L6-v2 failed to load (is the ONNX runtime present?): {e}"
        ))
    })
}

/// Clip text to the model's input budget on a char boundary
fn clip(text: &str) -> &str {
    if text.len() <= MAX_TEXT_LENGTH {
        return text;
    }
    let mut end = MAX_TEXT_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl Embedder for LocalEmbedder {
    fn dimension(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let clipped: Vec<&str> = texts.iter().map(|t| clip(t)).collect();

        let mut model = self
            .model()?
            .lock()
            .map_err(|_| EmbedError::Failed("embedding model mutex poisoned".to_string()))?;

        let mut vectors = model
            .embed(clipped, None)
            .map_err(|e| EmbedError::Failed(e.to_string()))?;
        for v in &mut vectors {
            super::l2_normalize(v);
        }

        Ok(vectors)
    }

    fn is_available(&self) -> bool {
        self.model().is_ok()
    }
}
