//! # Embedding Backend Adapter
//!
//! Wraps an external embedding capability behind a small, infallible-by-type
//! surface: backend errors become [`EngineError`] values, raw tensors become
//! normalized vectors, and empty input never reaches the model.
//!
//! ## Why a trait:
//! The engine is tested against deterministic doubles and runs in production
//! against a candle sentence-transformer. Both implement [`EmbeddingBackend`]
//! and are injected into the adapter as `Arc<dyn EmbeddingBackend>`.

use crate::intent::error::{EngineError, EngineResult};
use crate::intent::vector::{self, RawTensor};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// The embedding capability the engine depends on.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Human-readable backend name for logs and health output.
    fn name(&self) -> &str;

    /// Prepare the backend (download weights, load the model). May be slow.
    async fn warm_up(&self) -> anyhow::Result<()>;

    /// Embed one text. The returned layout must be declared explicitly.
    async fn embed(&self, text: &str) -> anyhow::Result<RawTensor>;
}

/// Adapter owned by the command parser and shared with the cache build.
#[derive(Clone)]
pub struct EmbeddingAdapter {
    backend: Arc<dyn EmbeddingBackend>,
}

impl EmbeddingAdapter {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Warm up the backend. Called once per successful initialization.
    pub async fn warm_up(&self) -> EngineResult<()> {
        let start_time = Instant::now();
        tracing::info!("Warming up embedding backend '{}'", self.backend.name());

        self.backend.warm_up().await.map_err(|e| {
            tracing::error!("Embedding backend '{}' failed to warm up: {:#}", self.backend.name(), e);
            EngineError::BackendUnavailable(format!("{:#}", e))
        })?;

        tracing::info!(
            "Embedding backend '{}' ready in {:.2}s",
            self.backend.name(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Embed `text` into a unit-length vector.
    ///
    /// Empty or whitespace-only text yields an empty vector without calling
    /// the backend; the matcher rejects empty vectors.
    pub async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let raw = self
            .backend
            .embed(text)
            .await
            .map_err(|e| EngineError::EmbeddingFailed(format!("{:#}", e)))?;

        let flat = vector::flatten(raw)?;
        Ok(vector::normalize(flat))
    }
}

impl std::fmt::Debug for EmbeddingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingAdapter")
            .field("backend", &self.backend.name())
            .finish()
    }
}
