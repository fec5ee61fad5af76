//! # Sentence Embedder
//!
//! Production [`EmbeddingBackend`]: a multilingual sentence-transformer
//! (BERT architecture) run locally with Candle.
//!
//! ## Model Loading Process:
//! 1. Download `config.json`, `tokenizer.json` and `model.safetensors` from
//!    HuggingFace if not cached locally
//! 2. Load tokenizer and configuration
//! 3. Memory-map the weights onto the selected device
//!
//! Loading happens in `warm_up()`, which the command parser calls exactly
//! once per successful initialization. `embed()` returns the token-level
//! hidden states as a `[tokens, hidden]` row-major buffer; mean pooling is
//! left to the engine.

use crate::device::{create_device_from_string, DeviceManager};
use crate::intent::adapter::EmbeddingBackend;
use crate::intent::vector::RawTensor;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType};
use std::path::PathBuf;
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams};
use tokio::sync::RwLock;

/// Longest token sequence fed to the model. Commands are short; anything
/// longer is truncated rather than rejected.
const MAX_SEQUENCE_TOKENS: usize = 128;

/// Where and how to load the embedding model.
#[derive(Debug, Clone)]
pub struct EmbedderSettings {
    /// HuggingFace repository id
    pub model_id: String,
    /// Branch, tag or commit
    pub revision: String,
    /// Device preference string ("auto", "cpu", "cuda", "metal")
    pub device: String,
}

/// Model, tokenizer and device, present once warm-up succeeded.
struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

pub struct SentenceEmbedder {
    settings: EmbedderSettings,
    name: String,

    /// RwLock allows concurrent embeddings while loading takes the write lock
    model: RwLock<Option<LoadedModel>>,
}

impl SentenceEmbedder {
    pub fn new(settings: EmbedderSettings) -> Self {
        Self {
            name: format!("candle:{}", settings.model_id),
            settings,
            model: RwLock::new(None),
        }
    }

    async fn load(&self) -> Result<LoadedModel> {
        let start_time = Instant::now();
        let device = create_device_from_string(&self.settings.device);
        tracing::info!(
            "Loading embedding model {}@{} on {}",
            self.settings.model_id,
            self.settings.revision,
            DeviceManager::get_device_info(&device)
        );

        let api = hf_api()?;
        let repo = api.repo(Repo::with_revision(
            self.settings.model_id.clone(),
            RepoType::Model,
            self.settings.revision.clone(),
        ));

        let config_filename = repo
            .get("config.json")
            .await
            .with_context(|| format!("Failed to download config.json from {}", self.settings.model_id))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .with_context(|| format!("Failed to download tokenizer.json from {}", self.settings.model_id))?;
        let weights_filename = repo
            .get("model.safetensors")
            .await
            .with_context(|| format!("Failed to download model.safetensors from {}", self.settings.model_id))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(&config_filename)?)
            .with_context(|| format!("Invalid model config {}", config_filename.display()))?;
        tracing::debug!("Model config: {:?}", config);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure tokenizer truncation: {}", e))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        tracing::info!(
            "Embedding model {} loaded in {:.2}s",
            self.settings.model_id,
            start_time.elapsed().as_secs_f64()
        );

        Ok(LoadedModel { model, tokenizer, device })
    }
}

#[async_trait]
impl EmbeddingBackend for SentenceEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn warm_up(&self) -> Result<()> {
        let mut guard = self.model.write().await;
        if guard.is_some() {
            return Ok(());
        }
        *guard = Some(self.load().await?);
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<RawTensor> {
        let guard = self.model.read().await;
        let loaded = guard.as_ref().ok_or_else(|| anyhow!("Embedding model is not loaded"))?;

        let encoding = loaded
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let input_ids = Tensor::new(encoding.get_ids(), &loaded.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &loaded.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &loaded.device)?.unsqueeze(0)?;

        let hidden = loaded
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let (_, rows, cols) = hidden.dims3()?;
        let data = hidden
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;

        tracing::trace!("Embedded '{}' into {} tokens x {} dims", text, rows, cols);
        Ok(RawTensor::RowMajor2D { data, rows, cols })
    }
}

/// HuggingFace client honouring `HF_TOKEN`, `HF_HUB_CACHE` and `HF_HOME`.
fn hf_api() -> Result<hf_hub::api::tokio::Api> {
    use hf_hub::api::tokio::ApiBuilder;

    let mut builder = ApiBuilder::new().with_progress(false);

    if let Ok(token) = std::env::var("HF_TOKEN") {
        tracing::debug!("Using HF token (length: {})", token.len());
        builder = builder.with_token(Some(token));
    }

    if let Some(cache_dir) = hf_cache_dir() {
        tracing::debug!("Using HuggingFace cache dir {:?}", cache_dir);
        builder = builder.with_cache_dir(cache_dir);
    }

    builder.build().context("Failed to create HuggingFace API client")
}

fn hf_cache_dir() -> Option<PathBuf> {
    if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
        return Some(PathBuf::from(cache_dir));
    }
    std::env::var("HF_HOME").ok().map(|home| PathBuf::from(home).join("hub"))
}
