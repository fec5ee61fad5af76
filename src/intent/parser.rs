//! # Command Parser
//!
//! Facade over the engine: embeds the input, matches it against the
//! catalogue and merges the result with the extracted slots.
//!
//! ## Lifecycle:
//! The parser owns the embedding cache through a [`SingleFlight`]. The first
//! `init()` (or the first `parse_command()`) warms the backend up and embeds
//! the catalogue; concurrent callers wait on that same attempt. Once ready,
//! the cache is shared read-only and parsing never touches the lock again
//! beyond cloning an `Arc`.

use crate::intent::adapter::EmbeddingAdapter;
use crate::intent::catalogue::{Catalogue, EmbeddingCache};
use crate::intent::error::{EngineError, EngineResult};
use crate::intent::matcher::{self, RankedPhrase, DEFAULT_THRESHOLD};
use crate::intent::single_flight::{InitStatus, SingleFlight};
use crate::intent::slots::{SlotExtractor, SlotValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Result of parsing one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub intent: Option<String>,
    pub score: f32,
    pub slots: BTreeMap<String, SlotValue>,
}

impl MatchResult {
    pub fn slot(&self, name: &str) -> Option<&SlotValue> {
        self.slots.get(name)
    }

    pub fn is_match(&self) -> bool {
        self.intent.is_some()
    }
}

/// Snapshot of the parser for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ParserStatus {
    pub backend: String,
    pub status: InitStatus,
    pub intents: usize,
    pub catalogue_phrases: usize,
    pub cached_phrases: usize,
    pub dimension: usize,
    pub last_error: Option<String>,
}

pub struct CommandParser {
    adapter: EmbeddingAdapter,
    catalogue: Arc<Catalogue>,
    extractor: SlotExtractor,
    /// `f32` bits, replaced at runtime by configuration updates
    threshold: AtomicU32,
    cache: SingleFlight<Arc<EmbeddingCache>>,
}

impl CommandParser {
    pub fn new(adapter: EmbeddingAdapter, catalogue: Catalogue, extractor: SlotExtractor, threshold: f32) -> Self {
        Self {
            adapter,
            catalogue: Arc::new(catalogue),
            extractor,
            threshold: AtomicU32::new(threshold.to_bits()),
            cache: SingleFlight::new(),
        }
    }

    /// Parser over the built-in catalogue with default slot rules and threshold.
    #[cfg(test)]
    pub fn with_defaults(adapter: EmbeddingAdapter) -> Self {
        Self::new(adapter, Catalogue::default(), SlotExtractor::default(), DEFAULT_THRESHOLD)
    }

    /// Warm the backend up and embed the catalogue, once.
    ///
    /// Safe to call concurrently and repeatedly. After a failure the next
    /// call starts a new attempt.
    pub async fn init(&self) -> EngineResult<()> {
        self.ready_cache().await.map(|_| ())
    }

    async fn ready_cache(&self) -> EngineResult<Arc<EmbeddingCache>> {
        let adapter = self.adapter.clone();
        let catalogue = Arc::clone(&self.catalogue);

        self.cache
            .get_or_init(move || async move {
                tracing::info!(
                    "Initializing command parser: {} intents, {} phrases",
                    catalogue.intents().len(),
                    catalogue.phrase_count()
                );
                adapter.warm_up().await?;
                let cache = EmbeddingCache::build(&adapter, &catalogue).await?;
                tracing::info!("Command parser ready");
                Ok(Arc::new(cache))
            })
            .await
    }

    /// Parse `text` with the configured threshold.
    pub async fn parse_command(&self, text: &str) -> EngineResult<MatchResult> {
        self.parse_command_with_threshold(text, self.threshold()).await
    }

    /// Parse `text`, rejecting matches scoring below `threshold`.
    ///
    /// Fails only when initialization fails or the input dimension does not
    /// match the catalogue. A failed embedding of the input is recovered as
    /// "no intent" with the slots still extracted.
    pub async fn parse_command_with_threshold(&self, text: &str, threshold: f32) -> EngineResult<MatchResult> {
        let cache = self.ready_cache().await?;
        let slots = self.extractor.extract(text);

        let input = match self.adapter.embed(text).await {
            Ok(vector) => vector,
            Err(e @ (EngineError::EmbeddingFailed(_) | EngineError::MalformedEmbeddingOutput(_))) => {
                tracing::warn!("Could not embed command text '{}': {}", text, e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let matched = matcher::match_intent(&input, &cache, threshold).map_err(|e| {
            tracing::error!(
                "Input embedding does not fit the catalogue ({}); was the catalogue built with another model?",
                e
            );
            e
        })?;

        tracing::debug!(
            intent = ?matched.intent,
            score = matched.score,
            slots = slots.len(),
            "Parsed command"
        );

        Ok(MatchResult {
            intent: matched.intent,
            score: matched.score,
            slots,
        })
    }

    /// Similarity of `text` against every catalogue phrase, best first.
    pub async fn rank(&self, text: &str) -> EngineResult<Vec<RankedPhrase>> {
        let cache = self.ready_cache().await?;
        let input = self.adapter.embed(text).await?;
        if input.is_empty() {
            return Ok(Vec::new());
        }
        matcher::rank(&input, &cache)
    }

    pub fn threshold(&self) -> f32 {
        f32::from_bits(self.threshold.load(Ordering::Relaxed))
    }

    /// Threshold used by subsequent `parse_command` calls.
    pub fn set_threshold(&self, threshold: f32) {
        self.threshold.store(threshold.to_bits(), Ordering::Relaxed);
        tracing::debug!("Command parser threshold set to {}", threshold);
    }

    pub fn extractor(&self) -> &SlotExtractor {
        &self.extractor
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Number of embedded phrases, 0 until initialization succeeds.
    pub async fn cache_len(&self) -> usize {
        self.cache.get().await.map_or(0, |cache| cache.len())
    }

    pub async fn status(&self) -> ParserStatus {
        let cache = self.cache.get().await;
        ParserStatus {
            backend: self.adapter.backend_name().to_string(),
            status: self.cache.status().await,
            intents: self.catalogue.intents().len(),
            catalogue_phrases: self.catalogue.phrase_count(),
            cached_phrases: cache.as_ref().map_or(0, |c| c.len()),
            dimension: cache.as_ref().map_or(0, |c| c.dimension()),
            last_error: self.cache.last_error().await.map(|e| e.to_string()),
        }
    }
}
