//! # Intent Catalogue and Embedding Cache
//!
//! The catalogue is the closed set of commands the service understands,
//! each with example phrases in every supported language. The embedding
//! cache holds one normalized vector per example phrase and is built once,
//! during initialization.
//!
//! ## Catalogue File Format (TOML):
//! ```toml
//! [[intents]]
//! tag = "charge_battery"
//! slots = ["batteryId", "series"]
//! examples = ["Charge battery {batteryId}", "Carica batteria {batteryId}"]
//! ```
//! `{slot}` placeholders only document where values appear; they are
//! removed before a phrase is embedded.

use crate::intent::adapter::EmbeddingAdapter;
use crate::intent::error::{EngineError, EngineResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// A command the service can recognize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub tag: String,
    pub examples: Vec<String>,
    #[serde(default)]
    pub slots: Vec<String>,
}

impl Intent {
    pub fn new(tag: &str, examples: &[&str], slots: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
            slots: slots.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Example phrases with placeholders stripped, in declaration order.
    pub fn rendered_examples(&self) -> impl Iterator<Item = String> + '_ {
        self.examples.iter().map(|e| render_example(e))
    }
}

/// Remove `{placeholder}` tokens and collapse the remaining whitespace.
pub fn render_example(example: &str) -> String {
    let mut text = String::with_capacity(example.len());
    let mut depth = 0usize;
    for c in example.chars() {
        match c {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            _ if depth == 0 => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered, validated list of intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalogue {
    intents: Vec<Intent>,
}

impl Catalogue {
    pub fn new(intents: Vec<Intent>) -> EngineResult<Self> {
        if intents.is_empty() {
            return Err(EngineError::InvalidCatalogue("catalogue has no intents".to_string()));
        }

        for (index, intent) in intents.iter().enumerate() {
            if intent.tag.trim().is_empty() {
                return Err(EngineError::InvalidCatalogue(format!("intent #{} has an empty tag", index)));
            }
            if intents[..index].iter().any(|other| other.tag == intent.tag) {
                return Err(EngineError::InvalidCatalogue(format!("duplicate intent tag '{}'", intent.tag)));
            }
            if intent.rendered_examples().all(|e| e.is_empty()) {
                return Err(EngineError::InvalidCatalogue(format!(
                    "intent '{}' has no usable example phrases",
                    intent.tag
                )));
            }
        }

        Ok(Self { intents })
    }

    /// Battery workstation commands in Italian and English.
    pub fn battery_workstation() -> Self {
        Self {
            intents: vec![
                Intent::new(
                    "charge_battery",
                    &[
                        "Carica batteria {batteryId}",
                        "Carica batteria {batteryId} serie {series}",
                        "Inizia a caricare batteria {batteryId}",
                        "Charge battery {batteryId}",
                        "Start charging battery {batteryId}",
                        "Battery {batteryId} charging",
                    ],
                    &["batteryId", "series"],
                ),
                Intent::new(
                    "discharge_battery",
                    &[
                        "Scarica batteria {batteryId}",
                        "Discharge battery {batteryId}",
                        "Start discharging battery {batteryId}",
                        "Battery {batteryId} discharging",
                    ],
                    &["batteryId"],
                ),
                Intent::new(
                    "check_resistance",
                    &[
                        "Controlla resistenza batteria {batteryId}",
                        "Check resistance battery {batteryId}",
                    ],
                    &["batteryId"],
                ),
                Intent::new(
                    "store_battery",
                    &[
                        "Metti in deposito batteria {batteryId}",
                        "Store battery {batteryId}",
                    ],
                    &["batteryId"],
                ),
            ],
        }
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let parsed: Catalogue = toml::from_str(source).context("failed to parse catalogue TOML")?;
        Ok(Self::new(parsed.intents)?)
    }

    /// Load a catalogue from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalogue file {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("invalid catalogue file {}", path.display()))
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn phrase_count(&self) -> usize {
        self.intents.iter().map(|intent| intent.examples.len()).sum()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::battery_workstation()
    }
}

/// One embedded example phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueEntry {
    pub intent: String,
    pub phrase: String,
    pub embedding: Vec<f32>,
}

/// Precomputed embeddings for every catalogue phrase, in catalogue order.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCache {
    entries: Vec<CatalogueEntry>,
    dimension: usize,
}

impl EmbeddingCache {
    /// Embed every example phrase of every intent.
    ///
    /// Phrases the backend cannot embed are skipped with a warning. Fails
    /// with `EmptyCatalogue` if nothing could be embedded, and with
    /// `DimensionMismatch` if the backend changes dimensionality mid-build.
    pub async fn build(adapter: &EmbeddingAdapter, catalogue: &Catalogue) -> EngineResult<Self> {
        let start_time = Instant::now();
        let mut cache = Self::default();
        let mut skipped = 0usize;

        for intent in catalogue.intents() {
            for phrase in intent.rendered_examples() {
                match adapter.embed(&phrase).await {
                    Ok(embedding) if embedding.is_empty() => {
                        tracing::warn!(intent = %intent.tag, phrase = %phrase, "Skipping phrase with empty embedding");
                        skipped += 1;
                    }
                    Ok(embedding) => cache.push(&intent.tag, phrase, embedding)?,
                    Err(e) => {
                        tracing::warn!(intent = %intent.tag, phrase = %phrase, error = %e, "Skipping phrase that failed to embed");
                        skipped += 1;
                    }
                }
            }
        }

        if cache.is_empty() {
            tracing::error!("No catalogue phrase could be embedded; every command would be rejected");
            return Err(EngineError::EmptyCatalogue);
        }

        tracing::info!(
            "Embedded {} catalogue phrases ({} skipped, dimension {}) in {}ms",
            cache.len(),
            skipped,
            cache.dimension,
            start_time.elapsed().as_millis()
        );

        Ok(cache)
    }

    /// Build a cache from vectors that are already normalized.
    #[cfg(test)]
    pub fn from_entries(entries: Vec<CatalogueEntry>) -> EngineResult<Self> {
        let mut cache = Self::default();
        for entry in entries {
            cache.push(&entry.intent, entry.phrase, entry.embedding)?;
        }
        Ok(cache)
    }

    fn push(&mut self, intent: &str, phrase: String, embedding: Vec<f32>) -> EngineResult<()> {
        if self.entries.is_empty() {
            self.dimension = embedding.len();
        } else if embedding.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                left: self.dimension,
                right: embedding.len(),
            });
        }

        self.entries.push(CatalogueEntry {
            intent: intent.to_string(),
            phrase,
            embedding,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[CatalogueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector length shared by all entries (0 for an empty cache).
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
