//! # Configuration Management
//!
//! Loads the service configuration from layered sources:
//! - Default values (built into the code)
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms)
//! 2. Environment variables (APP_SERVER__PORT, APP_MATCHING__CATALOGUE_PATH, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Runtime Updates:
//! `PUT /api/v1/config` applies a partial JSON document through
//! [`AppConfig::update_from_json`]. Only settings that can change without
//! rebuilding the embedding cache are accepted there (server, matching
//! threshold, input limit).

use crate::intent::matcher::DEFAULT_THRESHOLD;
use crate::intent::slots::{default_anchor_words, default_qualifier_words, SlotRules};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub matching: MatchingConfig,
    pub performance: PerformanceConfig,
}

/// Address the HTTP server binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Embedding model settings.
///
/// ## Fields:
/// - `embedding_model`: HuggingFace repository of a BERT-architecture
///   sentence-transformer
/// - `revision`: Branch, tag or commit of that repository
/// - `device`: "auto", "cpu", "cuda" or "metal"
/// - `preload`: Initialize the command parser in the background at startup
///   instead of on the first request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub embedding_model: String,
    pub revision: String,
    pub device: String,
    pub preload: bool,
}

/// Intent matching and slot extraction settings.
///
/// ## Fields:
/// - `threshold`: Minimum cosine similarity for a match (-1.0 to 1.0)
/// - `catalogue_path`: Optional TOML catalogue replacing the built-in one
/// - `qualifier_words` / `anchor_words`: Vocabulary for the qualifier slot
/// - `numeric_slot` / `qualifier_slot`: Names under which slots are reported
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub threshold: f32,
    pub catalogue_path: Option<String>,
    pub qualifier_words: Vec<String>,
    pub anchor_words: Vec<String>,
    pub numeric_slot: String,
    pub qualifier_slot: String,
}

impl MatchingConfig {
    pub fn slot_rules(&self) -> SlotRules {
        SlotRules {
            numeric_slot: self.numeric_slot.clone(),
            qualifier_slot: self.qualifier_slot.clone(),
            qualifier_words: self.qualifier_words.clone(),
            anchor_words: self.anchor_words.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Longest command text accepted by the parse endpoints, in characters
    pub max_input_chars: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let rules = SlotRules::default();
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            models: ModelsConfig {
                embedding_model: "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
                revision: "main".to_string(),
                device: "auto".to_string(),
                preload: true,
            },
            matching: MatchingConfig {
                threshold: DEFAULT_THRESHOLD,
                catalogue_path: None,
                qualifier_words: default_qualifier_words(),
                anchor_words: default_anchor_words(),
                numeric_slot: rules.numeric_slot,
                qualifier_slot: rules.qualifier_slot,
            },
            performance: PerformanceConfig {
                max_input_chars: 500,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from every source in priority order.
    ///
    /// ## Environment Variable Examples:
    /// Sections and keys are separated by a double underscore, so keys that
    /// contain an underscore keep it.
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_MATCHING__THRESHOLD=0.75`: Stricter matching
    /// - `APP_MATCHING__CATALOGUE_PATH=catalogue.toml`: Custom catalogue
    /// - `APP_MATCHING__QUALIFIER_WORDS=alpha,beta`: Comma-separated list
    /// - `APP_MODELS__DEVICE=cpu`: Never use a GPU
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        Self::load_from(config::Environment::default())
    }

    /// Load with `APP_` variables read through `environment`, which tests
    /// point at a fixed map.
    fn load_from(environment: config::Environment) -> Result<Self> {
        let environment = environment
            .prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("matching.qualifier_words")
            .with_list_parse_key("matching.anchor_words");

        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(environment);

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Check that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        let threshold = self.matching.threshold;
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(anyhow::anyhow!(
                "Matching threshold must be between -1.0 and 1.0, got {}",
                threshold
            ));
        }

        if self.matching.numeric_slot.trim().is_empty() || self.matching.qualifier_slot.trim().is_empty() {
            return Err(anyhow::anyhow!("Slot names cannot be empty"));
        }

        if self.performance.max_input_chars == 0 {
            return Err(anyhow::anyhow!("Max input chars must be greater than 0"));
        }

        Ok(())
    }

    /// Apply a partial JSON update, e.g. `{"matching": {"threshold": 0.8}}`.
    ///
    /// The update is validated before it is applied, so a rejected update
    /// leaves the configuration unchanged.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;
        let mut updated = self.clone();

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                updated.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                updated.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Server port {} is out of range", port))?;
            }
        }

        if let Some(matching) = partial_config.get("matching") {
            if let Some(threshold) = matching.get("threshold").and_then(|v| v.as_f64()) {
                updated.matching.threshold = threshold as f32;
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(max_chars) = performance.get("max_input_chars").and_then(|v| v.as_u64()) {
                updated.performance.max_input_chars = max_chars as usize;
            }
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.matching.threshold, 0.7);
        assert_eq!(config.matching.numeric_slot, "batteryId");
        assert!(config.matching.catalogue_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.matching.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.matching.qualifier_slot = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.performance.max_input_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}, "matching": {"threshold": 0.8}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert!((config.matching.threshold - 0.8).abs() < 1e-6);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_rejected_update_leaves_config_unchanged() {
        let mut config = AppConfig::default();
        assert!(config.update_from_json(r#"{"matching": {"threshold": 3.0}}"#).is_err());
        assert!(config.update_from_json(r#"{"server": {"port": 70000}}"#).is_err());
        assert_eq!(config.matching.threshold, 0.7);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_env_overrides_keys_with_underscores() {
        let vars = config::Map::from([
            ("APP_MATCHING__CATALOGUE_PATH".to_string(), "/tmp/custom.toml".to_string()),
            ("APP_PERFORMANCE__MAX_INPUT_CHARS".to_string(), "42".to_string()),
            ("APP_MATCHING__THRESHOLD".to_string(), "0.8".to_string()),
            ("APP_MATCHING__QUALIFIER_WORDS".to_string(), "alpha,beta".to_string()),
            ("APP_MODELS__EMBEDDING_MODEL".to_string(), "org/model".to_string()),
        ]);

        let config = AppConfig::load_from(config::Environment::default().source(Some(vars))).unwrap();
        assert_eq!(config.matching.catalogue_path.as_deref(), Some("/tmp/custom.toml"));
        assert_eq!(config.performance.max_input_chars, 42);
        assert!((config.matching.threshold - 0.8).abs() < 1e-6);
        assert_eq!(config.matching.qualifier_words, vec!["alpha", "beta"]);
        assert_eq!(config.models.embedding_model, "org/model");
        assert_eq!(config.matching.anchor_words, default_anchor_words());
    }

    #[test]
    fn test_slot_rules_from_config() {
        let rules = AppConfig::default().matching.slot_rules();
        assert_eq!(rules, SlotRules::default());
    }
}
