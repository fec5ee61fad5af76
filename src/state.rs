//! # Application State Management
//!
//! Shared state handed to every HTTP handler through `web::Data<AppState>`.
//!
//! ## Sharing Pattern:
//! - **config**: `Arc<RwLock<AppConfig>>`, many readers, rare runtime updates
//! - **metrics**: `Arc<RwLock<AppMetrics>>`, written by the middleware on
//!   every request
//! - **parser**: `Arc<CommandParser>`, internally synchronized; the embedding
//!   cache is built once and then only read
//!
//! Cloning `AppState` clones the `Arc`s, so every worker thread sees the
//! same data.
//!
//! The std `RwLock`s are only held for a few field updates and never across
//! an `.await`. A poisoned lock still holds valid counters, so it is
//! recovered rather than propagated.

use crate::config::AppConfig;
use crate::intent::CommandParser;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request metrics, updated by the middleware
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// The intent-matching engine
    pub parser: Arc<CommandParser>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,

    /// Commands parsed since startup
    pub parsed_commands: u64,

    /// Parsed commands that matched an intent
    pub matched_commands: u64,

    /// Key: endpoint name (e.g., "POST /api/v1/commands/parse")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

impl AppMetrics {
    /// Fraction of parsed commands that matched an intent (0.0 to 1.0).
    pub fn match_rate(&self) -> f64 {
        if self.parsed_commands > 0 {
            self.matched_commands as f64 / self.parsed_commands as f64
        } else {
            0.0
        }
    }
}

/// Performance metrics for one API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, parser: Arc<CommandParser>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            parser,
            start_time: Instant::now(),
        }
    }

    fn read_config(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current configuration; the lock is released on return.
    pub fn get_config(&self) -> AppConfig {
        self.read_config().clone()
    }

    /// Matching threshold currently in effect.
    pub fn threshold(&self) -> f32 {
        self.read_config().matching.threshold
    }

    /// Replace the configuration after validating it. The matching
    /// threshold is handed to the parser as well.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;
        self.parser.set_threshold(new_config.matching.threshold);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = new_config;
        Ok(())
    }

    pub fn increment_request_count(&self) {
        self.write_metrics().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.write_metrics().error_count += 1;
    }

    /// Count one parsed command and whether it matched an intent.
    pub fn record_parse(&self, matched: bool) {
        let mut metrics = self.write_metrics();
        metrics.parsed_commands += 1;
        if matched {
            metrics.matched_commands += 1;
        }
    }

    /// Record one request against `endpoint`. The first request to an
    /// endpoint creates its entry.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the metrics, taken under a single read lock.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate from 0.0 (no errors) to 1.0 (every request failed).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::keyword_state;
    use super::*;

    #[test]
    fn test_endpoint_metrics() {
        let state = keyword_state();
        state.record_endpoint_request("GET /health", 10, false);
        state.record_endpoint_request("GET /health", 30, true);

        let metrics = state.get_metrics_snapshot();
        let health = &metrics.endpoint_metrics["GET /health"];
        assert_eq!(health.request_count, 2);
        assert_eq!(health.average_duration_ms(), 20.0);
        assert_eq!(health.error_rate(), 0.5);
    }

    #[test]
    fn test_parse_counters() {
        let state = keyword_state();
        state.record_parse(true);
        state.record_parse(false);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.parsed_commands, 2);
        assert_eq!(metrics.match_rate(), 0.5);
    }

    #[test]
    fn test_update_config_validates() {
        let state = keyword_state();
        let mut config = state.get_config();
        config.matching.threshold = 0.85;
        assert!(state.update_config(config).is_ok());
        assert!((state.threshold() - 0.85).abs() < 1e-6);
        assert!((state.parser.threshold() - 0.85).abs() < 1e-6);

        let mut config = state.get_config();
        config.server.port = 0;
        assert!(state.update_config(config).is_err());
        assert_eq!(state.get_config().server.port, 8080);
        assert!((state.parser.threshold() - 0.85).abs() < 1e-6);
    }
}
