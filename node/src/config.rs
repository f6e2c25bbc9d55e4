//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use tidemark_types::{OrchestratorParams, ScoringParams};

use crate::NodeError;

/// Configuration for a Tidemark orchestrator node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to register Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Capacity of the internal stage-event channel.
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,

    /// Maximum retained submission-history entries per submitter.
    #[serde(default = "default_history_limit")]
    pub submission_history_limit: usize,

    /// Scoring weights and thresholds for the verification engine.
    #[serde(default)]
    pub scoring: ScoringParams,

    /// Timeouts, retry policy, payment splits, marketplace attributes.
    #[serde(default)]
    pub orchestrator: OrchestratorParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

fn default_history_limit() -> usize {
    256
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            event_channel_capacity: default_event_capacity(),
            submission_history_limit: default_history_limit(),
            scoring: ScoringParams::restoration_defaults(),
            orchestrator: OrchestratorParams::restoration_defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.event_channel_capacity, config.event_channel_capacity);
        assert_eq!(
            parsed.orchestrator.retry_max_attempts,
            config.orchestrator.retry_max_attempts
        );
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.log_format, "human");
        assert_eq!(config.event_channel_capacity, 1024);
        assert_eq!(config.scoring.approve_threshold, 80.0);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            log_level = "debug"

            [orchestrator]
            ledger_timeout_secs = 60
            content_timeout_secs = 10
            store_timeout_secs = 10
            retry_base_delay_ms = 500
            retry_factor = 2
            retry_max_attempts = 3
            operator_share_bps = 7000
            verifier_share_bps = 2000
            platform_share_bps = 1000
            marketplace_price_per_credit = 12.5
            marketplace_certification = "Silver"
            verifier_account = "v"
            platform_account = "p"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.orchestrator.ledger_timeout_secs, 60);
        assert_eq!(config.orchestrator.retry_max_attempts, 3);
        assert_eq!(config.log_format, "human"); // default
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/tidemark.toml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), NodeError::Config(_)));
    }
}
