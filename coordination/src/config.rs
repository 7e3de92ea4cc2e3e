//! Hive configuration
//!
//! A single `HiveConfig` is built once (defaults, then an optional TOML file,
//! then `HIVE_*` environment overrides) and handed to the engine and the
//! orchestrator at construction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::types::MAX_WEIGHT;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Policy for settling a tie between options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TieBreaker {
    /// The coordinator is asked to pick
    #[default]
    Queen,
    /// Uniform random pick among the tied options
    Random,
}

impl std::str::FromStr for TieBreaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queen" => Ok(TieBreaker::Queen),
            "random" => Ok(TieBreaker::Random),
            _ => Err(format!("Unknown tie breaker: {}. Valid: queen, random", s)),
        }
    }
}

/// What a queen tie-break falls back to when the coordinator stays silent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieFallback {
    /// First tied option in ballot order
    #[default]
    FirstTied,
    /// Uniform random pick among the tied options
    Random,
}

/// Voting engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Winning share a result needs to be flagged as meeting the threshold
    pub voting_threshold: f64,
    /// Lifetime of a voting session
    pub voting_timeout_ms: u64,
    pub tie_breaker: TieBreaker,
    /// Fraction of eligible voters that must vote for a non-deferred result
    pub quorum_required: f64,
    /// When false every vote weighs 1.0
    pub weighted_voting: bool,
    /// Agent id of the coordinator, the only caller allowed to override weight
    pub coordinator_id: String,
    pub queen_tie_fallback: TieFallback,
    /// How long a closed session and its result stay queryable
    pub closed_session_retention_ms: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            voting_threshold: 0.5,
            voting_timeout_ms: 30_000,
            tie_breaker: TieBreaker::Queen,
            quorum_required: 0.5,
            weighted_voting: true,
            coordinator_id: "queen".to_string(),
            queen_tie_fallback: TieFallback::FirstTied,
            closed_session_retention_ms: 600_000,
        }
    }
}

impl VotingConfig {
    pub fn voting_timeout(&self) -> Duration {
        Duration::from_millis(self.voting_timeout_ms)
    }

    pub fn closed_session_retention(&self) -> Duration {
        Duration::from_millis(self.closed_session_retention_ms)
    }
}

/// Decision orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of distinct recommendations kept as options
    pub max_options: usize,
    /// Per-agent report deadline on the emergency path
    pub emergency_report_timeout_ms: u64,
    /// Fixed session lifetime on the emergency path
    pub emergency_voting_timeout_ms: u64,
    /// Weight of the coordinator's own emergency vote
    pub coordinator_emergency_weight: f64,
    /// Duration estimate for steps that carry none
    pub default_step_minutes: u32,
    /// Memory usage fraction above which health flags the memory collaborator
    pub memory_usage_warning: f64,
    /// Re-run the pattern learner after every completed decision
    pub learn_after_decisions: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_options: 5,
            emergency_report_timeout_ms: 3_000,
            emergency_voting_timeout_ms: 5_000,
            coordinator_emergency_weight: MAX_WEIGHT,
            default_step_minutes: 30,
            memory_usage_warning: 0.8,
            learn_after_decisions: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn emergency_report_timeout(&self) -> Duration {
        Duration::from_millis(self.emergency_report_timeout_ms)
    }

    pub fn emergency_voting_timeout(&self) -> Duration {
        Duration::from_millis(self.emergency_voting_timeout_ms)
    }
}

/// Top-level hive configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    pub voting: VotingConfig,
    pub orchestrator: OrchestratorConfig,
}

impl HiveConfig {
    /// Defaults with `HIVE_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: HiveConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (unparseable values are ignored)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("HIVE_VOTING_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.voting.voting_threshold = v;
        }
        if let Some(v) = lookup("HIVE_VOTING_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.voting.voting_timeout_ms = v;
        }
        if let Some(v) = lookup("HIVE_TIE_BREAKER").and_then(|v| v.parse().ok()) {
            self.voting.tie_breaker = v;
        }
        if let Some(v) = lookup("HIVE_QUORUM_REQUIRED").and_then(|v| v.parse().ok()) {
            self.voting.quorum_required = v;
        }
        if let Some(v) = lookup("HIVE_WEIGHTED_VOTING") {
            self.voting.weighted_voting = v.to_lowercase() == "true" || v == "1";
        }
        if let Some(v) = lookup("HIVE_CLOSED_SESSION_RETENTION_MS").and_then(|v| v.parse().ok())
        {
            self.voting.closed_session_retention_ms = v;
        }
        if let Some(v) = lookup("HIVE_COORDINATOR_ID") {
            self.voting.coordinator_id = v;
        }
        if let Some(v) = lookup("HIVE_MAX_OPTIONS").and_then(|v| v.parse().ok()) {
            self.orchestrator.max_options = v;
        }
        if let Some(v) = lookup("HIVE_EMERGENCY_REPORT_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.orchestrator.emergency_report_timeout_ms = v;
        }
        if let Some(v) = lookup("HIVE_EMERGENCY_VOTING_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.orchestrator.emergency_voting_timeout_ms = v;
        }
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        let v = &self.voting;
        if !(0.0..=1.0).contains(&v.quorum_required) {
            return Err(ConfigError::Invalid(format!(
                "quorum_required must be within 0..=1, got {}",
                v.quorum_required
            )));
        }
        if !(0.0..=1.0).contains(&v.voting_threshold) {
            return Err(ConfigError::Invalid(format!(
                "voting_threshold must be within 0..=1, got {}",
                v.voting_threshold
            )));
        }
        if v.voting_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "voting_timeout_ms must be positive".to_string(),
            ));
        }
        if v.coordinator_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "coordinator_id must not be empty".to_string(),
            ));
        }

        let o = &self.orchestrator;
        if o.max_options == 0 {
            return Err(ConfigError::Invalid(
                "max_options must be at least 1".to_string(),
            ));
        }
        if o.emergency_voting_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "emergency_voting_timeout_ms must be positive".to_string(),
            ));
        }
        if o.coordinator_emergency_weight < 0.0 || o.coordinator_emergency_weight > MAX_WEIGHT {
            return Err(ConfigError::Invalid(format!(
                "coordinator_emergency_weight must be within 0..={}, got {}",
                MAX_WEIGHT, o.coordinator_emergency_weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HiveConfig::default();
        assert_eq!(config.voting.quorum_required, 0.5);
        assert_eq!(config.voting.tie_breaker, TieBreaker::Queen);
        assert_eq!(config.voting.coordinator_id, "queen");
        assert_eq!(config.orchestrator.max_options, 5);
        assert_eq!(
            config.orchestrator.emergency_report_timeout(),
            Duration::from_secs(3)
        );
        assert_eq!(
            config.orchestrator.emergency_voting_timeout(),
            Duration::from_secs(5)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HiveConfig::from_toml_str(
            r#"
            [voting]
            tie_breaker = "random"
            quorum_required = 0.75
            "#,
        )
        .unwrap();

        assert_eq!(config.voting.tie_breaker, TieBreaker::Random);
        assert_eq!(config.voting.quorum_required, 0.75);
        assert_eq!(config.voting.voting_timeout_ms, 30_000);
        assert_eq!(config.orchestrator.max_options, 5);
    }

    #[test]
    fn test_invalid_quorum_rejected() {
        let err = HiveConfig::from_toml_str("[voting]\nquorum_required = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HIVE_TIE_BREAKER", "random"),
            ("HIVE_WEIGHTED_VOTING", "0"),
            ("HIVE_VOTING_TIMEOUT_MS", "1500"),
            ("HIVE_MAX_OPTIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config =
            HiveConfig::default().with_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.voting.tie_breaker, TieBreaker::Random);
        assert!(!config.voting.weighted_voting);
        assert_eq!(config.voting.voting_timeout(), Duration::from_millis(1500));
        assert_eq!(config.orchestrator.max_options, 5);
    }

    #[test]
    fn test_from_toml_file_missing() {
        let err = HiveConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_tie_breaker() {
        assert_eq!("Queen".parse::<TieBreaker>().ok(), Some(TieBreaker::Queen));
        assert!("coin".parse::<TieBreaker>().is_err());
    }
}
