//! Pipeline configuration.
//!
//! Loaded once at process start and immutable afterwards. The rule sets
//! default to the built-ins but can be replaced wholesale from a JSON file,
//! so new vendor conventions can be onboarded without recompiling.

use crate::rules::{builtin, RuleSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Retry behaviour for the batch emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum send attempts per batch.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Returns the base delay as a `Duration`.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Returns the maximum delay as a `Duration`.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Emission settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitConfig {
    /// Cancellation deadline for emitting one batch, in milliseconds. A
    /// stuck sink cannot stall a batch past this.
    #[serde(default = "default_batch_deadline_ms")]
    pub batch_deadline_ms: u64,
}

fn default_batch_deadline_ms() -> u64 {
    10_000
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            batch_deadline_ms: default_batch_deadline_ms(),
        }
    }
}

impl EmitConfig {
    /// Returns the batch deadline as a `Duration`.
    #[must_use]
    pub fn batch_deadline(&self) -> Duration {
        Duration::from_millis(self.batch_deadline_ms)
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The rule sets, tried in priority order per record.
    #[serde(default = "builtin::builtin_rulesets")]
    pub rulesets: Vec<RuleSet>,

    /// Retry behaviour for the emitter.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Emission settings.
    #[serde(default)]
    pub emit: EmitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rulesets: builtin::builtin_rulesets(),
            retry: RetryConfig::default(),
            emit: EmitConfig::default(),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for this schema.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// No rule sets were configured.
    #[error("at least one rule set must be configured")]
    NoRuleSets,

    /// Two rule sets share a name.
    #[error("duplicate rule set name: {0}")]
    DuplicateName(String),

    /// Two rule sets share a priority, which would make conflict resolution
    /// ambiguous.
    #[error("duplicate rule set priority: {0}")]
    DuplicatePriority(u32),

    /// A rule set has no trigger prefixes.
    #[error("rule set {0} has no triggers")]
    EmptyTriggers(String),

    /// A rule has an empty source or target key.
    #[error("rule set {0} contains a rule with an empty key")]
    EmptyRuleKey(String),

    /// Retry or emit settings are out of range.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

impl PipelineConfig {
    /// Loads configuration from a JSON file and validates it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or
    /// fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rulesets.is_empty() {
            return Err(ConfigError::NoRuleSets);
        }

        let mut names = HashSet::new();
        let mut priorities = HashSet::new();
        for set in &self.rulesets {
            if !names.insert(set.name.as_str()) {
                return Err(ConfigError::DuplicateName(set.name.clone()));
            }
            if !priorities.insert(set.priority) {
                return Err(ConfigError::DuplicatePriority(set.priority));
            }
            if set.triggers.is_empty() {
                return Err(ConfigError::EmptyTriggers(set.name.clone()));
            }
            for rule in &set.rules {
                if rule.source_key.is_empty() || rule.target_key.is_empty() {
                    return Err(ConfigError::EmptyRuleKey(set.name.clone()));
                }
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidSetting(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::InvalidSetting(
                "retry.base_delay_ms cannot exceed retry.max_delay_ms".to_string(),
            ));
        }
        if self.emit.batch_deadline_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "emit.batch_deadline_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{MappingRule, RuleSet};

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert_eq!(config.retry.max_delay_ms, 5000);
        assert_eq!(config.emit.batch_deadline_ms, 10_000);
    }

    #[test]
    fn test_empty_rulesets_rejected() {
        let config = PipelineConfig {
            rulesets: vec![],
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoRuleSets)));
    }

    #[test]
    fn test_duplicate_priority_rejected() {
        let config = PipelineConfig {
            rulesets: vec![
                RuleSet::new("a", 5)
                    .with_trigger("a.")
                    .with_rule(MappingRule::new("a.x", "gen_ai.x")),
                RuleSet::new("b", 5)
                    .with_trigger("b.")
                    .with_rule(MappingRule::new("b.x", "gen_ai.x")),
            ],
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePriority(5))
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let config = PipelineConfig {
            rulesets: vec![
                RuleSet::new("same", 1)
                    .with_trigger("a.")
                    .with_rule(MappingRule::new("a.x", "gen_ai.x")),
                RuleSet::new("same", 2)
                    .with_trigger("b.")
                    .with_rule(MappingRule::new("b.x", "gen_ai.x")),
            ],
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateName(_))));
    }

    #[test]
    fn test_missing_triggers_rejected() {
        let config = PipelineConfig {
            rulesets: vec![RuleSet::new("a", 1).with_rule(MappingRule::new("a.x", "gen_ai.x"))],
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyTriggers(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = PipelineConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: PipelineConfig =
            serde_json::from_str(r#"{"retry": {"max_attempts": 5}}"#).unwrap();
        assert_eq!(parsed.retry.max_attempts, 5);
        assert_eq!(parsed.retry.base_delay_ms, 200);
        assert!(!parsed.rulesets.is_empty());
    }
}
