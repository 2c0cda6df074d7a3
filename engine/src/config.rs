//! Engine configuration.
//!
//! Loaded once per process and immutable during a run:
//!
//! 1. defaults (`EngineConfig::default()`)
//! 2. a TOML file, any subset of sections
//! 3. `SIFT_*` environment variables
//! 4. `validate()`
//!
//! ```toml
//! [thresholds]
//! trash = 0.85
//! archive = 0.65
//! review_low = 0.25
//!
//! [signals.weights]
//! marketing_platform = 0.30
//!
//! [safety]
//! critical_keywords = ["receipt", "invoice", "boarding pass"]
//!
//! [escalation]
//! default_call_cap = 50
//! cost_per_call = "0.002"
//! ```

use std::path::Path;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::escalation::EscalationConfig;
use crate::policy::Thresholds;
use crate::safety::DEFAULT_CRITICAL_KEYWORDS;
use crate::signals::SignalConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    Env { var: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub critical_keywords: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            critical_keywords: DEFAULT_CRITICAL_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items classified concurrently by `classify_batch`.
    pub batch_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub signals: SignalConfig,
    pub safety: SafetyConfig,
    pub escalation: EscalationConfig,
    pub pipeline: PipelineConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file, overlay the process environment, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides()?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    /// Defaults overlaid with the process environment, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_from(|var| std::env::var(var).ok())
    }

    /// Overlay `SIFT_*` variables read through `lookup`.
    ///
    /// | Variable                    | Field                           |
    /// |-----------------------------|---------------------------------|
    /// | `SIFT_TRASH_THRESHOLD`      | `thresholds.trash`              |
    /// | `SIFT_ARCHIVE_THRESHOLD`    | `thresholds.archive`            |
    /// | `SIFT_REVIEW_LOW_THRESHOLD` | `thresholds.review_low`         |
    /// | `SIFT_ESCALATION_ENABLED`   | `escalation.enabled`            |
    /// | `SIFT_CALL_CAP`             | `escalation.default_call_cap`   |
    /// | `SIFT_COST_CAP`             | `escalation.default_cost_cap`   |
    /// | `SIFT_COST_PER_CALL`        | `escalation.cost_per_call`      |
    /// | `SIFT_BATCH_CONCURRENCY`    | `pipeline.batch_concurrency`    |
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "SIFT_TRASH_THRESHOLD")? {
            self.thresholds.trash = v;
        }
        if let Some(v) = parse_var(&lookup, "SIFT_ARCHIVE_THRESHOLD")? {
            self.thresholds.archive = v;
        }
        if let Some(v) = parse_var(&lookup, "SIFT_REVIEW_LOW_THRESHOLD")? {
            self.thresholds.review_low = v;
        }
        if let Some(raw) = lookup("SIFT_ESCALATION_ENABLED") {
            self.escalation.enabled = parse_flag("SIFT_ESCALATION_ENABLED", &raw)?;
        }
        if let Some(v) = parse_var(&lookup, "SIFT_CALL_CAP")? {
            self.escalation.default_call_cap = v;
        }
        if let Some(v) = parse_var::<BigDecimal, _>(&lookup, "SIFT_COST_CAP")? {
            self.escalation.default_cost_cap = v;
        }
        if let Some(v) = parse_var::<BigDecimal, _>(&lookup, "SIFT_COST_PER_CALL")? {
            self.escalation.cost_per_call = v;
        }
        if let Some(v) = parse_var(&lookup, "SIFT_BATCH_CONCURRENCY")? {
            self.pipeline.batch_concurrency = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.signals.validate()?;
        self.escalation.validate()?;
        if self.pipeline.batch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.batch_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective config rendered back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("cannot render config: {}", e)))
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env {
                var: var.to_string(),
                value: raw,
            }),
    }
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var: var.to_string(),
            value: raw.to_string(),
        }),
    }
}
