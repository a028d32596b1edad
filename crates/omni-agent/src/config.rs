//! # Runtime Configuration
//!
//! Bounds for actor turns and the sizes of the standard memory blocks.
//!
//! ## Environment Variables
//!
//! - `OMNI_MAX_RULE_VIOLATIONS` - Rejected proposals tolerated per turn (default: 3)
//! - `OMNI_MAX_TURN_STEPS` - Proposals allowed per turn (default: 32)
//! - `OMNI_DEDUP_WINDOW` - Recently seen message ids remembered per actor (default: 1024)
//! - `OMNI_PLAN_BLOCK_LIMIT` - Size of the orchestrator's plan and request changelog blocks (default: 15000)
//! - `OMNI_DOMAIN_BLOCK_LIMIT` - Size of each domain block and domain changelog (default: 8000)

use std::env;

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Validated runtime settings shared by every actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub max_rule_violations: usize,
    pub max_turn_steps: usize,
    pub dedup_window: usize,
    pub plan_block_limit: usize,
    pub domain_block_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_rule_violations: 3,
            max_turn_steps: 32,
            dedup_window: 1024,
            plan_block_limit: 15_000,
            domain_block_limit: 8_000,
        }
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is not a valid number or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = RuntimeConfigBuilder::default();
        if let Some(value) = get_usize(&lookup, "OMNI_MAX_RULE_VIOLATIONS")? {
            builder = builder.max_rule_violations(value);
        }
        if let Some(value) = get_usize(&lookup, "OMNI_MAX_TURN_STEPS")? {
            builder = builder.max_turn_steps(value);
        }
        if let Some(value) = get_usize(&lookup, "OMNI_DEDUP_WINDOW")? {
            builder = builder.dedup_window(value);
        }
        if let Some(value) = get_usize(&lookup, "OMNI_PLAN_BLOCK_LIMIT")? {
            builder = builder.plan_block_limit(value);
        }
        if let Some(value) = get_usize(&lookup, "OMNI_DOMAIN_BLOCK_LIMIT")? {
            builder = builder.domain_block_limit(value);
        }
        builder.build()
    }
}

/// Builder for [`RuntimeConfig`]
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    #[must_use]
    pub fn max_rule_violations(mut self, value: usize) -> Self {
        self.config.max_rule_violations = value;
        self
    }

    #[must_use]
    pub fn max_turn_steps(mut self, value: usize) -> Self {
        self.config.max_turn_steps = value;
        self
    }

    #[must_use]
    pub fn dedup_window(mut self, value: usize) -> Self {
        self.config.dedup_window = value;
        self
    }

    #[must_use]
    pub fn plan_block_limit(mut self, value: usize) -> Self {
        self.config.plan_block_limit = value;
        self
    }

    #[must_use]
    pub fn domain_block_limit(mut self, value: usize) -> Self {
        self.config.domain_block_limit = value;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if any bound is zero.
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        let c = self.config;
        for (name, value) in [
            ("max_rule_violations", c.max_rule_violations),
            ("max_turn_steps", c.max_turn_steps),
            ("dedup_window", c.dedup_window),
            ("plan_block_limit", c.plan_block_limit),
            ("domain_block_limit", c.domain_block_limit),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        Ok(c)
    }
}

fn get_usize<F>(lookup: &F, key: &str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid usize value '{val}': {e}"),
            }),
        None => Ok(None),
    }
}
