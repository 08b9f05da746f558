// ABOUTME: Configuration loading and validation for the svgrad CLI.
// ABOUTME: Reads SVGRAD_* environment variables (after .env) and enforces value constraints.

use std::path::PathBuf;

use thiserror::Error;

use svgrad_agent::{DEFAULT_MAX_ITERATIONS, SUPPORTED_PROVIDERS};
use svgrad_core::{DEFAULT_GRADIENT_ID, is_valid_gradient_id};

/// Upper bound on SVGRAD_MAX_ITERATIONS.
pub const MAX_ITERATIONS_LIMIT: usize = 50;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SVGRAD_PROVIDER must be one of {expected}, got {0:?}", expected = SUPPORTED_PROVIDERS.join(", "))]
    UnknownProvider(String),

    #[error("SVGRAD_MAX_ITERATIONS must be an integer between 1 and {MAX_ITERATIONS_LIMIT}, got {0:?}")]
    InvalidMaxIterations(String),

    #[error("SVGRAD_GRADIENT_ID is not a valid XML id: {0:?}")]
    InvalidGradientId(String),
}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgradConfig {
    pub provider: String,
    pub model: Option<String>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub max_iterations: usize,
    pub gradient_id: String,
}

impl Default for SvgradConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            input: PathBuf::from("input.svg"),
            output: PathBuf::from("output.svg"),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gradient_id: DEFAULT_GRADIENT_ID.to_string(),
        }
    }
}

impl SvgradConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - SVGRAD_PROVIDER: openai, anthropic, or direct (default: openai)
    /// - SVGRAD_MODEL: model name override (optional)
    /// - SVGRAD_INPUT: input SVG path (default: input.svg)
    /// - SVGRAD_OUTPUT: output SVG path (default: output.svg)
    /// - SVGRAD_MAX_ITERATIONS: steps per task, 1..=50 (default: 6)
    /// - SVGRAD_GRADIENT_ID: id of the inserted gradient (default: grad1)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let provider = get("SVGRAD_PROVIDER")
            .map(|p| p.trim().to_ascii_lowercase())
            .unwrap_or(defaults.provider);
        validate_provider(&provider)?;

        let max_iterations = match get("SVGRAD_MAX_ITERATIONS") {
            Some(raw) => parse_max_iterations(&raw)?,
            None => defaults.max_iterations,
        };

        let gradient_id = get("SVGRAD_GRADIENT_ID").unwrap_or(defaults.gradient_id);
        validate_gradient_id(&gradient_id)?;

        Ok(Self {
            provider,
            model: get("SVGRAD_MODEL"),
            input: get("SVGRAD_INPUT").map(PathBuf::from).unwrap_or(defaults.input),
            output: get("SVGRAD_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.output),
            max_iterations,
            gradient_id,
        })
    }
}

pub fn validate_provider(provider: &str) -> Result<(), ConfigError> {
    if SUPPORTED_PROVIDERS.contains(&provider) {
        Ok(())
    } else {
        Err(ConfigError::UnknownProvider(provider.to_string()))
    }
}

pub fn parse_max_iterations(raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=MAX_ITERATIONS_LIMIT).contains(n))
        .ok_or_else(|| ConfigError::InvalidMaxIterations(raw.to_string()))
}

pub fn validate_gradient_id(id: &str) -> Result<(), ConfigError> {
    if is_valid_gradient_id(id) {
        Ok(())
    } else {
        Err(ConfigError::InvalidGradientId(id.to_string()))
    }
}
