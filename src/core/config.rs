//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.mathscene/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;

use crate::Provider;
use crate::core::validate::RepairPolicy;
use crate::inference::Effort;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MathsceneConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_provider: Option<Provider>,
    pub default_model: Option<String>,
    pub reasoning_effort: Option<Effort>,
    pub max_output_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub max_concurrent_requests: Option<usize>,
    pub repair_policy: Option<RepairPolicy>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.0-flash-001";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: Provider,
    pub model_name: String,
    pub effort: Effort,
    pub max_output_tokens: u32,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub repair_policy: RepairPolicy,
    pub api_key: String,
    /// None = the provider's public endpoint.
    pub base_url: Option<String>,
}

/// Values given on the command line. None = not specified.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub repair_policy: Option<RepairPolicy>,
    pub request_timeout_secs: Option<u64>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// The selected provider has no API key anywhere in the hierarchy.
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },
    UnknownProvider(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::MissingCredential { provider, env_var } => write!(
                f,
                "no API key for provider {provider}: set {env_var} or [{provider}].api_key"
            ),
            ConfigError::UnknownProvider(name) => write!(f, "unknown provider: {name}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.mathscene/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".mathscene").join("config.toml"))
}

/// Load config from `~/.mathscene/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `MathsceneConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<MathsceneConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(MathsceneConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(MathsceneConfig::default());
    }

    load_config_from(&path)
}

/// Load config from an explicit path. The file must exist.
pub fn load_config_from(path: &Path) -> Result<MathsceneConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: MathsceneConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", redacted(&config));
    Ok(config)
}

/// Config with API keys masked, for logging.
fn redacted(config: &MathsceneConfig) -> String {
    let mask = |key: &Option<String>| key.as_ref().map(|_| "***");
    format!(
        "general={:?} gemini.api_key={:?} gemini.base_url={:?} openrouter.api_key={:?} openrouter.base_url={:?}",
        config.general,
        mask(&config.gemini.api_key),
        config.gemini.base_url,
        mask(&config.openrouter.api_key),
        config.openrouter.base_url,
    )
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# mathscene configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_provider = "gemini"        # "gemini" or "openrouter"
# default_model = "gemini-2.0-flash"
# reasoning_effort = "none"          # "high", "medium", "low", "auto", "none"
# max_output_tokens = 2048
# request_timeout_secs = 30
# max_concurrent_requests = 4
# repair_policy = "strict"           # "strict" rejects, "clamp" fixes solutionCount > originalCount

# [gemini]
# api_key = "..."                    # Or set GOOGLE_API_KEY env var
# base_url = "https://generativelanguage.googleapis.com/v1beta"

# [openrouter]
# api_key = "sk-or-..."              # Or set OPENROUTER_API_KEY env var
# base_url = "https://openrouter.ai/api/v1"
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config from the process environment.
pub fn resolve(config: &MathsceneConfig, cli: &Overrides) -> Result<ResolvedConfig, ConfigError> {
    resolve_with(config, cli, |key| std::env::var(key).ok())
}

/// Resolve the final config by collapsing: defaults → config file → env → CLI.
///
/// `env` looks up an environment variable; tests pass a fixed map.
pub fn resolve_with(
    config: &MathsceneConfig,
    cli: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig, ConfigError> {
    // Provider: CLI → env → config → default
    let provider = match cli.provider.clone() {
        Some(p) => p,
        None => match env("MATHSCENE_PROVIDER") {
            Some(name) => Provider::from_str(&name, true)
                .map_err(|_| ConfigError::UnknownProvider(name))?,
            None => config.general.default_provider.clone().unwrap_or_default(),
        },
    };

    let (section, key_vars, url_var, default_model): (&ProviderConfig, &[&'static str], _, _) =
        match provider {
            Provider::Gemini => (
                &config.gemini,
                &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
                "GEMINI_BASE_URL",
                DEFAULT_GEMINI_MODEL,
            ),
            Provider::OpenRouter => (
                &config.openrouter,
                &["OPENROUTER_API_KEY"],
                "OPENROUTER_BASE_URL",
                DEFAULT_OPENROUTER_MODEL,
            ),
        };

    // Model: CLI → env → config → provider default
    let model_name = cli
        .model
        .clone()
        .or_else(|| env("MATHSCENE_MODEL"))
        .or_else(|| config.general.default_model.clone())
        .unwrap_or_else(|| default_model.to_string());

    // API key: env → config. Blank values count as absent.
    let present = |key: &String| !key.trim().is_empty();
    let api_key = key_vars
        .iter()
        .find_map(|var| env(*var).filter(present))
        .or_else(|| section.api_key.clone().filter(present))
        .ok_or_else(|| ConfigError::MissingCredential {
            provider: provider_name(&provider).to_string(),
            env_var: key_vars[0],
        })?;

    let base_url = env(url_var).or_else(|| section.base_url.clone());

    let max_concurrent_requests = config
        .general
        .max_concurrent_requests
        .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS);
    if max_concurrent_requests == 0 {
        return Err(ConfigError::Invalid(
            "max_concurrent_requests must be at least 1".into(),
        ));
    }

    let timeout_secs = cli
        .request_timeout_secs
        .or(config.general.request_timeout_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "request_timeout_secs must be at least 1".into(),
        ));
    }

    Ok(ResolvedConfig {
        provider,
        model_name,
        effort: config.general.reasoning_effort.unwrap_or_default(),
        max_output_tokens: config
            .general
            .max_output_tokens
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
        request_timeout: Duration::from_secs(timeout_secs),
        max_concurrent_requests,
        repair_policy: cli
            .repair_policy
            .or(config.general.repair_policy)
            .unwrap_or_default(),
        api_key,
        base_url,
    })
}

fn provider_name(provider: &Provider) -> &'static str {
    match provider {
        Provider::Gemini => "gemini",
        Provider::OpenRouter => "openrouter",
    }
}
