pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use self::validation::validate_config;

/// Environment variable naming an optional YAML file loaded before env overrides.
pub const CONFIG_FILE_ENV: &str = "BRIDGE_CONFIG_FILE";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid environment variable {key}: {message}")]
    Env { key: &'static str, message: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// How the upstream `max_tokens` is derived from the caller's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenPolicy {
    /// Bound the requested value (or the floor when absent) to `[min, max]`.
    #[default]
    Clamp,
    /// Ignore the requested value and always send the ceiling.
    Override,
}

impl fmt::Display for TokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPolicy::Clamp => write!(f, "clamp"),
            TokenPolicy::Override => write!(f, "override"),
        }
    }
}

impl FromStr for TokenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(TokenPolicy::Clamp),
            "override" => Ok(TokenPolicy::Override),
            other => Err(format!("unknown token policy '{other}' (expected clamp|override)")),
        }
    }
}

/// Listener and connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-attempt upstream timeout, in seconds.
    pub timeout: u64,
    pub http_pool_max_idle_per_host: usize,
    pub http_pool_idle_timeout_secs: u64,
    /// Ceiling for inbound request bodies and buffered upstream bodies.
    pub max_body_bytes: usize,
    /// Also serve `POST /chat/completions` without the `/v1` prefix.
    pub enable_legacy_chat_route: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            timeout: 120,
            http_pool_max_idle_per_host: 32,
            http_pool_idle_timeout_secs: 30,
            max_body_bytes: 50 * 1024 * 1024,
            enable_legacy_chat_route: false,
            runtime_worker_threads: None,
        }
    }
}

/// Upstream endpoint, credential and retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            api_key: String::new(),
            max_retries: 2,
            retry_delay_ms: 1_500,
        }
    }
}

/// Request normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub min_tokens: u32,
    pub max_tokens: u32,
    pub token_policy: TokenPolicy,
    pub default_temperature: f64,
    /// Prepended as a system message when the caller supplied none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_directive: Option<String>,
    pub enable_thinking_mode: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_tokens: 1_024,
            max_tokens: 32_768,
            token_policy: TokenPolicy::Clamp,
            default_temperature: 0.6,
            system_directive: None,
            enable_thinking_mode: false,
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Render upstream reasoning inside `<think>` delimiters instead of dropping it.
    pub show_reasoning: bool,
    pub log_level: String,
    /// Emit log lines as JSON objects instead of human-readable text.
    pub log_json: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            show_reasoning: false,
            log_level: "INFO".to_string(),
            log_json: false,
        }
    }
}

/// Top-level application configuration, immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub generation: GenerationConfig,
    pub features: FeaturesConfig,
    /// Public model id -> upstream model id.
    pub models: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            generation: GenerationConfig::default(),
            features: FeaturesConfig::default(),
            models: default_model_table(),
        }
    }
}

/// Built-in model table used when the config file does not provide one.
#[must_use]
pub fn default_model_table() -> BTreeMap<String, String> {
    [
        ("gpt-3.5-turbo", "meta/llama-3.1-8b-instruct"),
        ("gpt-4", "meta/llama-3.1-70b-instruct"),
        ("gpt-4-turbo", "meta/llama-3.1-405b-instruct"),
        ("gpt-4o", "deepseek-ai/deepseek-r1"),
        ("gpt-4o-mini", "meta/llama-3.1-8b-instruct"),
        ("claude-3-opus", "openai/gpt-oss-120b"),
        ("claude-3-sonnet", "openai/gpt-oss-20b"),
        ("gemini-pro", "qwen/qwen3-next-80b-a3b-thinking"),
    ]
    .into_iter()
    .map(|(public, upstream)| (public.to_string(), upstream.to_string()))
    .collect()
}

/// Load configuration from the process environment.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration from defaults, an optional YAML file named by
/// [`CONFIG_FILE_ENV`], and environment overrides (later wins), then validate.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Yaml`] when the file cannot be
/// read or parsed, [`ConfigError::Env`] when a variable has an unparsable value,
/// or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config_from<F>(env: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match env(CONFIG_FILE_ENV).filter(|path| !path.trim().is_empty()) {
        Some(path) => load_config_file(path.trim())?,
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config, &env)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a YAML config file without env overrides or validation.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Yaml`].
pub fn load_config_file(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut AppConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env_string(env, "UPSTREAM_BASE_URL") {
        config.upstream.base_url = v;
    }
    if let Some(v) = env_string(env, "UPSTREAM_API_KEY") {
        config.upstream.api_key = v;
    }
    if let Some(v) = env_parse(env, "UPSTREAM_MAX_RETRIES")? {
        config.upstream.max_retries = v;
    }
    if let Some(v) = env_parse(env, "UPSTREAM_RETRY_DELAY_MS")? {
        config.upstream.retry_delay_ms = v;
    }

    if let Some(v) = env_string(env, "HOST") {
        config.server.host = v;
    }
    if let Some(v) = env_parse(env, "PORT")? {
        config.server.port = v;
    }
    if let Some(v) = env_parse(env, "REQUEST_TIMEOUT_SECS")? {
        config.server.timeout = v;
    }
    if let Some(v) = env_parse(env, "MAX_BODY_BYTES")? {
        config.server.max_body_bytes = v;
    }
    if let Some(v) = env_bool(env, "ENABLE_LEGACY_CHAT_ROUTE")? {
        config.server.enable_legacy_chat_route = v;
    }

    if let Some(v) = env_parse(env, "MIN_TOKENS")? {
        config.generation.min_tokens = v;
    }
    if let Some(v) = env_parse(env, "MAX_TOKENS")? {
        config.generation.max_tokens = v;
    }
    if let Some(v) = env_parse(env, "TOKEN_POLICY")? {
        config.generation.token_policy = v;
    }
    if let Some(v) = env_parse(env, "DEFAULT_TEMPERATURE")? {
        config.generation.default_temperature = v;
    }
    if let Some(v) = env_string(env, "SYSTEM_DIRECTIVE") {
        config.generation.system_directive = Some(v);
    }
    if let Some(v) = env_bool(env, "ENABLE_THINKING_MODE")? {
        config.generation.enable_thinking_mode = v;
    }

    if let Some(v) = env_bool(env, "SHOW_REASONING")? {
        config.features.show_reasoning = v;
    }
    if let Some(v) = env_string(env, "LOG_LEVEL") {
        config.features.log_level = v;
    }
    if let Some(v) = env_bool(env, "LOG_JSON")? {
        config.features.log_json = v;
    }
    Ok(())
}

fn env_string<F>(env: &F, key: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<F, T>(env: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = env_string(env, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::Env {
            key,
            message: format!("'{raw}': {e}"),
        })
}

fn env_bool<F>(env: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = env_string(env, key) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Env {
            key,
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}
