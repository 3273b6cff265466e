//! Configuration loading, validation, and management for Discovery AI.
//!
//! Loads configuration from `~/.discovery-ai/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup so that a bad window size or an empty keyword set fails the
//! process before the first request.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// System prompt template configuration
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Intent policy (mandatory follow-up action) configuration
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Compliance heuristic keyword sets
    #[serde(default)]
    pub compliance: ComplianceConfig,

    /// Model orchestration limits and fallback text
    #[serde(default)]
    pub agent: AgentConfig,

    /// Email tool delivery settings
    #[serde(default)]
    pub email: EmailConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("gateway", &self.gateway)
            .field("memory", &self.memory)
            .field("prompt", &self.prompt)
            .field("policy", &self.policy)
            .field("compliance", &self.compliance)
            .field("agent", &self.agent)
            .field("email", &self.email)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Conversation window: messages kept per conversation before FIFO eviction
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_max_messages() -> usize {
    100
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Path of the system prompt template (tera syntax)
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,

    /// Values substituted into the template
    #[serde(default = "default_template_params")]
    pub params: BTreeMap<String, String>,
}

fn default_template_path() -> PathBuf {
    PathBuf::from("prompts/system-prompt.txt")
}
fn default_template_params() -> BTreeMap<String, String> {
    BTreeMap::from([("name".to_string(), "L'assistant IA officiel".to_string())])
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            params: default_template_params(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Case-insensitive substrings that trigger the mandatory email instruction
    #[serde(default = "default_trigger_keywords")]
    pub trigger_keywords: Vec<String>,

    /// Injection mode of the stateful prompt endpoint: "trigger_gated" or "unconditional"
    #[serde(default = "default_prompt_mode")]
    pub prompt_mode: String,

    /// Recipient written into the injected instruction
    #[serde(default = "default_email_recipient")]
    pub email_recipient: String,
}

fn default_trigger_keywords() -> Vec<String> {
    vec![
        "dataset".into(),
        "créez".into(),
        "générez".into(),
        "produisez".into(),
    ]
}
fn default_prompt_mode() -> String {
    "trigger_gated".into()
}
fn default_email_recipient() -> String {
    "datasets@discovery-intech.com".into()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trigger_keywords: default_trigger_keywords(),
            prompt_mode: default_prompt_mode(),
            email_recipient: default_email_recipient(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    #[serde(default = "default_action_keywords")]
    pub action_keywords: Vec<String>,

    #[serde(default = "default_completion_keywords")]
    pub completion_keywords: Vec<String>,
}

fn default_action_keywords() -> Vec<String> {
    vec!["email".into(), "notification".into()]
}
fn default_completion_keywords() -> Vec<String> {
    vec!["sent".into(), "envoyé".into()]
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            action_keywords: default_action_keywords(),
            completion_keywords: default_completion_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on one model turn, tool calls included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum model round-trips spent on tool calls per turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Reply of the stateful text endpoint when the model call fails
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_tool_iterations() -> u32 {
    10
}
fn default_fallback_message() -> String {
    "Désolé, je n'ai pas pu accéder aux informations demandées. Veuillez réessayer ou contacter le support.".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_tool_iterations: default_max_tool_iterations(),
            fallback_message: default_fallback_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// HTTP relay receiving `{from, to, subject, body}`; unset = log-only outbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,

    #[serde(default = "default_sender")]
    pub sender: String,

    /// Emails kept in the outbox when no relay is set; oldest dropped first
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

fn default_sender() -> String {
    "assistant@discovery-intech.com".into()
}
fn default_outbox_capacity() -> usize {
    100
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            sender: default_sender(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.discovery-ai/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// Environment variables:
    /// - `DISCOVERY_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `DISCOVERY_PROVIDER`, `DISCOVERY_MODEL`, `DISCOVERY_PORT`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("DISCOVERY_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }

        if let Some(provider) = lookup("DISCOVERY_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("DISCOVERY_MODEL") {
            self.default_model = model;
        }

        if let Some(port) = lookup("DISCOVERY_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("DISCOVERY_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".discovery-ai")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.memory.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_messages must be at least 1".into(),
            ));
        }

        if self.agent.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.timeout_secs must be at least 1".into(),
            ));
        }

        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }

        if self.email.outbox_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "email.outbox_capacity must be at least 1".into(),
            ));
        }

        if !matches!(self.policy.prompt_mode.as_str(), "trigger_gated" | "unconditional") {
            return Err(ConfigError::ValidationError(format!(
                "policy.prompt_mode must be \"trigger_gated\" or \"unconditional\", got \"{}\"",
                self.policy.prompt_mode
            )));
        }

        for (name, keywords) in [
            ("policy.trigger_keywords", &self.policy.trigger_keywords),
            ("compliance.action_keywords", &self.compliance.action_keywords),
            ("compliance.completion_keywords", &self.compliance.completion_keywords),
        ] {
            if keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must contain at least one non-blank keyword"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Render the configuration as TOML with every secret removed.
    pub fn redacted_toml(&self) -> Result<String, ConfigError> {
        let mut config = self.clone();
        config.api_key = None;
        for provider in config.providers.values_mut() {
            provider.api_key = None;
        }
        toml::to_string_pretty(&config).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            memory: MemoryConfig::default(),
            prompt: PromptConfig::default(),
            policy: PolicyConfig::default(),
            compliance: ComplianceConfig::default(),
            agent: AgentConfig::default(),
            email: EmailConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
