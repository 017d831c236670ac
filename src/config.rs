//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use crate::prompts::InstructFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// koboldbot configuration. Loaded once at startup, immutable thereafter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Bot persona and admission settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Inference server connection.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Sampling parameters sent with every generation request.
    #[serde(default)]
    pub sampling: SamplingParameters,

    /// Discord bot token. Only ever read from `DISCORD_TOKEN`.
    #[serde(skip)]
    pub discord_token: Option<String>,
}

/// Bot persona and message admission settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Display name the bot answers to and speaks as.
    pub name: String,

    /// System instruction override. `{name}` is replaced with the bot name.
    pub persona: Option<String>,

    /// Only serve messages from this guild. `None` serves every guild.
    pub guild: Option<String>,

    /// Users (id or name) the bot answers even when it is not addressed.
    pub always_respond: Vec<String>,

    /// Default record count for `/show_history`.
    pub show_history_count: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Cirno".into(),
            persona: None,
            guild: None,
            always_respond: Vec::new(),
            show_history_count: 5,
        }
    }
}

impl BotConfig {
    /// The rendered system instruction for this persona.
    pub fn instruction(&self) -> String {
        match &self.persona {
            Some(template) => template.replace("{name}", &self.name),
            None => format!(
                "You are {}, a chatbot designed to interact with users. Respond in English, \
                 respond with only one sentence. Respond in plaintext. Keep your response in \
                 character, write a response that appropriately completes the request.",
                self.name
            ),
        }
    }
}

/// Inference server connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL, e.g. `http://localhost:5001`.
    pub endpoint: String,

    /// Request timeout for every call to the inference server.
    pub timeout_secs: u64,

    /// Instruct template the loaded model expects.
    pub format: InstructFormat,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5001".into(),
            timeout_secs: 120,
            format: InstructFormat::default(),
        }
    }
}

/// Sampling parameters for the inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParameters {
    pub max_context_length: u32,
    pub max_length: u32,
    pub quiet: bool,
    pub rep_pen: f64,
    pub rep_pen_range: u32,
    pub rep_pen_slope: f64,
    pub temperature: f64,
    pub tfs: f64,
    pub top_a: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub typical: f64,
    pub dynamic_temperature: bool,
    pub dynatemp_low: f64,
    pub dynatemp_high: f64,
    pub dynatemp_range: f64,
    pub dynatemp_exponent: f64,
    /// Sent as both `stopping_strings` and `stop`.
    pub stop_sequences: Vec<String>,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            max_context_length: 2048,
            max_length: 512,
            quiet: false,
            rep_pen: 1.1,
            rep_pen_range: 256,
            rep_pen_slope: 1.0,
            temperature: 0.5,
            tfs: 1.0,
            top_a: 0.0,
            top_k: 100,
            top_p: 0.9,
            typical: 1.0,
            dynamic_temperature: true,
            dynatemp_low: 0.1,
            dynatemp_high: 1.5,
            dynatemp_range: 0.7,
            dynatemp_exponent: 1.0,
            stop_sequences: vec!["<|im_end|>".into(), "<|".into()],
        }
    }
}

impl Config {
    /// Load configuration from the default config file (if present) and environment.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::read_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific config file path. The file must exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/koboldbot/config.toml` or `./config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("koboldbot").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// The Discord token, required before connecting.
    pub fn discord_token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey("DISCORD_TOKEN".into()).into())
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(source),
        })?;
        toml::from_str(&content).map_err(|source| {
            ConfigError::Parse {
                path: path.display().to_string(),
                source: Box::new(source),
            }
            .into()
        })
    }

    fn apply_env(&mut self) {
        self.discord_token = std::env::var("DISCORD_TOKEN").ok();
        if let Ok(guild) = std::env::var("DISCORD_GUILD")
            && !guild.trim().is_empty()
        {
            self.bot.guild = Some(guild);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bot.name.trim().is_empty() {
            return Err(ConfigError::Invalid("bot.name must not be empty".into()).into());
        }
        if !self.inference.endpoint.starts_with("http://")
            && !self.inference.endpoint.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "inference.endpoint must be an http(s) URL, got {}",
                self.inference.endpoint
            ))
            .into());
        }
        if self.inference.timeout_secs == 0 {
            return Err(ConfigError::Invalid("inference.timeout_secs must be positive".into()).into());
        }
        if self.sampling.max_length > self.sampling.max_context_length {
            return Err(ConfigError::Invalid(
                "sampling.max_length must not exceed sampling.max_context_length".into(),
            )
            .into());
        }
        Ok(())
    }
}
