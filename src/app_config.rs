use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::providers::openrouter::{DEFAULT_BASE_URL, DEFAULT_REFERER};
use crate::translation::chunker::{ChunkingStrategy, DEFAULT_CHUNK_SIZE};

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Application configuration module
/// This module handles loading, validating and saving the configuration.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Completion service settings
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Active project settings
    #[serde(default)]
    pub project: ProjectConfig,

    /// How source text is split
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Database file; the user data directory when absent
    #[serde(default)]
    pub database_path: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// OpenRouter connection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenRouterConfig {
    /// API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model id, e.g. `anthropic/claude-3.5-sonnet`
    #[serde(default = "String::new")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Deadline of a completion call in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Deadline of a metadata call in seconds
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,

    /// Value of the HTTP-Referer header
    #[serde(default = "default_referer")]
    pub referer: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            referer: default_referer(),
        }
    }
}

impl OpenRouterConfig {
    /// Whether both an API key and a model are set
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.model.trim().is_empty()
    }
}

/// Project settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectConfig {
    /// Project identifier used to scope the glossary
    #[serde(default = "default_project_id")]
    pub id: String,

    /// Display name
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Custom instructions prepended to every translation prompt
    #[serde(default)]
    pub instructions: String,

    /// Verify each finished translation
    #[serde(default)]
    pub auto_verify: bool,

    /// Replace glossary terms before translating
    #[serde(default = "default_true")]
    pub apply_glossary: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: default_project_id(),
            name: default_project_name(),
            instructions: String::new(),
            auto_verify: false,
            apply_glossary: true,
        }
    }
}

/// Chunking settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub strategy: ChunkingStrategy,

    /// Maximum words per chunk for word-count splitting
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_referer() -> String {
    DEFAULT_REFERER.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_metadata_timeout_secs() -> u64 {
    30
}

fn default_project_id() -> String {
    "default".to_string()
}

fn default_project_name() -> String {
    "Default Project".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.project.id.trim().is_empty() {
            return Err(anyhow!("Project ID must not be empty"));
        }

        if self.chunking.chunk_size == 0 {
            return Err(anyhow!("Chunk size must be greater than zero"));
        }

        url::Url::parse(&self.openrouter.base_url)
            .with_context(|| format!("Invalid OpenRouter base URL: {}", self.openrouter.base_url))?;

        if self.openrouter.timeout_secs == 0 || self.openrouter.metadata_timeout_secs == 0 {
            return Err(anyhow!("Timeouts must be greater than zero"));
        }

        Ok(())
    }

    /// Read a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Load the configuration, creating a default file when it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at {:?}, creating a default one", path);
        let config = Self::default();
        if let Err(e) = config.save(path) {
            warn!("Could not save default config: {}", e);
        } else {
            info!("Default config written to {:?}", path);
        }
        Ok(config)
    }

    /// Fill an empty API key from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_api_key_fallback(std::env::var(API_KEY_ENV_VAR).ok());
    }

    fn apply_api_key_fallback(&mut self, key: Option<String>) {
        if !self.openrouter.api_key.trim().is_empty() {
            return;
        }
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.openrouter.api_key = key;
        }
    }
}
