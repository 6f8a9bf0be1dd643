use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the assistant service credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Remote assistant resources and models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Pre-configured assistant that answers the questions
    #[serde(default = "default_assistant_id")]
    pub assistant_id: String,

    /// Document index the assistant searches; uploads are attached here
    #[serde(default = "default_vector_store_id")]
    pub vector_store_id: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Cheaper model used for conversation titles
    #[serde(default = "default_title_model")]
    pub title_model: String,

    /// Start new sessions with the fixed response structure enabled
    #[serde(default = "default_true")]
    pub use_fixed_structure: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_assistant_id() -> String {
    "asst_gknNNm2uyfxPyuzxx0JHfhtF".to_string()
}

fn default_vector_store_id() -> String {
    "vs_67d1e99c789c8191bd776ac5437cbc08".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_title_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            assistant_id: default_assistant_id(),
            vector_store_id: default_vector_store_id(),
            base_url: default_base_url(),
            title_model: default_title_model(),
            use_fixed_structure: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where prompts are read from and conversation logs are written to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prompts_dir: default_prompts_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// Run polling behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed delay between status polls (default: 1000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Give up on a run after this many seconds; 0 waits forever (default: 600)
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_deadline_secs() -> u64 {
    600
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: false,
        }
    }
}

/// Token prices used for the cost estimate in the sidebar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_input_price")]
    pub input_per_million_usd: f64,
    #[serde(default = "default_output_price")]
    pub output_per_million_usd: f64,
}

fn default_input_price() -> f64 {
    1.10
}

fn default_output_price() -> f64 {
    4.40
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million_usd: default_input_price(),
            output_per_million_usd: default_output_price(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path()?;
        let write_err = |message: String| ConfigError::Write {
            path: config_path.clone(),
            message,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(&config_path, content).map_err(|e| write_err(e.to_string()))?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("skatteret-assistant").join("config.toml"))
    }

    /// Credential for the assistant service. It is only ever read from
    /// the environment, never from the config file.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingCredential { var: API_KEY_ENV })
    }
}
