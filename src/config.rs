use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_TRANSITION_MS: u64 = 400;
pub const DEFAULT_FAILSAFE_MS: u64 = 50;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bliss config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Whether the host style object understands `transition-*` properties.
    pub supported: bool,
    pub default_duration_ms: u64,
    /// Slack added to the duration before the failsafe timer resolves.
    pub failsafe_ms: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            supported: true,
            default_duration_ms: DEFAULT_TRANSITION_MS,
            failsafe_ms: DEFAULT_FAILSAFE_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlissConfig {
    pub transitions: TransitionConfig,
    pub fetch: FetchConfig,
}

impl BlissConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str::<BlissConfig>(&contents)?
            }
            _ => BlissConfig::default(),
        };

        if let Some(base) = &config.fetch.base_url {
            Url::parse(base)?;
        }

        Ok(config)
    }

    pub fn base_url(&self) -> Option<Url> {
        self.fetch
            .base_url
            .as_deref()
            .and_then(|base| Url::parse(base).ok())
    }
}
