use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::agent::{self, AgentInfo};

/// Overrides `backend_url` from the config file.
pub const BACKEND_URL_ENV: &str = "SIMCOPILOT_BACKEND_URL";

/// Overrides `request_timeout_secs` from the config file.
pub const TIMEOUT_ENV: &str = "SIMCOPILOT_TIMEOUT_SECS";

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base address of the agent backend
    pub backend_url: String,

    /// Upper bound on a single exchange; 0 waits forever
    pub request_timeout_secs: u64,

    /// UI preferences
    pub ui: UiConfig,

    /// simcopilot home directory
    #[serde(skip)]
    pub home: PathBuf,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_timestamps: bool,
    /// Agent to open directly, skipping the picker
    pub default_agent: Option<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            default_agent: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            ui: UiConfig::default(),
            home: default_home(),
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".simcopilot")
}

/// Environment values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub backend_url: Option<String>,
    pub timeout_secs: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the process environment, after loading
    /// `.env.local` and `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::dotenv();

        Self {
            backend_url: std::env::var(BACKEND_URL_ENV).ok(),
            timeout_secs: std::env::var(TIMEOUT_ENV).ok(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or `~/.simcopilot/config.toml` when
    /// `path` is `None`. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else {
            debug!(path = %config_path.display(), "no config file, using defaults");
            Config::default()
        };

        config.home = default_home();
        Ok(config)
    }

    /// Apply environment overrides. Invalid timeout values are an error
    /// rather than silently ignored.
    pub fn apply_env(&mut self, env: &EnvOverrides) -> Result<()> {
        if let Some(url) = env.backend_url.as_deref().filter(|u| !u.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(secs) = env.timeout_secs.as_deref() {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{TIMEOUT_ENV} must be a whole number of seconds, got '{secs}'"))?;
        }
        Ok(())
    }

    /// Per-exchange bound; `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// The configured default agent, validated against the registry.
    pub fn default_agent(&self) -> Result<Option<&'static AgentInfo>> {
        self.ui
            .default_agent
            .as_deref()
            .map(agent::resolve)
            .transpose()
            .context("Invalid ui.default_agent in config")
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        default_home().join("config.toml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}
