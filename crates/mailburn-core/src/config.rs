//! User settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gateway::{DEFAULT_BASE_URL, MailboxApi};
use crate::generator::{ConfiguredGenerator, DEFAULT_DOMAINS, LocalGenerator, RemoteGenerator};
use crate::{Error, Result};

/// Directory name under the platform config/data dirs.
const APP_DIR: &str = "mailburn";

/// Where new addresses come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Ask the mailbox service.
    #[default]
    Remote,
    /// Invent locally from the domain pool.
    Local,
}

/// Settings persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mailbox service endpoint.
    pub api_base_url: String,
    /// Address source.
    pub generator: GeneratorKind,
    /// Domain pool for the local generator.
    pub domains: Vec<String>,
    /// Seconds between sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds between mailbox checks.
    pub poll_interval_secs: u64,
    /// Store location; defaults to the platform data dir.
    pub database_path: Option<PathBuf>,
    /// Per-request timeout. Unset means requests may wait indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            generator: GeneratorKind::default(),
            domains: DEFAULT_DOMAINS.iter().map(ToString::to_string).collect(),
            sweep_interval_secs: 1,
            poll_interval_secs: 30,
            database_path: None,
            request_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Default settings file: `<config dir>/mailburn/settings.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.json")
    }

    /// Loads settings from `path`, falling back to defaults if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the parsed values are unusable.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let settings: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes settings to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 || self.poll_interval_secs == 0 {
            return Err(Error::Config("timer intervals must be at least one second".to_string()));
        }
        if self.generator == GeneratorKind::Local && self.domains.is_empty() {
            return Err(Error::Config("local generator needs at least one domain".to_string()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Resolved store location.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("mailburn.db")
        })
    }

    /// Sweep timer period.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Poll timer period.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// HTTP client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint URL is invalid.
    pub fn mailbox_api(&self) -> Result<MailboxApi> {
        MailboxApi::with_timeout(
            &self.api_base_url,
            self.request_timeout_secs.map(Duration::from_secs),
        )
    }

    /// Address generator selected by [`Self::generator`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the selected generator cannot be built.
    pub fn address_generator(&self, api: &MailboxApi) -> Result<ConfiguredGenerator> {
        Ok(match self.generator {
            GeneratorKind::Remote => ConfiguredGenerator::Remote(RemoteGenerator::new(api.clone())),
            GeneratorKind::Local => {
                ConfiguredGenerator::Local(LocalGenerator::new(self.domains.iter().cloned())?)
            }
        })
    }
}
