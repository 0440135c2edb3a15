//! Tenant store configuration.
//!
//! Configuration is loaded with precedence:
//! 1. Environment variables (TDB_*)
//! 2. Config file (TOML)
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "TDB_DATA_DIR";

/// SQLite journal mode for tenant connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Wal,
    Delete,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Where tenant stores live and how their connections are opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one `<tenant>.db` file per tenant
    pub data_dir: PathBuf,

    /// SQLite busy timeout in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,

    /// Journal mode (default: wal)
    pub journal_mode: JournalMode,

    /// Create `data_dir` on first use (default: true)
    pub create_dirs: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("tenants"),
            busy_timeout_ms: 5000,
            journal_mode: JournalMode::Wal,
            create_dirs: true,
        }
    }
}

impl StoreConfig {
    /// Create a config rooted at `data_dir` with default settings
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load from an optional TOML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the data directory
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Set the busy timeout
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the journal mode
    pub fn with_journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.journal_mode = journal_mode;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::invalid_config("data_dir", "must not be empty"));
        }

        if self.busy_timeout_ms == 0 {
            return Err(Error::invalid_config(
                "busy_timeout_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}
