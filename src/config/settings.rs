//! Configuration structures for ReplayLog

use crate::{ReplayLogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default TCP port the server listens on
pub const DEFAULT_PORT: u16 = 9000;

/// Default location of the persisted log
pub const DEFAULT_DATA_FILE: &str = "/var/tmp/aesdsocketdata";

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network and process settings
    pub server: ServerSettings,
    /// Log store configuration
    pub storage: StorageSettings,
}

/// Core server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Passive address to bind, `0.0.0.0` accepts any IPv4 client
    pub bind_address: String,
    /// TCP port; 0 asks the kernel for an ephemeral port
    pub port: u16,
    /// Pending-connection queue length handed to `listen`
    pub backlog: u32,
    /// Chunk size for socket reads and log replay
    pub buffer_size: usize,
    /// Detach from the terminal after binding
    pub daemonize: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// File holding the concatenation of every received payload
    pub data_file: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            backlog: 5,
            buffer_size: 1024,
            daemonize: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReplayLogError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| ReplayLogError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ReplayLogError::Config("Bind address cannot be empty".to_string()));
        }
        if self.server.backlog == 0 {
            return Err(ReplayLogError::Config("Backlog must be at least 1".to_string()));
        }
        if self.server.buffer_size == 0 {
            return Err(ReplayLogError::Config("Buffer size must be at least 1".to_string()));
        }
        if self.storage.data_file.as_os_str().is_empty() {
            return Err(ReplayLogError::Config("Data file path cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Anchor a relative data file at `base`
    ///
    /// Must run before daemonizing, which moves the working directory to `/`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.storage.data_file.is_relative() {
            self.storage.data_file = base.join(&self.storage.data_file);
        }
    }

    /// Anchor a relative data file at the current working directory
    pub fn resolve_paths_from_cwd(&mut self) -> Result<()> {
        let cwd = std::env::current_dir()
            .map_err(|e| ReplayLogError::Config(format!("Failed to read working directory: {}", e)))?;
        self.resolve_paths(&cwd);
        Ok(())
    }
}
