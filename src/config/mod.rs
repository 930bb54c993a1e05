//! Configuration management for ReplayLog

pub mod settings;

pub use settings::{ServerConfig, ServerSettings, StorageSettings};
