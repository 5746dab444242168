//! Persistent settings.

pub mod config;

pub use config::{
    config_file_path, load_config, save_config, ClientConfig, ConfigError, PeerEntry,
};
