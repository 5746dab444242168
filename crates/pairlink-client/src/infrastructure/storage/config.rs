//! TOML configuration for the pairing client.
//!
//! Read from an explicit path or from the platform config file:
//! - Windows:  `%APPDATA%\PairLink\client.toml`
//! - Linux:    `~/.config/pairlink/client.toml`
//! - macOS:    `~/Library/Application Support/PairLink/client.toml`
//!
//! ```toml
//! service_id = "00001101-0000-1000-8000-00805f9b34fb"
//! handshake_timeout_ms = 10000
//! connect_timeout_ms = 8000
//! adapter_enabled = true
//!
//! [[peers]]
//! name = "bench-server"
//! address = "192.168.1.40:7878"
//! ```
//!
//! Every field has a serde default, so a missing file or a file that only
//! lists peers is valid.  A timeout of `0` means "no bound".

use std::path::{Path, PathBuf};
use std::time::Duration;

use pairlink_core::{PeerIdentifier, ServiceId, ServiceIdError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::connect_to_peer::AttemptConfig;
use crate::infrastructure::adapter::TcpAdapter;

const CONFIG_FILE_NAME: &str = "client.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `service_id` is not a UUID.
    #[error("invalid service_id in config: {0}")]
    InvalidServiceId(#[from] ServiceIdError),
}

/// One `[[peers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerEntry {
    pub name: String,
    /// `host:port` for the TCP adapter.
    pub address: String,
}

impl From<&PeerEntry> for PeerIdentifier {
    fn from(entry: &PeerEntry) -> Self {
        PeerIdentifier::new(entry.name.clone(), entry.address.clone())
    }
}

/// Client configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service identifier, hyphenated UUID text.
    #[serde(default = "default_service_id")]
    pub service_id: String,
    /// Bound on the wait for `$ConAck$`, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Bound on the transport-level connect, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub adapter_enabled: bool,
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
}

fn default_service_id() -> String {
    ServiceId::SERIAL_PORT_PROFILE.to_string()
}
fn default_handshake_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    8_000
}
fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_id: default_service_id(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            adapter_enabled: default_true(),
            peers: Vec::new(),
        }
    }
}

fn millis(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_millis(value))
}

impl ClientConfig {
    /// Parses `service_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServiceId`] if it is not a UUID.
    pub fn service_id(&self) -> Result<ServiceId, ConfigError> {
        Ok(self.service_id.parse::<ServiceId>()?)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        millis(self.handshake_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn known_peers(&self) -> Vec<PeerIdentifier> {
        self.peers.iter().map(PeerIdentifier::from).collect()
    }

    /// Adds a peer, replacing any entry with the same name.
    pub fn add_peer(&mut self, name: impl Into<String>, address: impl Into<String>) {
        let entry = PeerEntry {
            name: name.into(),
            address: address.into(),
        };
        match self.peers.iter_mut().find(|p| p.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.peers.push(entry),
        }
    }

    /// Removes the peer called `name`; `false` if there was none.
    pub fn remove_peer(&mut self, name: &str) -> bool {
        let before = self.peers.len();
        self.peers.retain(|p| p.name != name);
        self.peers.len() != before
    }

    /// Settings for the connection orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServiceId`] if `service_id` is malformed.
    pub fn attempt_config(&self) -> Result<AttemptConfig, ConfigError> {
        Ok(AttemptConfig {
            service_id: self.service_id()?,
            handshake_timeout: self.handshake_timeout(),
        })
    }

    /// A TCP adapter that treats the configured peers as paired.
    pub fn tcp_adapter(&self) -> TcpAdapter {
        TcpAdapter::new(self.known_peers())
            .with_enabled(self.adapter_enabled)
            .with_connect_timeout(self.connect_timeout())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads the config from `path`, or from the platform default when `None`.
/// A missing file yields `ClientConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Ok(ClientConfig::default())
        }
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &ClientConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PairLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pairlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PairLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::application::ports::PlatformAdapter;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("pairlink_test_{}", Uuid::new_v4()))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_default_config_uses_serial_port_profile_and_ten_second_handshake() {
        // Arrange / Act
        let cfg = ClientConfig::default();

        // Assert
        assert_eq!(cfg.service_id().unwrap(), ServiceId::SERIAL_PORT_PROFILE);
        assert_eq!(cfg.handshake_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.connect_timeout(), Some(Duration::from_secs(8)));
        assert!(cfg.adapter_enabled);
        assert!(cfg.peers.is_empty());
    }

    #[test]
    fn test_zero_timeout_disables_the_bound() {
        let cfg = ClientConfig {
            handshake_timeout_ms: 0,
            ..ClientConfig::default()
        };

        assert_eq!(cfg.handshake_timeout(), None);
        assert_eq!(cfg.attempt_config().unwrap().handshake_timeout, None);
    }

    #[test]
    fn test_deserialize_peers_only_uses_defaults_elsewhere() {
        // Arrange
        let toml_str = r#"
[[peers]]
name = "bench"
address = "127.0.0.1:7878"
"#;

        // Act
        let cfg: ClientConfig = toml::from_str(toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg.handshake_timeout_ms, 10_000);
        assert_eq!(
            cfg.known_peers(),
            vec![PeerIdentifier::new("bench", "127.0.0.1:7878")]
        );
    }

    #[test]
    fn test_malformed_service_id_is_a_config_error() {
        let cfg = ClientConfig {
            service_id: "not-a-uuid".to_string(),
            ..ClientConfig::default()
        };

        let err = cfg.attempt_config().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidServiceId(_)));
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let err = load_config(Some(&path)).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = temp_path();

        let cfg = load_config(Some(&path)).unwrap();

        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let path = temp_path();
        let mut cfg = ClientConfig::default();
        cfg.handshake_timeout_ms = 2_500;
        cfg.peers.push(PeerEntry {
            name: "desk".to_string(),
            address: "10.0.0.7:7878".to_string(),
        });

        // Act
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_add_peer_replaces_entry_with_same_name() {
        // Arrange
        let mut cfg = ClientConfig::default();
        cfg.add_peer("desk", "10.0.0.7:7878");

        // Act
        cfg.add_peer("desk", "10.0.0.8:7878");
        cfg.add_peer("lab", "10.0.0.9:7878");

        // Assert
        assert_eq!(
            cfg.known_peers(),
            vec![
                PeerIdentifier::new("desk", "10.0.0.8:7878"),
                PeerIdentifier::new("lab", "10.0.0.9:7878"),
            ]
        );
    }

    #[test]
    fn test_remove_peer_reports_whether_it_existed() {
        let mut cfg = ClientConfig::default();
        cfg.add_peer("desk", "10.0.0.7:7878");

        assert!(cfg.remove_peer("desk"));
        assert!(!cfg.remove_peer("desk"));
        assert!(cfg.peers.is_empty());
    }

    #[test]
    fn test_added_peer_survives_save_and_load() {
        // Arrange
        let path = temp_path();
        let mut cfg = load_config(Some(&path)).unwrap();

        // Act
        cfg.add_peer("bench", "127.0.0.1:7878");
        save_config(&cfg, &path).unwrap();
        let reloaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(
            reloaded.known_peers(),
            vec![PeerIdentifier::new("bench", "127.0.0.1:7878")]
        );
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_tcp_adapter_reflects_enabled_flag_and_peers() {
        let cfg = ClientConfig {
            adapter_enabled: false,
            peers: vec![PeerEntry {
                name: "a".to_string(),
                address: "127.0.0.1:1".to_string(),
            }],
            ..ClientConfig::default()
        };

        let adapter = cfg.tcp_adapter();

        assert!(!adapter.is_enabled());
        assert_eq!(adapter.bonded_peers().len(), 1);
    }

    #[test]
    fn test_config_file_path_ends_with_client_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with(CONFIG_FILE_NAME), "got {path:?}");
        }
        // NoPlatformConfigDir is acceptable in a stripped environment.
    }
}
