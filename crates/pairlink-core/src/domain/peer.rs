//! Peer identity and the well-known service identifier.
//!
//! A [`PeerIdentifier`] is handed out by the platform pairing subsystem (the
//! list of already-paired devices) and consumed by the transport when it
//! opens a connection.  It is immutable: the client never edits a peer, it
//! only picks one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A previously-paired remote device.
///
/// `name` is the human-readable label shown in pickers; `address` is the
/// stable hardware address (a MAC address on real radios, `host:port` for
/// the TCP test adapter).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentifier {
    name: String,
    address: String,
}

impl PeerIdentifier {
    /// Creates a peer identifier from its display name and hardware address.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Human-readable device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable hardware address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns `true` if `query` names this peer.
    ///
    /// Addresses compare case-insensitively (`AA:BB` and `aa:bb` are the same
    /// radio); names compare exactly.
    pub fn matches(&self, query: &str) -> bool {
        self.name == query || self.address.eq_ignore_ascii_case(query)
    }
}

impl fmt::Display for PeerIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Error returned when a service identifier string is not a valid UUID.
#[derive(Debug, Error, PartialEq)]
#[error("malformed service identifier {input:?}: {reason}")]
pub struct ServiceIdError {
    pub input: String,
    pub reason: String,
}

/// The fixed, well-known identifier of the PairLink service on a peer.
///
/// All valid servers advertise the same identifier.  The default is the
/// Serial Port Profile UUID, which is what RFCOMM servers on paired devices
/// listen on out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    /// `00001101-0000-1000-8000-00805f9b34fb`
    pub const SERIAL_PORT_PROFILE: ServiceId =
        ServiceId(Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb));

    /// Wraps an already-parsed UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self::SERIAL_PORT_PROFILE
    }
}

impl FromStr for ServiceId {
    type Err = ServiceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ServiceIdError {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_display_shows_name_and_address() {
        let peer = PeerIdentifier::new("Bike Server", "00:11:22:33:44:55");
        assert_eq!(peer.to_string(), "Bike Server (00:11:22:33:44:55)");
    }

    #[test]
    fn test_peer_matches_address_case_insensitively() {
        // Arrange
        let peer = PeerIdentifier::new("Bike Server", "AA:BB:CC:DD:EE:FF");

        // Act / Assert
        assert!(peer.matches("aa:bb:cc:dd:ee:ff"));
        assert!(peer.matches("Bike Server"));
        assert!(!peer.matches("bike server"), "names compare exactly");
        assert!(!peer.matches("11:22:33:44:55:66"));
    }

    #[test]
    fn test_service_id_default_is_serial_port_profile() {
        assert_eq!(
            ServiceId::default().to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_service_id_parses_uppercase_uuid() {
        let id: ServiceId = "00001101-0000-1000-8000-00805F9B34FB".parse().unwrap();
        assert_eq!(id, ServiceId::SERIAL_PORT_PROFILE);
    }

    #[test]
    fn test_service_id_rejects_malformed_input() {
        // Act
        let result = "not-a-uuid".parse::<ServiceId>();

        // Assert
        let err = result.unwrap_err();
        assert_eq!(err.input, "not-a-uuid");
        assert!(err.to_string().contains("malformed service identifier"));
    }

    #[test]
    fn test_peer_identifier_serializes_name_and_address() {
        let peer = PeerIdentifier::new("kitchen", "127.0.0.1:9000");
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(json, r#"{"name":"kitchen","address":"127.0.0.1:9000"}"#);
    }
}
