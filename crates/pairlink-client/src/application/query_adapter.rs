//! AdapterCapabilities: read-only questions about the wireless adapter.
//!
//! Every answer is queried live from the platform; nothing is cached, and
//! no query changes adapter or connection state.  Missing hardware and a
//! switched-off adapter are ordinary answers (`false` / empty list), never
//! errors.

use std::sync::Arc;

use pairlink_core::PeerIdentifier;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ports::PlatformAdapter;

/// One-shot snapshot of the adapter, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub has_hardware: bool,
    pub enabled: bool,
}

/// The Query Adapter use case.
#[derive(Clone)]
pub struct AdapterCapabilities {
    adapter: Arc<dyn PlatformAdapter>,
}

impl AdapterCapabilities {
    pub fn new(adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self { adapter }
    }

    /// `true` if short-range wireless hardware exists.
    pub fn has_hardware(&self) -> bool {
        self.adapter.has_hardware()
    }

    /// `true` if the hardware exists and is switched on.
    pub fn is_enabled(&self) -> bool {
        self.has_hardware() && self.adapter.is_enabled()
    }

    /// Already-paired peers; empty when the hardware is missing or off.
    pub fn list_known_peers(&self) -> Vec<PeerIdentifier> {
        if !self.is_enabled() {
            debug!("adapter missing or disabled; reporting no known peers");
            return Vec::new();
        }
        self.adapter.bonded_peers()
    }

    pub fn snapshot(&self) -> AdapterStatus {
        AdapterStatus {
            has_hardware: self.has_hardware(),
            enabled: self.is_enabled(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
