//! Attempt life cycle and the terminal handshake outcome.
//!
//! One connection attempt walks through a small state machine:
//!
//! ```text
//! Idle ──start──> Connecting ──connected──> Handshaking ──$ConAck$──> Succeeded
//!                     │                          │
//!                     └──failed / cancel──> Failed <──cancel──┘
//!                                                │
//!                                 other reply ──> Rejected
//! ```
//!
//! `Succeeded`, `Rejected` and `Failed` are terminal.  The orchestrator
//! returns to `Idle` before it delivers the matching [`HandshakeOutcome`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::peer::PeerIdentifier;

/// Phase of the connection attempt currently owned by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttemptState {
    /// No attempt in flight; a new one may start.
    Idle,
    /// Opening the transport to the peer.
    Connecting,
    /// Transport open; waiting for the peer to acknowledge `$ConReq$`.
    Handshaking,
    /// The peer acknowledged; the connection is live.
    Succeeded,
    /// The peer answered with something other than `$ConAck$`.
    Rejected,
    /// The transport failed or the attempt was cancelled.
    Failed,
}

impl AttemptState {
    /// `true` for `Succeeded`, `Rejected` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Rejected | Self::Failed)
    }

    /// `true` while an attempt owns the transport.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Connecting | Self::Handshaking)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Succeeded => "succeeded",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Why a reachable peer was not accepted as a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The peer replied with a line that is not exactly `$ConAck$`.
    UnexpectedReply(String),
    /// The stream closed, errored, or the read timed out before a reply.
    NoReply,
    /// `$ConReq$` could not be written to the stream.
    RequestNotSent,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedReply(line) => write!(f, "unexpected reply {line:?}"),
            Self::NoReply => f.write_str("no reply before the stream closed or timed out"),
            Self::RequestNotSent => f.write_str("connection request could not be sent"),
        }
    }
}

/// Why an attempt ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The transport could not be opened.
    Transport(String),
    /// The caller cancelled the attempt before it finished.
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(detail) => write!(f, "transport failed: {detail}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Terminal result of one connection attempt.
///
/// Exactly one outcome is produced per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandshakeOutcome {
    /// The peer is a valid server and the connection is open.
    Succeeded { peer: PeerIdentifier },
    /// The peer answered but failed validation; the connection was closed.
    Rejected {
        peer: PeerIdentifier,
        reason: RejectReason,
    },
    /// The transport failed or the attempt was cancelled.
    Failed {
        peer: PeerIdentifier,
        reason: FailureReason,
    },
}

impl HandshakeOutcome {
    /// The peer the attempt targeted.
    pub fn peer(&self) -> &PeerIdentifier {
        match self {
            Self::Succeeded { peer } | Self::Rejected { peer, .. } | Self::Failed { peer, .. } => {
                peer
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// `true` if the attempt ended because the caller cancelled it.
    pub fn was_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                reason: FailureReason::Cancelled,
                ..
            }
        )
    }

    /// The terminal [`AttemptState`] matching this outcome.
    pub fn terminal_state(&self) -> AttemptState {
        match self {
            Self::Succeeded { .. } => AttemptState::Succeeded,
            Self::Rejected { .. } => AttemptState::Rejected,
            Self::Failed { .. } => AttemptState::Failed,
        }
    }
}

impl fmt::Display for HandshakeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { peer } => write!(f, "connected to {peer}"),
            Self::Rejected { peer, reason } => write!(f, "{peer} rejected: {reason}"),
            Self::Failed { peer, reason } => write!(f, "{peer} failed: {reason}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
