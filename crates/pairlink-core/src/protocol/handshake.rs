//! The connection handshake.
//!
//! After the transport is open the client proves it reached a PairLink
//! server with a fixed two-message exchange:
//!
//! ```text
//! Client                     Server
//! ──────                     ──────
//! "$ConReq$\n"  ──────────>
//!               <──────────  "$ConAck$\n"
//! ```
//!
//! Only a byte-exact `$ConAck$` line accepts the peer.  Anything else,
//! including an empty line, a closed stream, or a read timeout, rejects it.
//! There is no retry inside one attempt.

use std::time::Duration;

use crate::domain::outcome::RejectReason;

/// Request token sent by the client.
pub const CONNECTION_REQUEST: &str = "$ConReq$";

/// Acknowledgement token a valid server replies with.
pub const CONNECTION_ACK: &str = "$ConAck$";

/// Upper bound on how long the client waits for the acknowledgement.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Judges the single reply line read after sending [`CONNECTION_REQUEST`].
///
/// `None` means the read produced nothing (stream closed, I/O error, or
/// timeout).
///
/// # Errors
///
/// Returns the [`RejectReason`] when the reply is not exactly
/// [`CONNECTION_ACK`].
///
/// # Examples
///
/// ```rust
/// use pairlink_core::{evaluate_reply, RejectReason};
///
/// assert!(evaluate_reply(Some("$ConAck$")).is_ok());
/// assert_eq!(evaluate_reply(None), Err(RejectReason::NoReply));
/// ```
pub fn evaluate_reply(reply: Option<&str>) -> Result<(), RejectReason> {
    match reply {
        Some(line) if line == CONNECTION_ACK => Ok(()),
        Some(line) => Err(RejectReason::UnexpectedReply(line.to_string())),
        None => Err(RejectReason::NoReply),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
