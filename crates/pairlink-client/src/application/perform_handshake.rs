//! The `$ConReq$`/`$ConAck$` exchange over an open transport.
//!
//! The transport is already connected when this runs.  The handshake sends
//! one request, performs one bounded read, and either keeps the connection
//! (success) or closes it (any other reply).  A rejected peer is never left
//! connected.

use std::time::Duration;

use pairlink_core::{evaluate_reply, RejectReason, CONNECTION_REQUEST};
use tracing::{debug, info, warn};

use super::ports::LineTransport;

/// Runs the handshake on `transport`.
///
/// `timeout` bounds the wait for the acknowledgement; `None` waits until the
/// stream closes.  After a successful handshake the read timeout is cleared
/// so the caller receives an unbounded connection.
///
/// # Errors
///
/// Returns the [`RejectReason`] when the peer does not answer with exactly
/// `$ConAck$`.  The transport has been closed by then.
pub fn perform_handshake(
    transport: &dyn LineTransport,
    timeout: Option<Duration>,
) -> Result<(), RejectReason> {
    if timeout.is_some() && !transport.set_read_timeout(timeout) {
        warn!("could not bound the handshake read; waiting without a timeout");
    }

    debug!("sending connection request");
    if !transport.write_line(CONNECTION_REQUEST) {
        warn!("connection request could not be sent");
        transport.close();
        return Err(RejectReason::RequestNotSent);
    }

    let reply = transport.read_line();
    match evaluate_reply(reply.as_deref()) {
        Ok(()) => {
            if timeout.is_some() {
                transport.set_read_timeout(None);
            }
            info!("peer acknowledged the connection request");
            Ok(())
        }
        Err(reason) => {
            warn!(%reason, "peer is not a valid server; closing transport");
            transport.close();
            Err(reason)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
