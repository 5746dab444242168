//! Port traits: the boundary between the use cases and the platform.
//!
//! ```text
//!   PlatformAdapter ──creates──▶ PeerSocket
//!          ▲                         ▲
//!          │                         │ wraps
//!   AdapterCapabilities        Transport (LineTransport) ◀── ConnectionOrchestrator
//! ```
//!
//! The platform pairing subsystem is injected as an `Arc<dyn PlatformAdapter>`
//! rather than reached through a process-wide singleton, so tests can swap
//! in the mock adapter and the TCP adapter can stand in for a real radio.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use pairlink_core::{PeerIdentifier, ServiceId};
use thiserror::Error;

/// A stream socket to one peer, allocated but not necessarily connected.
///
/// Mirrors the life cycle of an RFCOMM socket: the read and write channels
/// can be derived before `connect`, and `close` may be called from any
/// thread to unblock a pending `connect` or read.
pub trait PeerSocket: Send + Sync {
    /// Derives the write channel.
    fn output_stream(&self) -> io::Result<Box<dyn Write + Send>>;

    /// Derives the read channel.
    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Performs the transport-level connect.  Blocking; may take seconds.
    fn connect(&self) -> io::Result<()>;

    /// Releases the socket.  Idempotent.
    fn close(&self) -> io::Result<()>;

    /// Bounds how long a read on the input stream may block.  `None` waits
    /// forever.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

/// The platform's pairing/discovery subsystem.
///
/// Only three things are ever asked of it beyond capability queries: list
/// the already-paired peers, stop an in-progress discovery, and allocate a
/// socket for a peer.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformAdapter: Send + Sync {
    /// `true` if short-range wireless hardware exists on this device.
    fn has_hardware(&self) -> bool;

    /// `true` if the hardware is currently switched on.
    fn is_enabled(&self) -> bool;

    /// Peers the platform has already paired with.
    fn bonded_peers(&self) -> Vec<PeerIdentifier>;

    /// Stops any in-progress peer discovery.  Discovery and connection cannot
    /// share the radio.
    fn cancel_discovery(&self);

    /// Allocates a socket bound to `service_id` on `peer`.
    fn create_socket(
        &self,
        peer: &PeerIdentifier,
        service_id: &ServiceId,
    ) -> io::Result<Arc<dyn PeerSocket>>;
}

/// Error type for [`LineTransport::connect`].
///
/// Callers only need to know that the transport failed; the variant records
/// which connect step broke, for the logs.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be allocated (bad identifier, adapter off, ...).
    #[error("could not allocate a socket for {peer}: {source}")]
    SocketUnavailable {
        peer: PeerIdentifier,
        #[source]
        source: io::Error,
    },
    /// The write channel could not be derived from the socket.
    #[error("could not open the write channel: {0}")]
    OutputUnavailable(#[source] io::Error),
    /// The read channel could not be derived from the socket.
    #[error("could not open the read channel: {0}")]
    InputUnavailable(#[source] io::Error),
    /// The transport-level connect failed.
    #[error("could not connect to {peer}: {source}")]
    ConnectFailed {
        peer: PeerIdentifier,
        #[source]
        source: io::Error,
    },
    /// `close()` tore the socket down while the connect was in progress.
    #[error("transport closed while connecting")]
    Closed,
}

/// A newline-delimited text connection to at most one peer.
///
/// `read_line` and `write_line` deliberately never return errors: a failed
/// read is `None` and a failed write is `false`, which ends the attempt in
/// progress without being fatal to the caller.
pub trait LineTransport: Send + Sync {
    /// Opens the connection.  Blocking; never call it from a UI thread.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if any connect step fails.  Everything
    /// allocated by earlier steps has been released by then.
    fn connect(&self, peer: &PeerIdentifier, service_id: &ServiceId) -> Result<(), TransportError>;

    /// Blocks until one line arrives.  `None` if not connected, on end of
    /// stream, on I/O error, or on read timeout.
    fn read_line(&self) -> Option<String>;

    /// Sends `text` plus the line terminator and flushes.  `false` if not
    /// connected or the write failed.
    fn write_line(&self, text: &str) -> bool;

    /// Best-effort teardown.  Safe to call repeatedly, from any thread, and
    /// while another thread is blocked in `connect` or `read_line`.
    fn close(&self);

    /// Bounds the blocking read of the live connection.  `false` if not
    /// connected or the platform refused the timeout.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> bool;

    /// `true` while a connection is open.
    fn is_connected(&self) -> bool;

    /// The peer of the open connection, if any.
    fn connected_peer(&self) -> Option<PeerIdentifier>;
}
