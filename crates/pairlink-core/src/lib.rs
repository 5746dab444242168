//! # pairlink-core
//!
//! Shared library for PairLink containing the domain types and the
//! connection handshake protocol.
//!
//! This crate is used by the client application and by test servers.
//! It has zero dependencies on OS APIs, wireless stacks, or sockets.
//!
//! # Architecture overview (for beginners)
//!
//! PairLink lets a device connect to a previously-paired short-range wireless
//! peer (the "server") and confirm, with a tiny text handshake, that the peer
//! really is a PairLink server before the connection is handed to the host
//! application.
//!
//! This crate (`pairlink-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – The vocabulary of a connection attempt: who the peer is
//!   ([`PeerIdentifier`]), which service on the peer we want ([`ServiceId`]),
//!   which phase the attempt is in ([`AttemptState`]), and how it ended
//!   ([`HandshakeOutcome`]).
//!
//! - **`protocol`** – How text travels over the stream.  Every record is a
//!   single newline-terminated line, and exactly two tokens exist:
//!   `$ConReq$` (client → server) and `$ConAck$` (server → client).

pub mod domain;
pub mod protocol;

pub use domain::outcome::{AttemptState, FailureReason, HandshakeOutcome, RejectReason};
pub use domain::peer::{PeerIdentifier, ServiceId, ServiceIdError};
pub use protocol::handshake::{
    evaluate_reply, CONNECTION_ACK, CONNECTION_REQUEST, DEFAULT_HANDSHAKE_TIMEOUT,
};
pub use protocol::line::{decode_line, encode_line, ProtocolError};
