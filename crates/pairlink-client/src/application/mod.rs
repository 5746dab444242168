//! Application layer use cases for the client application.
//!
//! # What use cases does the client have?
//!
//! - **`connect_to_peer`** – Runs one connection attempt (transport connect,
//!   then handshake) on a background thread, supports cancellation, and
//!   delivers exactly one [`pairlink_core::HandshakeOutcome`].
//!
//! - **`perform_handshake`** – The `$ConReq$`/`$ConAck$` exchange over an
//!   already-open transport.  Closes the transport when the peer fails
//!   validation.
//!
//! - **`query_adapter`** – Read-only questions about the wireless adapter:
//!   is there hardware, is it on, which peers are paired.
//!
//! The traits these use cases depend on live in **`ports`**; the
//! infrastructure layer provides the implementations.

pub mod connect_to_peer;
pub mod perform_handshake;
pub mod ports;
pub mod query_adapter;
