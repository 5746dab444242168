//! pairlink-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does pairlink-client do? (for beginners)
//!
//! The client runs on the device that wants to talk to a PairLink server
//! over a short-range wireless link.  The two devices have already been
//! paired by the operating system; the client only has to pick one of the
//! paired peers and prove that it is really a PairLink server.
//!
//! The client application:
//!
//! 1. Asks the platform adapter whether wireless hardware exists, whether it
//!    is switched on, and which peers are already paired.
//! 2. Opens a stream connection to the peer the user selected, on a
//!    background thread so the caller never blocks.
//! 3. Sends `$ConReq$` and waits (with a timeout) for exactly `$ConAck$`.
//! 4. Reports one outcome: succeeded (the connection stays open for the
//!    host application), rejected (wrong reply, connection closed), or
//!    failed (transport error or cancellation).

/// Application layer: the connection attempt use case and its ports.
pub mod application;

/// Infrastructure layer: platform adapters, transport, config, and UI bridge.
pub mod infrastructure;
