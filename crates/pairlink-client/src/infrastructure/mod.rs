//! Infrastructure layer for the pairing client.
//!
//! Contains the platform-facing adapters and everything outside the use
//! cases: sockets, the line transport, configuration files, and the UI
//! command bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pairlink_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`adapter`** – `PlatformAdapter` implementations: an in-memory mock
//!   with scripted peers, and TCP standing in for the wireless radio.
//!
//! - **`transport`** – `Transport`, the `LineTransport` that owns the single
//!   connection: ordered connect steps, newline framing, and a `close` that
//!   can interrupt blocked I/O from another thread.
//!
//! - **`storage`** – TOML configuration (`client.toml`).
//!
//! - **`ui_bridge`** – async commands exposing adapter status and connection
//!   attempts to a UI front end.

pub mod adapter;
pub mod storage;
pub mod transport;
pub mod ui_bridge;
