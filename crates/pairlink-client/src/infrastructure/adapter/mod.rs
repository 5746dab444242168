//! Platform adapters: implementations of the `PlatformAdapter` port.
//!
//! - [`mock`]: scripted in-memory peers, for tests and dry runs.
//! - [`tcp`]: TCP sockets standing in for the wireless radio.

pub mod mock;
pub mod tcp;

pub use mock::{Behaviour, ConnectStep, MockAdapter, MockSocket};
pub use tcp::{TcpAdapter, TcpPeerSocket};
