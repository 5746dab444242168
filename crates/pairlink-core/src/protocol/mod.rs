//! Protocol module: line framing and the connection handshake tokens.

pub mod handshake;
pub mod line;

pub use handshake::{evaluate_reply, CONNECTION_ACK, CONNECTION_REQUEST, DEFAULT_HANDSHAKE_TIMEOUT};
pub use line::{decode_line, encode_line, ProtocolError, LINE_TERMINATOR};
