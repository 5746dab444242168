//! Domain entities for PairLink.
//!
//! This module contains pure types with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code has no imports from OS APIs,
//! network libraries, or UI frameworks, so it can be compiled and tested on
//! any platform.
//!
//! For PairLink the domain is small: the identity of a peer, the identifier
//! of the service we connect to on that peer, and the life cycle of a single
//! connection attempt.

/// Peer and service identifiers.
pub mod peer;

/// Attempt states and the terminal handshake outcome.
pub mod outcome;
