//! wlfuzz core: wire-level message envelope, fixed-point helpers and the
//! shared error type.
//!
//! This crate carries no transport or runtime dependencies so the proxy, its
//! passes and test tooling can all build envelopes the same way.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed wire data surfaces as `WlFuzzError::ProtocolFormat` so a hostile
//! or buggy peer cannot crash the proxy.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{Result, WlFuzzError};
