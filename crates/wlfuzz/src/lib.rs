//! Top-level facade crate for wlfuzz.
//!
//! Re-exports the wire types and the proxy library so users can depend on a single crate.

pub mod core {
    pub use wlfuzz_core::*;
}

pub mod proxy {
    pub use wlfuzz_proxy::*;
}
