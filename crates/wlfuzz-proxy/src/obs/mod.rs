//! In-process observability.
//!
//! Counters and a route-duration histogram, rendered in Prometheus text
//! format and logged when a session ends.

pub mod metrics;
