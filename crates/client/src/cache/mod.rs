//! TTL caching for idempotent remote reads.
//!
//! The cache is memory-resident and process-lifetime only; there is no
//! persistence layer. Keys are whatever the caller derives them from; the
//! resilient client uses the canonical serialization of an
//! [`OperationRequest`](crate::client::OperationRequest).

pub mod config;
pub mod core;

pub use config::CacheConfig;
pub use core::TtlCache;
