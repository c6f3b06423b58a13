//! TTL caches for synthesized audio, provider metadata and configuration.

pub mod store;
pub mod types;


pub use store::CacheStore;
pub use types::*;
