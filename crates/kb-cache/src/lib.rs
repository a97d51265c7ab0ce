//! Response caching for the KB gateway.
//!
//! A bounded, TTL-based store keyed by request identity. Entries expire
//! lazily on read; when the store is full, expired entries are dropped first
//! and then the least-used, oldest fifth of the remainder.

pub mod key;
pub mod memory;
pub mod stats;

pub use key::CacheKey;
pub use memory::{CacheEntry, ResponseCache};
pub use stats::CacheStats;
