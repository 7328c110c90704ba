//! Response body buffers.
//!
//! Streaming large media responses is the dominant per-request cost, so body
//! copies go through fixed-size buffers that are reused across requests and
//! trimmed once the pool has sat idle.

pub mod pool;

pub use pool::{BufferPool, PooledBuffer};
