//! Infrastructure event bus implementations.
//!
//! The exchange abstraction and the in-memory bus live in `jobmesh-events`.
//! This module provides the Redis Streams transport.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{DEFAULT_STREAM_KEY, RedisStreamsError, RedisStreamsEventBus};
