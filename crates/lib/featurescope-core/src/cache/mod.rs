//! Two-tier cache: an in-process map backed by an optional shared key-value store.
//!
//! The local tier is authoritative for the process and always written. The
//! remote tier is best effort: its failures are logged and reported through
//! return values, never raised from reads.

pub mod manager;
pub mod redis;

use std::{error::Error, fmt, time::Duration};

use async_trait::async_trait;

pub use manager::{
    CacheConfig,
    CacheManager,
    CacheStats,
    ConnectRemoteFn,
    ConnectRemoteFuture,
    RemoteWrite,
    WriteOutcome,
};
pub use redis::{RedisSettings, RedisTier};

/// Failure reported by a remote tier. Never crosses the cache manager boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError(pub String);

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for RemoteError {}

impl From<::redis::RedisError> for RemoteError {
    fn from(err: ::redis::RedisError) -> Self {
        Self(err.to_string())
    }
}

/// Shared key-value store holding JSON text.
#[async_trait]
pub trait RemoteTier: Send + Sync {
    async fn ping(&self) -> Result<(), RemoteError>;

    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError>;

    /// Stores `value`, expiring it after `ttl` when given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), RemoteError>;

    /// Deletes `keys` and returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, RemoteError>;

    /// One page of a cursor scan over keys matching a glob `pattern`.
    /// A returned cursor of 0 ends the scan.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), RemoteError>;

    async fn close(&self) {}
}
