use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{RemoteError, RemoteTier};
use crate::error::{ServerError, ServerResult};

pub type ConnectRemoteFuture =
    Pin<Box<dyn Future<Output = Result<Arc<dyn RemoteTier>, RemoteError>> + Send + 'static>>;
/// Opens a remote tier. Called by `CacheManager::connect`.
pub type ConnectRemoteFn = Arc<dyn Fn() -> ConnectRemoteFuture + Send + Sync + 'static>;

const DEFAULT_SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct CacheConfig {
    connect_remote: Option<ConnectRemoteFn>,
    scan_batch: usize,
}

impl CacheConfig {
    /// Local tier only.
    #[must_use]
    pub fn memory_only() -> Self {
        Self {
            connect_remote: None,
            scan_batch: DEFAULT_SCAN_BATCH,
        }
    }

    #[must_use]
    pub fn with_remote(mut self, connect: ConnectRemoteFn) -> Self {
        self.connect_remote = Some(connect);
        self
    }

    #[must_use]
    pub const fn with_scan_batch(mut self, scan_batch: usize) -> Self {
        self.scan_batch = scan_batch;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::memory_only()
    }
}

/// Fate of the remote write attempted by `CacheManager::set_detailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteWrite {
    /// Remote tier not connected.
    Skipped,
    Stored,
    /// Remote write failed; the local tier still holds the value.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub remote: RemoteWrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_cache_size: usize,
    pub redis_connected: bool,
}

/// Local map in front of an optional remote tier.
///
/// Reads consult local then remote, promoting remote hits. Writes go to both
/// tiers. Remote failures degrade the manager to local-only behavior.
pub struct CacheManager {
    local: RwLock<HashMap<String, Value>>,
    remote: tokio::sync::RwLock<Option<Arc<dyn RemoteTier>>>,
    connected: AtomicBool,
    config: CacheConfig,
}

impl CacheManager {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            remote: tokio::sync::RwLock::new(None),
            connected: AtomicBool::new(false),
            config,
        }
    }

    /// Attempts to open the remote tier. Never fails: on error the manager
    /// stays local-only. Repeated calls while connected do nothing.
    pub async fn connect(&self) {
        let mut remote = self.remote.write().await;
        if remote.is_some() && self.connected.load(Ordering::Acquire) {
            return;
        }
        let Some(connect) = self.config.connect_remote.clone() else {
            info!("no remote cache configured, using memory cache only");
            return;
        };

        match connect().await {
            Ok(tier) => match tier.ping().await {
                Ok(()) => {
                    *remote = Some(tier);
                    self.connected.store(true, Ordering::Release);
                    info!("remote cache connection established");
                }
                Err(err) => {
                    self.connected.store(false, Ordering::Release);
                    warn!("remote cache ping failed, using memory cache only: {err}");
                }
            },
            Err(err) => {
                self.connected.store(false, Ordering::Release);
                warn!("remote cache unavailable, using memory cache only: {err}");
            }
        }
    }

    pub async fn disconnect(&self) {
        let tier = self.remote.write().await.take();
        self.connected.store(false, Ordering::Release);
        if let Some(tier) = tier {
            tier.close().await;
            info!("remote cache connection closed");
        }
    }

    #[must_use]
    pub fn is_remote_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Looks `key` up in the local tier, then the remote tier. A remote hit is
    /// copied into the local tier. Any remote failure reads as a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let local_hit = self.read_local().get(key).cloned();
        if let Some(value) = local_hit {
            debug!(key, "cache hit (memory)");
            return Some(value);
        }

        if let Some(tier) = self.remote_tier().await {
            match tier.get(key).await {
                Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        debug!(key, "cache hit (remote)");
                        self.write_local().insert(key.to_string(), value.clone());
                        return Some(value);
                    }
                    Err(err) => error!(key, "remote cache entry is not valid JSON: {err}"),
                },
                Ok(None) => {}
                Err(err) => error!(key, "remote cache get failed: {err}"),
            }
        }

        debug!(key, "cache miss");
        None
    }

    /// `get` decoded into `T`. An entry of the wrong shape reads as a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(key, "cached entry has unexpected shape: {err}");
                None
            }
        }
    }

    /// Stores `value` in both tiers and reports whether the remote write landed.
    /// `ttl` bounds the remote entry only; zero means no expiry.
    ///
    /// # Errors
    /// Returns `ServerError::Cache` if `value` cannot be encoded as JSON. Nothing
    /// is written in that case.
    pub async fn set_detailed<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> ServerResult<WriteOutcome> {
        let value = serde_json::to_value(value)
            .map_err(|err| ServerError::Cache(format!("failed to encode value for {key}: {err}")))?;
        let encoded = value.to_string();
        self.write_local().insert(key.to_string(), value);

        let remote = match self.remote_tier().await {
            None => RemoteWrite::Skipped,
            Some(tier) => {
                let ttl = ttl.filter(|ttl| !ttl.is_zero());
                match tier.set(key, &encoded, ttl).await {
                    Ok(()) => {
                        debug!(key, ttl = ?ttl, "cached value in remote tier");
                        RemoteWrite::Stored
                    }
                    Err(err) => {
                        error!(key, "remote cache set failed: {err}");
                        RemoteWrite::Failed
                    }
                }
            }
        };
        Ok(WriteOutcome { remote })
    }

    /// Stores `value`; false only when a connected remote tier rejected it.
    ///
    /// # Errors
    /// Returns `ServerError::Cache` if `value` cannot be encoded as JSON.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> ServerResult<bool> {
        let outcome = self.set_detailed(key, value, ttl).await?;
        Ok(outcome.remote != RemoteWrite::Failed)
    }

    /// Removes `key` from both tiers. A missing key is not an error; false
    /// only when a connected remote tier failed the delete.
    pub async fn delete(&self, key: &str) -> bool {
        self.write_local().remove(key);

        let Some(tier) = self.remote_tier().await else {
            return true;
        };
        match tier.delete(&[key.to_string()]).await {
            Ok(_) => {
                debug!(key, "deleted from remote tier");
                true
            }
            Err(err) => {
                error!(key, "remote cache delete failed: {err}");
                false
            }
        }
    }

    /// Removes every key containing `pattern` as a literal substring from both
    /// tiers. The count sums removals per tier, so a key held in both counts twice.
    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        let local_removed = {
            let mut local = self.write_local();
            let before = local.len();
            local.retain(|key, _| !key.contains(pattern));
            (before - local.len()) as u64
        };
        debug!(pattern, local_removed, "cleared local cache entries");

        let Some(tier) = self.remote_tier().await else {
            return local_removed;
        };
        let glob = format!("*{}*", escape_glob(pattern));
        let mut cursor = 0;
        let mut removed = local_removed;
        loop {
            let (next, keys) = match tier.scan(cursor, &glob, self.config.scan_batch).await {
                Ok(page) => page,
                Err(err) => {
                    error!(pattern, "remote cache scan failed: {err}");
                    return removed;
                }
            };
            match tier.delete(&keys).await {
                Ok(count) => removed += count,
                Err(err) => {
                    error!(pattern, "remote cache delete failed: {err}");
                    return removed;
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        info!(pattern, removed, "cleared cache entries");
        removed
    }

    pub fn clear_memory_cache(&self) {
        self.write_local().clear();
        info!("memory cache cleared");
    }

    #[must_use]
    pub fn get_cache_stats(&self) -> CacheStats {
        CacheStats {
            memory_cache_size: self.read_local().len(),
            redis_connected: self.is_remote_connected(),
        }
    }

    async fn remote_tier(&self) -> Option<Arc<dyn RemoteTier>> {
        if !self.is_remote_connected() {
            return None;
        }
        self.remote.read().await.clone()
    }

    fn read_local(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.local
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_local(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.local
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Escapes glob metacharacters so `pattern` matches literally in a remote scan.
#[must_use]
pub fn escape_glob(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
