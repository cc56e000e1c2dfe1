//! Two-tier cache store.
//!
//! The in-process tier is an LRU map bounded by `max_memory_entries`, with
//! the tag and key indexes kept under the same lock as the entries. The
//! optional remote tier is consulted first while it is healthy; any remote
//! failure flips the store to `Degraded` and requests continue against the
//! local tier until a probe succeeds again. Purges the remote tier could
//! not see while degraded are queued and replayed against it before the
//! store returns to `Ready`, so a recovered remote never serves an entry
//! that was invalidated during the outage.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::error::{CacheInitError, RemoteError};
use super::index::{KeyIndex, TagIndex};
use super::keys::KeyBuilder;
use super::lock::{mutex_guard, read_guard, write_guard};
use super::remote::RemoteTier;

const OWNER: &str = "cache::store";

const METRIC_HIT: &str = "postpilot_cache_hit_total";
const METRIC_MISS: &str = "postpilot_cache_miss_total";
const METRIC_SET: &str = "postpilot_cache_set_total";
const METRIC_DELETE: &str = "postpilot_cache_delete_total";
const METRIC_EVICT: &str = "postpilot_cache_evict_total";
const METRIC_REMOTE_ERROR: &str = "postpilot_cache_remote_error_total";

/// Current layout of [`CacheEntry`]; bumped when cached shapes change.
pub const ENTRY_VERSION: u32 = 1;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}

/// The unit of storage in both tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    /// Creation instant, ms since the Unix epoch.
    pub timestamp: u64,
    /// Milliseconds until the entry is stale.
    pub ttl: u64,
    pub tags: Vec<String>,
    #[serde(default)]
    pub version: u32,
}

impl CacheEntry {
    pub fn new(data: Value, ttl: Duration, tags: Vec<String>) -> Self {
        Self::created_at(data, ttl, tags, now_millis())
    }

    pub fn created_at(data: Value, ttl: Duration, tags: Vec<String>, timestamp: u64) -> Self {
        Self {
            data,
            timestamp,
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            tags,
            version: ENTRY_VERSION,
        }
    }

    /// Valid iff `now - timestamp < ttl`.
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) < self.ttl
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }

    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.ttl)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.div_ceil(1000).max(1)
    }
}

/// Lifecycle of a [`CacheStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Uninitialized,
    Initializing,
    Ready,
    /// Remote tier configured but currently unusable.
    Degraded,
}

/// Point-in-time counters. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Entries resident in the in-process tier.
    pub memory_usage: usize,
    pub remote_connected: bool,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub healthy: bool,
    pub remote_up: bool,
    pub remote_configured: bool,
    pub memory_ok: bool,
    pub state: StoreState,
    pub stats: CacheStats,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

struct LocalTier {
    entries: LruCache<String, CacheEntry>,
    tags: TagIndex,
    keys: KeyIndex,
}

impl LocalTier {
    fn new(config: &CacheConfig) -> Self {
        Self {
            entries: LruCache::new(config.max_memory_entries_non_zero()),
            tags: TagIndex::new(),
            keys: KeyIndex::new(),
        }
    }

    /// Insert and index an entry. Returns the key evicted to make room.
    ///
    /// When the evicted entry still lives in the remote tier its tag
    /// registration is kept so tag invalidation can reach it; the sweep
    /// drops it once the entry's TTL has passed.
    fn insert(&mut self, key: &str, entry: CacheEntry, remote_backed: bool) -> Option<String> {
        self.keys.insert(key);
        self.tags.register(key, &entry.tags, entry.expires_at());

        let (evicted_key, _) = self.entries.push(key.to_string(), entry)?;
        if evicted_key == key {
            return None;
        }
        self.keys.remove(&evicted_key);
        if !remote_backed {
            self.tags.unregister(&evicted_key);
        }
        Some(evicted_key)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.tags.unregister(key);
        self.keys.remove(key);
        self.entries.pop(key).is_some()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.tags.clear();
        self.keys.clear();
    }
}

/// Remote-side purges that could not be applied while the remote tier was
/// unusable.
#[derive(Debug, Default)]
struct PendingPurge {
    /// Set by `clear`; supersedes any keys or patterns queued before it.
    flush: bool,
    patterns: BTreeSet<String>,
    keys: BTreeSet<String>,
}

impl PendingPurge {
    fn is_empty(&self) -> bool {
        !self.flush && self.patterns.is_empty() && self.keys.is_empty()
    }

    fn merge(&mut self, other: PendingPurge) {
        self.flush |= other.flush;
        self.patterns.extend(other.patterns);
        self.keys.extend(other.keys);
    }

    async fn apply(&self, remote: &dyn RemoteTier, prefix: &str) -> Result<u64, RemoteError> {
        if self.flush {
            return remote.flush_prefix(prefix).await;
        }
        let mut keys = self.keys.clone();
        for pattern in &self.patterns {
            keys.extend(remote.keys_by_pattern(pattern).await?);
        }
        if keys.is_empty() {
            return Ok(0);
        }
        remote.delete(&keys.into_iter().collect::<Vec<_>>()).await
    }
}

enum LocalLookup {
    Hit(Value),
    Expired,
    Absent,
}

/// Two-tier cache store. Construct once per process and share via `Arc`.
pub struct CacheStore {
    config: CacheConfig,
    keys: KeyBuilder,
    local: RwLock<LocalTier>,
    remote: Option<Arc<dyn RemoteTier>>,
    state: Mutex<StoreState>,
    pending: Mutex<PendingPurge>,
    counters: Counters,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CacheStore {
    /// Create an uninitialized store. Call [`init`](Self::init) before use
    /// so the remote tier is probed; until then only the local tier serves.
    pub fn new(config: CacheConfig, remote: Option<Arc<dyn RemoteTier>>) -> Self {
        Self {
            keys: KeyBuilder::new(config.key_prefix.clone()),
            local: RwLock::new(LocalTier::new(&config)),
            remote,
            state: Mutex::new(StoreState::Uninitialized),
            pending: Mutex::new(PendingPurge::default()),
            counters: Counters::default(),
            sweeper: Mutex::new(None),
            config,
        }
    }

    /// Probe the remote tier and settle into `Ready` or `Degraded`.
    ///
    /// Only fails when `remote_required` is set and the remote tier is
    /// missing or unreachable.
    pub async fn init(&self) -> Result<(), CacheInitError> {
        self.set_state(StoreState::Initializing);

        let Some(remote) = &self.remote else {
            if self.config.remote_required {
                self.set_state(StoreState::Degraded);
                return Err(CacheInitError::RemoteNotConfigured);
            }
            info!("Cache store ready (in-process tier only)");
            self.set_state(StoreState::Ready);
            return Ok(());
        };

        let lazy = self
            .config
            .remote
            .as_ref()
            .is_some_and(|remote| remote.lazy_connect);
        if lazy {
            info!("Cache store ready (remote tier connects lazily)");
            self.set_state(StoreState::Ready);
            return Ok(());
        }

        match remote.ping().await {
            Ok(()) => {
                info!("Cache store ready (remote tier connected)");
                self.set_state(StoreState::Ready);
                self.replay_pending().await;
                Ok(())
            }
            Err(err) if self.config.remote_required => {
                self.set_state(StoreState::Degraded);
                Err(CacheInitError::RemoteUnreachable(err))
            }
            Err(err) => {
                warn!(error = %err, "Remote cache tier unreachable, serving from in-process tier");
                counter!(METRIC_REMOTE_ERROR, "op" => "init").increment(1);
                self.set_state(StoreState::Degraded);
                Ok(())
            }
        }
    }

    pub fn state(&self) -> StoreState {
        *mutex_guard(&self.state, OWNER, "state")
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn key_builder(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Key for `(identity, scope, params, tags)`.
    pub fn key_for(
        &self,
        identity: &str,
        scope: Option<&str>,
        params: &Value,
        tags: &[String],
    ) -> String {
        self.keys.key(identity, scope, params, tags)
    }

    pub async fn get(&self, identity: &str, params: &Value, tags: &[String]) -> Option<Value> {
        let key = self.key_for(identity, None, params, tags);
        self.get_by_key(&key).await
    }

    pub async fn set(
        &self,
        identity: &str,
        data: Value,
        params: &Value,
        tags: &[String],
        ttl: Option<Duration>,
    ) {
        let key = self.key_for(identity, None, params, tags);
        self.set_by_key(&key, data, tags, ttl).await;
    }

    /// Look up a fully-qualified key. Expired or unreadable entries are
    /// deleted and reported as absent.
    pub async fn get_by_key(&self, key: &str) -> Option<Value> {
        let now = now_millis();

        if let Some(remote) = self.active_remote() {
            match remote.get(key).await {
                Ok(Some(text)) => {
                    match serde_json::from_str::<CacheEntry>(&text) {
                        Ok(entry) if entry.is_valid_at(now) => {
                            self.record_hit("remote");
                            return Some(entry.data);
                        }
                        Ok(_) => {
                            debug!(key = %key, "Remote cache entry expired");
                        }
                        Err(err) => {
                            warn!(key = %key, error = %err, "Discarding unreadable cache entry");
                        }
                    }
                    self.purge_keys(vec![key.to_string()]).await;
                    self.record_miss();
                    return None;
                }
                Ok(None) => {
                    // The shared tier is authoritative while connected.
                    write_guard(&self.local, OWNER, "get.drop_local").remove(key);
                    self.record_miss();
                    return None;
                }
                Err(err) => self.mark_remote_down("get", &err),
            }
        }

        let lookup = {
            let mut local = write_guard(&self.local, OWNER, "get");
            let lookup = match local.entries.get(key) {
                Some(entry) if entry.is_valid_at(now) => LocalLookup::Hit(entry.data.clone()),
                Some(_) => LocalLookup::Expired,
                None => LocalLookup::Absent,
            };
            if matches!(lookup, LocalLookup::Expired) {
                local.remove(key);
                counter!(METRIC_EVICT, "reason" => "expired").increment(1);
            }
            lookup
        };

        match lookup {
            LocalLookup::Hit(data) => {
                self.record_hit("local");
                Some(data)
            }
            LocalLookup::Expired | LocalLookup::Absent => {
                self.record_miss();
                None
            }
        }
    }

    /// Store `data` under a fully-qualified key in both tiers. The remote
    /// write is best-effort.
    pub async fn set_by_key(
        &self,
        key: &str,
        data: Value,
        tags: &[String],
        ttl: Option<Duration>,
    ) {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let entry = CacheEntry::new(data, ttl, tags.to_vec());
        let remote = self.active_remote();

        let payload = match remote {
            Some(_) => match serde_json::to_string(&entry) {
                Ok(payload) => Some((payload, entry.ttl_secs())),
                Err(err) => {
                    warn!(key = %key, error = %err, "Cache entry not serializable, keeping it local");
                    None
                }
            },
            None => None,
        };

        let evicted = write_guard(&self.local, OWNER, "set").insert(key, entry, payload.is_some());
        if let Some(evicted) = evicted {
            debug!(key = %evicted, "Evicted cache entry at capacity");
            counter!(METRIC_EVICT, "reason" => "capacity").increment(1);
        }
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_SET).increment(1);

        match (remote, payload) {
            (Some(remote), Some((payload, ttl_secs))) => {
                if let Err(err) = remote.set_with_expiry(key, ttl_secs, &payload).await {
                    self.mark_remote_down("set", &err);
                    self.defer_remote(|pending| {
                        pending.keys.insert(key.to_string());
                    })
                    .await;
                }
            }
            // The remote tier may still hold an older value for this key.
            _ => {
                self.defer_remote(|pending| {
                    pending.keys.insert(key.to_string());
                })
                .await;
            }
        }
    }

    /// Delete by exact key, by `*` glob, or, when `tags` is non-empty, by
    /// tag (the key argument is then ignored). Keys and globs may omit the
    /// namespace prefix. Returns the number of entries removed; deleting
    /// something already absent returns 0.
    pub async fn delete(&self, key_or_pattern: &str, tags: &[String]) -> u64 {
        if !tags.is_empty() {
            return self.delete_tags(tags).await;
        }

        let target = self.keys.qualify(key_or_pattern);
        if target.contains('*') {
            self.delete_pattern(&target).await
        } else {
            self.purge_keys(vec![target]).await
        }
    }

    /// Primary invalidation entry point: `delete("*", tags)`.
    pub async fn invalidate_by_tags(&self, tags: &[String]) -> u64 {
        self.delete("*", tags).await
    }

    async fn delete_tags(&self, tags: &[String]) -> u64 {
        let keys: HashSet<String> = {
            let mut local = write_guard(&self.local, OWNER, "delete_tags");
            tags.iter().flat_map(|tag| local.tags.take_tag(tag)).collect()
        };
        debug!(tags = ?tags, keys = keys.len(), "Invalidating cache tags");
        self.purge_keys(keys.into_iter().collect()).await
    }

    async fn delete_pattern(&self, pattern: &str) -> u64 {
        let mut keys: BTreeSet<String> = read_guard(&self.local, OWNER, "delete_pattern")
            .keys
            .matching(pattern)
            .into_iter()
            .collect();

        let found = match self.active_remote() {
            Some(remote) => match remote.keys_by_pattern(pattern).await {
                Ok(found) => Some(found),
                Err(err) => {
                    self.mark_remote_down("keys", &err);
                    None
                }
            },
            None => None,
        };
        match found {
            Some(found) => keys.extend(found),
            None => {
                self.defer_remote(|pending| {
                    pending.patterns.insert(pattern.to_string());
                })
                .await;
            }
        }

        self.purge_keys(keys.into_iter().collect()).await
    }

    /// Remove `keys` from both tiers and every index.
    async fn purge_keys(&self, keys: Vec<String>) -> u64 {
        if keys.is_empty() {
            return 0;
        }

        let local_removed = {
            let mut local = write_guard(&self.local, OWNER, "purge");
            keys.iter().filter(|key| local.remove(key)).count() as u64
        };

        let remote_removed = match self.active_remote() {
            Some(remote) => match remote.delete(&keys).await {
                Ok(count) => Some(count),
                Err(err) => {
                    self.mark_remote_down("delete", &err);
                    None
                }
            },
            None => None,
        };
        let remote_removed = match remote_removed {
            Some(count) => count,
            None => {
                self.defer_remote(|pending| pending.keys.extend(keys.iter().cloned()))
                    .await;
                0
            }
        };

        let removed = local_removed.max(remote_removed);
        if removed > 0 {
            self.counters.deletes.fetch_add(removed, Ordering::Relaxed);
            counter!(METRIC_DELETE).increment(removed);
        }
        removed
    }

    /// Flush both tiers and all indexes. Counters are kept.
    pub async fn clear(&self) {
        write_guard(&self.local, OWNER, "clear").clear();

        let flushed = match self.active_remote() {
            Some(remote) => match remote.flush_prefix(self.keys.prefix()).await {
                Ok(removed) => {
                    debug!(removed, "Flushed remote cache namespace");
                    true
                }
                Err(err) => {
                    self.mark_remote_down("clear", &err);
                    false
                }
            },
            None => false,
        };
        if !flushed {
            self.defer_remote(|pending| {
                *pending = PendingPurge {
                    flush: true,
                    ..PendingPurge::default()
                };
            })
            .await;
        }
        info!("Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            memory_usage: self.local_len(),
            remote_connected: self.active_remote().is_some(),
        }
    }

    /// Live health report. Pings the remote tier when one is configured;
    /// having no remote tier is healthy, an unreachable one is not.
    pub async fn health(&self) -> CacheHealth {
        let remote_configured = self.remote.is_some();
        let remote_up = match &self.remote {
            Some(remote) => match remote.ping().await {
                Ok(()) => self.mark_remote_up().await,
                Err(err) => {
                    self.mark_remote_down("ping", &err);
                    false
                }
            },
            None => false,
        };
        let memory_ok = self.local_len() < self.config.max_memory_entries;

        CacheHealth {
            healthy: memory_ok && (!remote_configured || remote_up),
            remote_up,
            remote_configured,
            memory_ok,
            state: self.state(),
            stats: self.stats(),
        }
    }

    /// Evict expired local entries and stale tag registrations.
    pub fn sweep_expired(&self) -> usize {
        let now = now_millis();
        let mut local = write_guard(&self.local, OWNER, "sweep");

        let expired: Vec<String> = local
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_valid_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            local.remove(key);
        }
        let orphaned = local.tags.purge_expired(now);
        drop(local);

        if !expired.is_empty() {
            counter!(METRIC_EVICT, "reason" => "expired").increment(expired.len() as u64);
        }
        if !expired.is_empty() || !orphaned.is_empty() {
            debug!(
                expired = expired.len(),
                orphaned = orphaned.len(),
                "Cache sweep complete"
            );
        }
        expired.len()
    }

    /// Spawn the periodic sweep. The task also re-probes a degraded remote
    /// tier so the store returns to `Ready` without a restart.
    pub fn start_sweeper(self: &Arc<Self>) {
        let store = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.sweep_expired();
                store.probe_remote().await;
            }
        });

        if let Some(previous) = mutex_guard(&self.sweeper, OWNER, "start_sweeper").replace(handle) {
            previous.abort();
        }
    }

    /// Stop the sweep and release the remote tier.
    pub async fn shutdown(&self) {
        let handle = mutex_guard(&self.sweeper, OWNER, "shutdown").take();
        if let Some(handle) = handle {
            handle.abort();
        }
        if let Some(remote) = &self.remote {
            remote.close().await;
        }
        self.set_state(StoreState::Uninitialized);
        info!("Cache store shut down");
    }

    pub fn local_len(&self) -> usize {
        read_guard(&self.local, OWNER, "local_len").entries.len()
    }

    /// Whether any key is currently registered under `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        read_guard(&self.local, OWNER, "has_tag").tags.contains_tag(tag)
    }

    async fn probe_remote(&self) {
        if self.state() != StoreState::Degraded {
            return;
        }
        if let Some(remote) = &self.remote
            && remote.ping().await.is_ok()
        {
            self.mark_remote_up().await;
        }
    }

    /// Queue a remote-side purge the remote tier could not take. If the
    /// store recovered meanwhile, the queue is flushed at once.
    async fn defer_remote(&self, update: impl FnOnce(&mut PendingPurge)) {
        if self.remote.is_none() {
            return;
        }
        update(&mut *mutex_guard(&self.pending, OWNER, "defer"));
        if self.state() == StoreState::Ready {
            self.replay_pending().await;
        }
    }

    /// Apply queued purges to the remote tier. On failure the work is
    /// re-queued and `false` is returned.
    async fn replay_pending(&self) -> bool {
        let Some(remote) = &self.remote else {
            return true;
        };
        let pending = std::mem::take(&mut *mutex_guard(&self.pending, OWNER, "replay"));
        if pending.is_empty() {
            return true;
        }

        match pending.apply(remote.as_ref(), self.keys.prefix()).await {
            Ok(removed) => {
                info!(
                    removed,
                    flush = pending.flush,
                    keys = pending.keys.len(),
                    patterns = pending.patterns.len(),
                    "Replayed cache purges deferred during remote outage"
                );
                true
            }
            Err(err) => {
                mutex_guard(&self.pending, OWNER, "replay.requeue").merge(pending);
                self.mark_remote_down("replay", &err);
                false
            }
        }
    }

    fn active_remote(&self) -> Option<&Arc<dyn RemoteTier>> {
        match self.state() {
            StoreState::Ready => self.remote.as_ref(),
            _ => None,
        }
    }

    fn set_state(&self, next: StoreState) {
        *mutex_guard(&self.state, OWNER, "set_state") = next;
    }

    fn mark_remote_down(&self, op: &'static str, err: &RemoteError) {
        counter!(METRIC_REMOTE_ERROR, "op" => op).increment(1);
        let mut state = mutex_guard(&self.state, OWNER, "mark_remote_down");
        if *state == StoreState::Ready {
            *state = StoreState::Degraded;
            warn!(op, error = %err, "Remote cache tier failed, degrading to in-process tier");
        } else {
            debug!(op, error = %err, "Remote cache tier still unavailable");
        }
    }

    /// Return a degraded store to `Ready` after a successful ping. Deferred
    /// purges are replayed first so no remote read can observe an entry
    /// invalidated during the outage. Returns whether the remote tier is
    /// usable.
    async fn mark_remote_up(&self) -> bool {
        if self.remote.is_none() || self.state() != StoreState::Degraded {
            return true;
        }
        if !self.replay_pending().await {
            return false;
        }
        {
            let mut state = mutex_guard(&self.state, OWNER, "mark_remote_up");
            if *state != StoreState::Degraded {
                return *state == StoreState::Ready;
            }
            *state = StoreState::Ready;
            info!("Remote cache tier recovered");
        }
        // Purges queued between the replay and the transition.
        self.replay_pending().await
    }

    fn record_hit(&self, tier: &'static str) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_HIT, "tier" => tier).increment(1);
    }

    fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_MISS).increment(1);
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if let Some(handle) = mutex_guard(&self.sweeper, OWNER, "drop").take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::cache::index::glob_matches;

    #[derive(Default)]
    struct FlakyRemote {
        values: Mutex<HashMap<String, String>>,
        down: AtomicBool,
    }

    impl FlakyRemote {
        fn check(&self) -> Result<(), RemoteError> {
            if self.down.load(Ordering::SeqCst) {
                Err(RemoteError::connection("connection refused"))
            } else {
                Ok(())
            }
        }

        fn raw_put(&self, key: &str, value: &str) {
            self.values
                .lock()
                .expect("remote map")
                .insert(key.to_string(), value.to_string());
        }
    }

    #[async_trait]
    impl RemoteTier for FlakyRemote {
        async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
            self.check()?;
            Ok(self.values.lock().expect("remote map").get(key).cloned())
        }

        async fn set_with_expiry(
            &self,
            key: &str,
            _ttl_secs: u64,
            value: &str,
        ) -> Result<(), RemoteError> {
            self.check()?;
            self.raw_put(key, value);
            Ok(())
        }

        async fn delete(&self, keys: &[String]) -> Result<u64, RemoteError> {
            self.check()?;
            let mut values = self.values.lock().expect("remote map");
            Ok(keys.iter().filter(|key| values.remove(*key).is_some()).count() as u64)
        }

        async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
            self.check()?;
            Ok(self
                .values
                .lock()
                .expect("remote map")
                .keys()
                .filter(|key| glob_matches(pattern, key))
                .cloned()
                .collect())
        }

        async fn ping(&self) -> Result<(), RemoteError> {
            self.check()
        }

        async fn close(&self) {}
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    async fn local_store(config: CacheConfig) -> CacheStore {
        let store = CacheStore::new(config, None);
        store.init().await.expect("local init");
        store
    }

    async fn remote_store() -> (CacheStore, Arc<FlakyRemote>) {
        let remote = Arc::new(FlakyRemote::default());
        let store = CacheStore::new(CacheConfig::default(), Some(remote.clone()));
        store.init().await.expect("remote init");
        (store, remote)
    }

    #[test]
    fn entry_validity_boundary() {
        let entry = CacheEntry::created_at(json!(1), Duration::from_millis(100), vec![], 1_000);
        assert!(entry.is_valid_at(1_000));
        assert!(entry.is_valid_at(1_099));
        assert!(!entry.is_valid_at(1_100));
        assert_eq!(entry.expires_at(), 1_100);
        assert_eq!(entry.version, ENTRY_VERSION);
    }

    #[tokio::test]
    async fn set_then_get_round_trips_locally() {
        let store = local_store(CacheConfig::default()).await;
        store
            .set("q", json!({"n": 1}), &json!({"id": 1}), &tags(&["user"]), None)
            .await;

        assert_eq!(
            store.get("q", &json!({"id": 1}), &tags(&["user"])).await,
            Some(json!({"n": 1}))
        );
        assert_eq!(store.get("q", &json!({"id": 2}), &tags(&["user"])).await, None);

        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
        assert_eq!(stats.memory_usage, 1);
        assert!(!stats.remote_connected);
    }

    #[tokio::test]
    async fn expired_entry_is_removed_on_read() {
        let store = local_store(CacheConfig::default()).await;
        store
            .set("q", json!(1), &json!({}), &tags(&["t"]), Some(Duration::from_millis(1)))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.get("q", &json!({}), &tags(&["t"])).await, None);
        assert_eq!(store.local_len(), 0);
        assert!(!store.has_tag("t"));
    }

    #[tokio::test]
    async fn capacity_eviction_unindexes_local_only_entries() {
        let store = local_store(CacheConfig {
            max_memory_entries: 1,
            ..Default::default()
        })
        .await;
        store.set("a", json!(1), &json!({}), &tags(&["first"]), None).await;
        store.set("b", json!(2), &json!({}), &tags(&["second"]), None).await;

        assert_eq!(store.local_len(), 1);
        assert!(!store.has_tag("first"));
        assert!(store.has_tag("second"));
        assert!(!store.health().await.memory_ok);
    }

    #[tokio::test]
    async fn pattern_delete_targets_identity_prefix() {
        let store = local_store(CacheConfig::default()).await;
        store.set("user.profile", json!(1), &json!({"id": 1}), &[], None).await;
        store.set("user.dashboard", json!(2), &json!({"id": 1}), &[], None).await;
        store.set("blog.posts", json!(3), &json!({}), &[], None).await;

        assert_eq!(store.delete("user.*", &[]).await, 2);
        assert_eq!(store.local_len(), 1);
        assert_eq!(store.delete("user.*", &[]).await, 0);
    }

    #[tokio::test]
    async fn sweep_evicts_expired_entries() {
        let store = local_store(CacheConfig::default()).await;
        store
            .set("short", json!(1), &json!({}), &tags(&["t"]), Some(Duration::from_millis(1)))
            .await;
        store.set("long", json!(2), &json!({}), &tags(&["t"]), None).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.local_len(), 1);
        assert!(store.has_tag("t"));
    }

    #[tokio::test]
    async fn remote_tier_is_read_first_when_connected() {
        let (store, remote) = remote_store().await;
        let key = store.key_for("q", None, &json!({}), &[]);
        let entry = CacheEntry::new(json!("from-remote"), Duration::from_secs(60), vec![]);
        remote.raw_put(&key, &serde_json::to_string(&entry).expect("entry json"));

        assert_eq!(store.get_by_key(&key).await, Some(json!("from-remote")));
        assert!(store.stats().remote_connected);
    }

    #[tokio::test]
    async fn corrupt_remote_entry_is_a_miss_and_deleted() {
        let (store, remote) = remote_store().await;
        let key = store.key_for("q", None, &json!({}), &[]);
        remote.raw_put(&key, "{not json");

        assert_eq!(store.get_by_key(&key).await, None);
        assert!(remote.values.lock().expect("remote map").is_empty());
        assert_eq!(store.stats().misses, 1);
    }

    #[tokio::test]
    async fn remote_failure_degrades_and_recovers() {
        let (store, remote) = remote_store().await;
        store.set("q", json!(7), &json!({}), &[], None).await;

        remote.down.store(true, Ordering::SeqCst);
        assert_eq!(store.get("q", &json!({}), &[]).await, Some(json!(7)));
        assert_eq!(store.state(), StoreState::Degraded);

        let health = store.health().await;
        assert!(!health.remote_up);
        assert!(!health.healthy);

        remote.down.store(false, Ordering::SeqCst);
        store.probe_remote().await;
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[tokio::test]
    async fn required_remote_missing_fails_init() {
        let store = CacheStore::new(
            CacheConfig {
                remote_required: true,
                ..Default::default()
            },
            None,
        );
        assert!(matches!(
            store.init().await,
            Err(CacheInitError::RemoteNotConfigured)
        ));
    }

    #[tokio::test]
    async fn clear_flushes_both_tiers() {
        let (store, remote) = remote_store().await;
        store.set("a", json!(1), &json!({}), &tags(&["t"]), None).await;
        store.set("b", json!(2), &json!({}), &[], None).await;
        remote.raw_put("other-app:key", "1");

        store.clear().await;
        assert_eq!(store.local_len(), 0);
        assert!(!store.has_tag("t"));
        let remaining = remote.values.lock().expect("remote map").len();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn shutdown_returns_to_uninitialized() {
        let store = Arc::new(local_store(CacheConfig::default()).await);
        store.start_sweeper();
        store.shutdown().await;
        assert_eq!(store.state(), StoreState::Uninitialized);
    }

    #[tokio::test]
    async fn purges_during_outage_are_replayed_before_recovery() {
        let (store, remote) = remote_store().await;
        let params = json!({"id": 1});
        store
            .set("q", json!("old"), &params, &tags(&["user"]), None)
            .await;

        remote.down.store(true, Ordering::SeqCst);
        assert_eq!(store.invalidate_by_tags(&tags(&["user"])).await, 1);
        assert_eq!(store.state(), StoreState::Degraded);

        remote.down.store(false, Ordering::SeqCst);
        store.probe_remote().await;
        assert_eq!(store.state(), StoreState::Ready);
        assert!(remote.values.lock().expect("remote map").is_empty());
        assert_eq!(store.get("q", &params, &tags(&["user"])).await, None);
    }

    #[tokio::test]
    async fn writes_during_outage_hide_older_remote_values() {
        let (store, remote) = remote_store().await;
        store.set("q", json!(1), &json!({}), &[], None).await;

        remote.down.store(true, Ordering::SeqCst);
        assert_eq!(store.get("q", &json!({}), &[]).await, Some(json!(1)));
        store.set("q", json!(2), &json!({}), &[], None).await;

        remote.down.store(false, Ordering::SeqCst);
        let health = store.health().await;
        assert!(health.remote_up);
        assert_eq!(health.state, StoreState::Ready);
        assert_ne!(store.get("q", &json!({}), &[]).await, Some(json!(1)));
    }

    #[tokio::test]
    async fn clear_during_outage_flushes_namespace_on_recovery() {
        let (store, remote) = remote_store().await;
        store.set("a", json!(1), &json!({}), &[], None).await;
        store.set("b", json!(2), &json!({}), &[], None).await;
        remote.raw_put("other-app:key", "1");

        remote.down.store(true, Ordering::SeqCst);
        store.clear().await;
        assert_eq!(store.get("a", &json!({}), &[]).await, None);

        remote.down.store(false, Ordering::SeqCst);
        store.probe_remote().await;
        let remaining: Vec<String> = remote
            .values
            .lock()
            .expect("remote map")
            .keys()
            .cloned()
            .collect();
        assert_eq!(remaining, vec!["other-app:key".to_string()]);
    }

    #[tokio::test]
    async fn recovery_waits_for_a_successful_ping() {
        let (store, remote) = remote_store().await;
        store.set("q", json!(1), &json!({}), &tags(&["t"]), None).await;

        remote.down.store(true, Ordering::SeqCst);
        store.invalidate_by_tags(&tags(&["t"])).await;
        store.probe_remote().await;
        assert_eq!(store.state(), StoreState::Degraded);

        remote.down.store(false, Ordering::SeqCst);
        store.probe_remote().await;
        assert_eq!(store.state(), StoreState::Ready);
        assert!(remote.values.lock().expect("remote map").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_entries_in_background() {
        let store = Arc::new(
            local_store(CacheConfig {
                sweep_interval: Duration::from_secs(1),
                ..Default::default()
            })
            .await,
        );
        store
            .set(
                "q",
                json!(1),
                &json!({}),
                &tags(&["user"]),
                Some(Duration::from_millis(1)),
            )
            .await;
        store
            .set("fresh", json!(2), &json!({}), &tags(&["other"]), None)
            .await;
        // Entry timestamps follow the wall clock, not the paused runtime.
        std::thread::sleep(Duration::from_millis(5));

        store.start_sweeper();
        assert_eq!(store.local_len(), 2);

        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert_eq!(store.local_len(), 1);
        assert!(!store.has_tag("user"));
        assert!(store.has_tag("other"));
        assert_eq!(store.stats().misses, 0);
        store.shutdown().await;
    }
}
