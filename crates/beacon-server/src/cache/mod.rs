//! The peer-aware response cache.
//!
//! Payloads served to clients are cached in two tiers. The read-write tier
//! is size- and TTL-bounded and computes entries on miss (one computation per
//! key, concurrent misses coalesce). The read-only tier is a plain snapshot
//! map that a background ticker reconciles from the read-write tier, so the
//! hot read path never waits on payload generation. Registry changes
//! invalidate read-write entries only; the next reconciler tick observes the
//! difference and propagates it.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use flate2::write::GzEncoder;
use flate2::Compression;
use lru::LruCache;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use beacon_common::{Application, Applications, Result, ServerConfig};

use crate::codec::ServerCodecs;
use crate::registry::RegistrySource;

mod key;

pub use key::{AcceptLevel, ApiVersion, CacheKey, ContentType, EntityType, ALL_APPS, ALL_APPS_DELTA};

/// Read-write tier capacity.
const READ_WRITE_CAPACITY: usize = 1000;

/// A cached payload in uncompressed and gzip form. Both fields are immutable
/// after construction; the gzip form exists only for non-empty payloads.
pub struct CacheValue {
    payload: String,
    gzipped: Option<Vec<u8>>,
}

impl CacheValue {
    fn new(payload: String) -> Self {
        let gzipped = if payload.is_empty() {
            None
        } else {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(payload.as_bytes())
                .ok()
                .and_then(|_| encoder.finish().ok())
        };
        Self { payload, gzipped }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn gzipped(&self) -> Option<&[u8]> {
        self.gzipped.as_deref()
    }
}

struct TtlEntry {
    value: Arc<CacheValue>,
    inserted_at: Instant,
}

impl TtlEntry {
    fn new(value: Arc<CacheValue>) -> Self {
        Self { value, inserted_at: Instant::now() }
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

struct CacheInner {
    registry: Arc<dyn RegistrySource>,
    codecs: ServerCodecs,
    use_read_only: bool,
    auto_expire: Duration,
    read_only: RwLock<HashMap<CacheKey, Arc<CacheValue>>>,
    read_write: Mutex<LruCache<CacheKey, TtlEntry>>,
    /// Per-key locks coalescing concurrent loads.
    loading: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    /// Regionless key → every region-parameterized variant seen, so one
    /// invalidation reaches them all.
    region_keys: StdMutex<HashMap<CacheKey, HashSet<CacheKey>>>,
    version_delta: AtomicU64,
    version_delta_with_regions: AtomicU64,
}

/// The response cache. Owns both tiers and the background reconciler.
pub struct ResponseCache {
    inner: Arc<CacheInner>,
    reconciler: StdMutex<Option<JoinHandle<()>>>,
}

impl ResponseCache {
    pub fn new(registry: Arc<dyn RegistrySource>, codecs: ServerCodecs, config: &ServerConfig) -> Self {
        let inner = Arc::new(CacheInner {
            registry,
            codecs,
            use_read_only: config.use_read_only_response_cache,
            auto_expire: Duration::from_secs(config.response_cache_auto_expiration_seconds),
            read_only: RwLock::new(HashMap::new()),
            read_write: Mutex::new(LruCache::new(
                NonZeroUsize::new(READ_WRITE_CAPACITY).expect("nonzero capacity"),
            )),
            loading: Mutex::new(HashMap::new()),
            region_keys: StdMutex::new(HashMap::new()),
            version_delta: AtomicU64::new(0),
            version_delta_with_regions: AtomicU64::new(0),
        });

        let reconciler = if config.use_read_only_response_cache {
            Some(Self::spawn_reconciler(
                inner.clone(),
                Duration::from_millis(config.response_cache_update_interval_ms),
            ))
        } else {
            None
        };

        Self { inner, reconciler: StdMutex::new(reconciler) }
    }

    fn spawn_reconciler(inner: Arc<CacheInner>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // fires immediately, first pass waits a full period
            loop {
                interval.tick().await;
                inner.reconcile().await;
            }
        })
    }

    /// Cached payload for the key, or `None` for empty payloads ("no data").
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.get_with(key, self.inner.use_read_only).await
    }

    pub(crate) async fn get_with(&self, key: &CacheKey, use_read_only: bool) -> Option<String> {
        let value = self.inner.value(key, use_read_only).await;
        if value.payload.is_empty() {
            None
        } else {
            Some(value.payload.clone())
        }
    }

    /// Compressed payload for the key.
    pub async fn get_gzip(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let value = self.inner.value(key, self.inner.use_read_only).await;
        value.gzipped.clone()
    }

    /// Evicts every read-write entry for the application and the full/delta
    /// snapshots, across all content types, api versions and acceptance
    /// levels, plus the vip/svip keys when given. Each eviction fans out to
    /// region-parameterized siblings. The read-only tier is left to the
    /// reconciler.
    pub async fn invalidate(&self, app_name: &str, vip: Option<&str>, svip: Option<&str>) {
        let mut keys = Vec::new();
        for content in ContentType::ALL {
            for version in ApiVersion::ALL {
                for accept in AcceptLevel::ALL {
                    for name in [app_name, ALL_APPS, ALL_APPS_DELTA] {
                        keys.push(CacheKey::new(EntityType::Application, name, content, version, accept));
                    }
                }
                if let Some(vip) = vip {
                    keys.push(CacheKey::new(EntityType::Vip, vip, content, version, AcceptLevel::Full));
                }
                if let Some(svip) = svip {
                    keys.push(CacheKey::new(EntityType::SVip, svip, content, version, AcceptLevel::Full));
                }
            }
        }
        self.inner.invalidate_keys(&keys).await;
    }

    /// Number of entries currently in the read-write tier.
    pub async fn current_size(&self) -> usize {
        self.inner.read_write.lock().await.len()
    }

    /// Number of delta payload generations so far.
    pub fn version_delta(&self) -> u64 {
        self.inner.version_delta.load(Ordering::SeqCst)
    }

    pub fn version_delta_with_regions(&self) -> u64 {
        self.inner.version_delta_with_regions.load(Ordering::SeqCst)
    }

    /// Stops the background reconciler. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.reconciler.lock().expect("reconciler lock poisoned").take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    async fn read_write_contains(&self, key: &CacheKey) -> bool {
        self.inner.read_write.lock().await.contains(key)
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        self.stop();
    }
}

impl CacheInner {
    async fn value(&self, key: &CacheKey, use_read_only: bool) -> Arc<CacheValue> {
        if use_read_only {
            if let Some(value) = self.read_only.read().await.get(key) {
                return value.clone();
            }
            let value = self.read_write_get(key).await;
            self.read_only.write().await.insert(key.clone(), value.clone());
            value
        } else {
            self.read_write_get(key).await
        }
    }

    /// Read-write lookup with compute-on-miss. Concurrent misses for the same
    /// key serialize on a per-key lock, so the payload is generated once.
    async fn read_write_get(&self, key: &CacheKey) -> Arc<CacheValue> {
        if let Some(value) = self.read_write_lookup(key).await {
            return value;
        }

        let key_lock = {
            let mut loading = self.loading.lock().await;
            loading.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        let _guard = key_lock.lock().await;

        // Another loader may have filled the entry while we waited.
        if let Some(value) = self.read_write_lookup(key).await {
            return value;
        }

        if key.has_regions() {
            self.link_region_key(key);
        }
        let value = Arc::new(self.generate_payload(key).await);
        {
            let mut read_write = self.read_write.lock().await;
            if let Some((evicted_key, _)) = read_write.push(key.clone(), TtlEntry::new(value.clone())) {
                if evicted_key != *key {
                    self.unlink_region_key(&evicted_key);
                }
            }
        }
        self.loading.lock().await.remove(key);
        value
    }

    async fn read_write_lookup(&self, key: &CacheKey) -> Option<Arc<CacheValue>> {
        let mut read_write = self.read_write.lock().await;
        let expired = match read_write.get(key) {
            Some(entry) if entry.expired(self.auto_expire) => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };
        if expired {
            read_write.pop(key);
            drop(read_write);
            self.unlink_region_key(key);
        }
        None
    }

    fn link_region_key(&self, key: &CacheKey) {
        let mut region_keys = self.region_keys.lock().expect("region keys lock poisoned");
        region_keys.entry(key.without_regions()).or_default().insert(key.clone());
    }

    fn unlink_region_key(&self, key: &CacheKey) {
        if !key.has_regions() {
            return;
        }
        let mut region_keys = self.region_keys.lock().expect("region keys lock poisoned");
        if let Some(siblings) = region_keys.get_mut(&key.without_regions()) {
            siblings.remove(key);
            if siblings.is_empty() {
                region_keys.remove(&key.without_regions());
            }
        }
    }

    async fn invalidate_keys(&self, keys: &[CacheKey]) {
        for key in keys {
            debug!(key = ?key, "invalidating response cache key");
            let siblings: Vec<CacheKey> = {
                let region_keys = self.region_keys.lock().expect("region keys lock poisoned");
                region_keys.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default()
            };
            {
                let mut read_write = self.read_write.lock().await;
                read_write.pop(key);
                for sibling in &siblings {
                    read_write.pop(sibling);
                }
            }
            self.region_keys.lock().expect("region keys lock poisoned").remove(key);
        }
    }

    /// Copies read-write values over stale read-only ones. Values are
    /// compared by reference: any regeneration produces a new allocation, so
    /// pointer inequality is exactly "the payload was rebuilt". Last writer
    /// wins against concurrent readers, acceptable for an eventual snapshot.
    async fn reconcile(&self) {
        debug!("updating the read-only cache from the read-write cache");
        let keys: Vec<CacheKey> = self.read_only.read().await.keys().cloned().collect();
        for key in keys {
            let fresh = self.read_write_get(&key).await;
            let current = self.read_only.read().await.get(&key).cloned();
            let stale = match current {
                Some(value) => !Arc::ptr_eq(&value, &fresh),
                None => true,
            };
            if stale {
                self.read_only.write().await.insert(key, fresh);
            }
        }
    }

    /// Payload generation. Loader failures never propagate: they are logged
    /// and produce the empty value, which readers treat as "no data".
    async fn generate_payload(&self, key: &CacheKey) -> CacheValue {
        match self.payload_for(key).await {
            Ok(payload) => CacheValue::new(payload),
            Err(e) => {
                error!(key = ?key, error = %e, "failed to generate payload for cache key");
                CacheValue::new(String::new())
            }
        }
    }

    async fn payload_for(&self, key: &CacheKey) -> Result<String> {
        let encoder = self.codecs.encoder(key.content, key.accept);
        match key.entity {
            EntityType::Application => {
                if key.name == ALL_APPS {
                    let applications = match &key.regions {
                        Some(regions) => self.registry.applications_from_regions(regions).await,
                        None => self.registry.applications().await,
                    };
                    encoder.encode_applications(&applications)
                } else if key.name == ALL_APPS_DELTA {
                    let deltas = match &key.regions {
                        Some(regions) => {
                            self.version_delta_with_regions.fetch_add(1, Ordering::SeqCst);
                            self.registry.application_deltas_from_regions(regions).await
                        }
                        None => {
                            self.version_delta.fetch_add(1, Ordering::SeqCst);
                            self.registry.application_deltas().await
                        }
                    };
                    encoder.encode_applications(&deltas)
                } else {
                    match self.registry.application(&key.name).await {
                        Some(application) => encoder.encode_application(&application),
                        None => Ok(String::new()),
                    }
                }
            }
            EntityType::Vip | EntityType::SVip => {
                let applications = self.applications_for_vip(key).await;
                encoder.encode_applications(&applications)
            }
        }
    }

    /// An `Applications` view holding every instance whose (secure) vip
    /// address list contains the key name, with the reconcile hash recomputed
    /// for the filtered view.
    async fn applications_for_vip(&self, key: &CacheKey) -> Applications {
        let secure = key.entity == EntityType::SVip;
        let registered = self.registry.applications().await;
        let mut filtered = Applications::new();
        for application in &registered.applications {
            let mut matched: Option<Application> = None;
            for instance in &application.instances {
                if instance.serves_vip(&key.name, secure) {
                    matched
                        .get_or_insert_with(|| Application::new(application.name.clone()))
                        .add_instance(instance.clone());
                }
            }
            if let Some(app) = matched {
                filtered.add_application(app);
            }
        }
        filtered.refresh_hash_code();
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use async_trait::async_trait;
    use beacon_common::InstanceInfo;
    use std::sync::atomic::AtomicUsize;

    fn server_config(update_interval_ms: u64) -> ServerConfig {
        ServerConfig {
            response_cache_update_interval_ms: update_interval_ms,
            ..Default::default()
        }
    }

    async fn seeded_registry() -> Arc<InMemoryRegistry> {
        let registry = Arc::new(InMemoryRegistry::new());
        registry
            .register(
                InstanceInfo::new("APP-X", "i-1", "x1.example.net")
                    .with_vip("app-x")
                    .with_secure_vip("app-x-secure"),
            )
            .await;
        registry
            .register(InstanceInfo::new("APP-Y", "i-2", "y1.example.net").with_vip("app-y"))
            .await;
        registry
    }

    fn all_apps_key() -> CacheKey {
        CacheKey::new(EntityType::Application, ALL_APPS, ContentType::Json, ApiVersion::V2, AcceptLevel::Full)
    }

    fn app_key(name: &str) -> CacheKey {
        CacheKey::new(EntityType::Application, name, ContentType::Json, ApiVersion::V2, AcceptLevel::Full)
    }

    #[tokio::test]
    async fn test_full_snapshot_payload() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        let payload = cache.get(&all_apps_key()).await.unwrap();
        let decoded: Applications = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.applications.len(), 2);
        cache.stop();
    }

    #[tokio::test]
    async fn test_missing_application_is_no_data() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        assert!(cache.get(&app_key("NO-SUCH-APP")).await.is_none());
        assert!(cache.get_gzip(&app_key("NO-SUCH-APP")).await.is_none());
        cache.stop();
    }

    #[tokio::test]
    async fn test_gzip_round_trip() {
        use std::io::Read;
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        let payload = cache.get(&all_apps_key()).await.unwrap();
        let gzipped = cache.get_gzip(&all_apps_key()).await.unwrap();

        let mut decoder = flate2::read::GzDecoder::new(&gzipped[..]);
        let mut decompressed = String::new();
        decoder.read_to_string(&mut decompressed).unwrap();
        assert_eq!(decompressed, payload);
        cache.stop();
    }

    #[tokio::test]
    async fn test_vip_key_filters_instances() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        let key = CacheKey::new(EntityType::Vip, "app-x", ContentType::Json, ApiVersion::V2, AcceptLevel::Full);
        let payload = cache.get(&key).await.unwrap();
        let decoded: Applications = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.applications.len(), 1);
        assert_eq!(decoded.applications[0].name, "APP-X");
        assert_eq!(decoded.apps_hash_code, "UP_1_");
        cache.stop();
    }

    #[tokio::test]
    async fn test_secure_vip_key_uses_secure_addresses() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        let secure = CacheKey::new(EntityType::SVip, "app-x-secure", ContentType::Json, ApiVersion::V2, AcceptLevel::Full);
        let matched: Applications = serde_json::from_str(&cache.get(&secure).await.unwrap()).unwrap();
        assert_eq!(matched.instance_count(), 1);

        // An insecure vip name does not match on the secure address list.
        let wrong = CacheKey::new(EntityType::SVip, "app-x", ContentType::Json, ApiVersion::V2, AcceptLevel::Full);
        let unmatched: Applications = serde_json::from_str(&cache.get(&wrong).await.unwrap()).unwrap();
        assert_eq!(unmatched.instance_count(), 0);
        cache.stop();
    }

    #[tokio::test]
    async fn test_delta_generation_bumps_version() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        assert_eq!(cache.version_delta(), 0);
        let delta_key = CacheKey::new(
            EntityType::Application,
            ALL_APPS_DELTA,
            ContentType::Json,
            ApiVersion::V2,
            AcceptLevel::Full,
        );
        cache.get(&delta_key).await;
        assert_eq!(cache.version_delta(), 1);
        assert_eq!(cache.version_delta_with_regions(), 0);

        let regional = delta_key.with_regions(vec!["us-west-2".to_string()]);
        cache.get(&regional).await;
        assert_eq!(cache.version_delta_with_regions(), 1);
        cache.stop();
    }

    struct CountingRegistry {
        inner: Arc<InMemoryRegistry>,
        snapshot_calls: AtomicUsize,
    }

    #[async_trait]
    impl RegistrySource for CountingRegistry {
        async fn applications(&self) -> Applications {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            // Widen the race window so concurrent misses pile up.
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.applications().await
        }

        async fn applications_from_regions(&self, regions: &[String]) -> Applications {
            self.inner.applications_from_regions(regions).await
        }

        async fn application_deltas(&self) -> Applications {
            self.inner.application_deltas().await
        }

        async fn application_deltas_from_regions(&self, regions: &[String]) -> Applications {
            self.inner.application_deltas_from_regions(regions).await
        }

        async fn application(&self, name: &str) -> Option<Application> {
            self.inner.application(name).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_load_once() {
        let counting = Arc::new(CountingRegistry {
            inner: seeded_registry().await,
            snapshot_calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(ResponseCache::new(counting.clone(), ServerCodecs::new(), &server_config(30_000)));

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move { cache.get(&all_apps_key()).await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(counting.snapshot_calls.load(Ordering::SeqCst), 1);
        cache.stop();
    }

    #[tokio::test]
    async fn test_invalidation_closure() {
        let registry = seeded_registry().await;
        let cache = ResponseCache::new(registry.clone(), ServerCodecs::new(), &server_config(30_000));

        let delta_key = CacheKey::new(
            EntityType::Application,
            ALL_APPS_DELTA,
            ContentType::Json,
            ApiVersion::V2,
            AcceptLevel::Full,
        );
        let regional = all_apps_key().with_regions(vec!["us-west-2".to_string()]);
        let vip_key = CacheKey::new(EntityType::Vip, "app-x", ContentType::Json, ApiVersion::V2, AcceptLevel::Full);

        cache.get(&all_apps_key()).await;
        cache.get(&app_key("APP-X")).await;
        cache.get(&delta_key).await;
        cache.get(&regional).await;
        cache.get(&vip_key).await;
        assert_eq!(cache.current_size().await, 5);

        cache.invalidate("APP-X", Some("app-x"), None).await;

        assert!(!cache.read_write_contains(&all_apps_key()).await);
        assert!(!cache.read_write_contains(&app_key("APP-X")).await);
        assert!(!cache.read_write_contains(&delta_key).await);
        assert!(!cache.read_write_contains(&vip_key).await);
        // The region-parameterized sibling went with the regionless key.
        assert!(!cache.read_write_contains(&regional).await);
        assert_eq!(cache.current_size().await, 0);
        cache.stop();
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        cache.get(&all_apps_key()).await;
        cache.invalidate("APP-X", None, None).await;
        cache.invalidate("APP-X", None, None).await;
        assert_eq!(cache.current_size().await, 0);
        cache.stop();
    }

    #[tokio::test]
    async fn test_invalidation_spares_other_applications() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        cache.get(&app_key("APP-X")).await;
        cache.get(&app_key("APP-Y")).await;

        cache.invalidate("APP-X", None, None).await;
        assert!(!cache.read_write_contains(&app_key("APP-X")).await);
        assert!(cache.read_write_contains(&app_key("APP-Y")).await);
        cache.stop();
    }

    #[tokio::test]
    async fn test_reconciler_propagates_invalidation() {
        let registry = seeded_registry().await;
        let cache = ResponseCache::new(registry.clone(), ServerCodecs::new(), &server_config(25));

        // Prime both tiers.
        let before = cache.get(&all_apps_key()).await.unwrap();
        let decoded: Applications = serde_json::from_str(&before).unwrap();
        assert_eq!(decoded.applications.len(), 2);

        // Registry changes, read-write entries are dropped; the read-only
        // tier still serves the stale snapshot until the reconciler runs.
        registry.register(InstanceInfo::new("APP-Z", "i-9", "z1.example.net")).await;
        cache.invalidate("APP-Z", None, None).await;
        assert_eq!(cache.get(&all_apps_key()).await.unwrap(), before);

        tokio::time::sleep(Duration::from_millis(120)).await;
        let after = cache.get(&all_apps_key()).await.unwrap();
        let decoded: Applications = serde_json::from_str(&after).unwrap();
        assert_eq!(decoded.applications.len(), 3);
        cache.stop();
    }

    #[tokio::test]
    async fn test_read_only_disabled_reads_through() {
        let registry = seeded_registry().await;
        let config = ServerConfig { use_read_only_response_cache: false, ..server_config(30_000) };
        let cache = ResponseCache::new(registry.clone(), ServerCodecs::new(), &config);

        let before = cache.get(&all_apps_key()).await.unwrap();
        registry.register(InstanceInfo::new("APP-Z", "i-9", "z1.example.net")).await;
        cache.invalidate("APP-Z", None, None).await;

        // Without the read-only tier the regenerated payload is visible at
        // once.
        let after = cache.get(&all_apps_key()).await.unwrap();
        assert_ne!(before, after);
        cache.stop();
    }

    #[tokio::test]
    async fn test_current_size_tracks_read_write() {
        let cache = ResponseCache::new(seeded_registry().await, ServerCodecs::new(), &server_config(30_000));
        assert_eq!(cache.current_size().await, 0);
        cache.get(&all_apps_key()).await;
        cache.get(&app_key("APP-X")).await;
        assert_eq!(cache.current_size().await, 2);
        cache.stop();
    }
}
