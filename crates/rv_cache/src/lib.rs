//! Tag-aware stale-while-revalidate layer for raw upstream responses.
//!
//! [`SwrCache`] wraps any [`Transport`] and is itself a [`Transport`], so a
//! fetcher can sit on top of it without knowing it is there. Entries are
//! keyed by URL and carry the tags and revalidate window of the request that
//! stored them.
//!
//! A fresh entry is served as is. A stale one (older than its window, or
//! carrying a tag invalidated after it was fetched) is still served, and a
//! single background refresh is started for its key. Only 2xx responses are
//! stored, and a zero window bypasses the cache entirely.
//!
//! Invalidation times are kept only for tags that a stored entry or an
//! in-flight origin request carries, so revalidating unknown tags leaves
//! nothing behind.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use rv_core::{FetchFailure, FetchRequest, RawResponse, Transport};
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_MAX_ENTRIES: u64 = 1024;

#[derive(Debug, Clone)]
struct CachedEntry {
    response: RawResponse,
    tags: Arc<[String]>,
    fetched_at: Instant,
    revalidate: Duration,
}

struct Inner {
    origin: Arc<dyn Transport>,
    entries: Cache<String, CachedEntry>,
    tag_epochs: RwLock<HashMap<String, Instant>>,
    in_flight_tags: std::sync::Mutex<HashMap<String, usize>>,
    refreshing: Mutex<HashSet<String>>,
}

/// Counts the tags of an origin request for as long as it is alive.
struct InFlight<'a> {
    counts: &'a std::sync::Mutex<HashMap<String, usize>>,
    tags: &'a [String],
}

impl<'a> InFlight<'a> {
    fn enter(counts: &'a std::sync::Mutex<HashMap<String, usize>>, tags: &'a [String]) -> Self {
        if let Ok(mut counts) = counts.lock() {
            for tag in tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        Self { counts, tags }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut counts) = self.counts.lock() {
            for tag in self.tags {
                if let Some(count) = counts.get_mut(tag) {
                    *count -= 1;
                    if *count == 0 {
                        counts.remove(tag);
                    }
                }
            }
        }
    }
}

impl Inner {
    async fn is_stale(&self, entry: &CachedEntry, now: Instant) -> bool {
        if now.saturating_duration_since(entry.fetched_at) >= entry.revalidate {
            return true;
        }
        let epochs = self.tag_epochs.read().await;
        entry
            .tags
            .iter()
            .filter_map(|tag| epochs.get(tag))
            .any(|invalidated_at| *invalidated_at >= entry.fetched_at)
    }

    /// Goes to the origin and stores the response if it is a success.
    /// The entry is stamped with the time the request started, so an
    /// invalidation racing the request still marks the result stale.
    async fn fetch_and_store(&self, request: &FetchRequest) -> Result<RawResponse, FetchFailure> {
        let _in_flight = InFlight::enter(&self.in_flight_tags, &request.directives.tags);
        let started = Instant::now();
        let response = self.origin.get(request).await?;
        if response.is_success() {
            let entry = CachedEntry {
                response: response.clone(),
                tags: request.directives.tags.clone().into(),
                fetched_at: started,
                revalidate: request.directives.revalidate,
            };
            self.entries.insert(request.url.clone(), entry).await;
        }
        Ok(response)
    }
}

/// Shared handle; clones point at the same store.
#[derive(Clone)]
pub struct SwrCache {
    inner: Arc<Inner>,
}

impl SwrCache {
    pub fn new(origin: Arc<dyn Transport>) -> Self {
        Self::with_capacity(origin, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(origin: Arc<dyn Transport>, max_entries: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                origin,
                entries: Cache::builder().max_capacity(max_entries).build(),
                tag_epochs: RwLock::new(HashMap::new()),
                in_flight_tags: std::sync::Mutex::new(HashMap::new()),
                refreshing: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Marks every entry carrying `tag` stale. Returns how many entries
    /// currently carry it.
    ///
    /// Epochs of tags no longer carried by anything are dropped here.
    pub async fn revalidate_tag(&self, tag: &str) -> usize {
        // in-flight first: a request that finishes meanwhile is already stored
        let mut live: HashSet<String> = match self.inner.in_flight_tags.lock() {
            Ok(counts) => counts.keys().cloned().collect(),
            Err(_) => HashSet::new(),
        };

        self.inner.entries.run_pending_tasks().await;
        let mut affected = 0;
        for (_, entry) in self.inner.entries.iter() {
            if entry.tags.iter().any(|t| t == tag) {
                affected += 1;
            }
            live.extend(entry.tags.iter().cloned());
        }

        let mut epochs = self.inner.tag_epochs.write().await;
        epochs.retain(|t, _| live.contains(t));
        if live.contains(tag) {
            epochs.insert(tag.to_string(), Instant::now());
        }
        drop(epochs);

        tracing::info!(tag, affected, "♻️ revalidated tag");
        affected
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.entries.contains_key(url)
    }

    async fn spawn_refresh(&self, request: FetchRequest) {
        if !self.inner.refreshing.lock().await.insert(request.url.clone()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.fetch_and_store(&request).await {
                Ok(response) if response.is_success() => {
                    tracing::debug!(url = %request.url, "background refresh stored");
                }
                Ok(response) => {
                    tracing::warn!(
                        url = %request.url,
                        status = response.status,
                        "background refresh rejected, keeping stale entry"
                    );
                }
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "background refresh failed, keeping stale entry");
                }
            }
            inner.refreshing.lock().await.remove(&request.url);
        });
    }
}

#[async_trait]
impl Transport for SwrCache {
    async fn get(&self, request: &FetchRequest) -> Result<RawResponse, FetchFailure> {
        if request.directives.revalidate.is_zero() {
            return self.inner.origin.get(request).await;
        }

        if let Some(entry) = self.inner.entries.get(&request.url).await {
            if self.inner.is_stale(&entry, Instant::now()).await {
                tracing::debug!(url = %request.url, "serving stale entry");
                self.spawn_refresh(request.clone()).await;
            }
            return Ok(entry.response);
        }

        self.inner.fetch_and_store(request).await
    }

    fn name(&self) -> &str {
        "swr-cache"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv_core::CacheDirectives;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers `v1`, `v2`, ... and pops scripted statuses (200 once empty).
    struct ScriptedOrigin {
        calls: AtomicUsize,
        statuses: std::sync::Mutex<VecDeque<u16>>,
        delay: Duration,
    }

    impl ScriptedOrigin {
        fn new(statuses: &[u16], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                statuses: std::sync::Mutex::new(statuses.iter().copied().collect()),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedOrigin {
        async fn get(&self, _request: &FetchRequest) -> Result<RawResponse, FetchFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
            if status == 0 {
                return Err(FetchFailure::MissingField("connection"));
            }
            Ok(RawResponse::new(status, format!("v{}", n)))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn request(url: &str, tag: &str, revalidate: Duration) -> FetchRequest {
        FetchRequest {
            url: url.to_string(),
            directives: CacheDirectives::new(tag, revalidate),
        }
    }

    async fn wait_for_calls(origin: &ScriptedOrigin, expected: usize) {
        for _ in 0..200 {
            if origin.calls() >= expected {
                // let the refresh task finish storing
                tokio::time::sleep(Duration::from_millis(20)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("origin saw {} calls, expected {}", origin.calls(), expected);
    }

    fn body(response: &RawResponse) -> &[u8] {
        &response.body[..]
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_origin() {
        let origin = ScriptedOrigin::new(&[], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_secs(60));

        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        assert_eq!(origin.calls(), 1);
        assert!(cache.contains("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_expired_entry_served_stale_then_refreshed() {
        let origin = ScriptedOrigin::new(&[], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_millis(200));

        cache.get(&req).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        wait_for_calls(&origin, 2).await;
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v2");
        assert_eq!(origin.calls(), 2);
    }

    #[tokio::test]
    async fn test_revalidate_tag_marks_only_tagged_entries() {
        let origin = ScriptedOrigin::new(&[], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let wiki = request("https://example.com/wiki", "randomWiki", Duration::from_secs(60));
        let other = request("https://example.com/other", "other", Duration::from_secs(60));

        cache.get(&wiki).await.unwrap();
        cache.get(&other).await.unwrap();
        cache.inner.entries.run_pending_tasks().await;

        assert_eq!(cache.revalidate_tag("randomWiki").await, 1);

        assert_eq!(body(&cache.get(&other).await.unwrap()), b"v2");
        assert_eq!(origin.calls(), 2);

        assert_eq!(body(&cache.get(&wiki).await.unwrap()), b"v1");
        wait_for_calls(&origin, 3).await;
        assert_eq!(body(&cache.get(&wiki).await.unwrap()), b"v3");
        assert_eq!(origin.calls(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tag_affects_nothing() {
        let origin = ScriptedOrigin::new(&[], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_secs(60));

        cache.get(&req).await.unwrap();
        assert_eq!(cache.revalidate_tag("nope").await, 0);
        cache.get(&req).await.unwrap();
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tags_leave_no_epochs() {
        let origin = ScriptedOrigin::new(&[], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_secs(60));

        for i in 0..10_000 {
            assert_eq!(cache.revalidate_tag(&format!("junk{}", i)).await, 0);
        }
        assert!(cache.inner.tag_epochs.read().await.is_empty());

        cache.get(&req).await.unwrap();
        assert_eq!(cache.revalidate_tag("randomWiki").await, 1);
        for i in 0..100 {
            cache.revalidate_tag(&format!("junk{}", i)).await;
        }
        let epochs = cache.inner.tag_epochs.read().await;
        assert_eq!(epochs.len(), 1);
        assert!(epochs.contains_key("randomWiki"));
    }

    #[tokio::test]
    async fn test_revalidate_during_origin_request_marks_result_stale() {
        let origin = ScriptedOrigin::new(&[], Duration::from_millis(100));
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_secs(60));

        let pending = {
            let cache = cache.clone();
            let req = req.clone();
            tokio::spawn(async move { cache.get(&req).await })
        };
        wait_for_calls(&origin, 1).await;
        assert_eq!(cache.revalidate_tag("randomWiki").await, 0);
        assert_eq!(body(&pending.await.unwrap().unwrap()), b"v1");

        // stored copy is stale, so it is served once more and refreshed
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        wait_for_calls(&origin, 2).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v2");
    }

    #[tokio::test]
    async fn test_error_status_not_stored() {
        let origin = ScriptedOrigin::new(&[500], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_secs(60));

        assert_eq!(cache.get(&req).await.unwrap().status, 500);
        assert!(!cache.contains("https://example.com/a"));
        assert_eq!(cache.get(&req).await.unwrap().status, 200);
        assert_eq!(origin.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_revalidate_bypasses_cache() {
        let origin = ScriptedOrigin::new(&[], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::ZERO);

        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v2");
        assert!(!cache.contains("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        // first fetch ok, refresh errors, then a 503
        let origin = ScriptedOrigin::new(&[200, 0, 503], Duration::ZERO);
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_secs(60));

        cache.get(&req).await.unwrap();
        cache.inner.entries.run_pending_tasks().await;
        cache.revalidate_tag("randomWiki").await;

        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        wait_for_calls(&origin, 2).await;
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        wait_for_calls(&origin, 3).await;
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
    }

    #[tokio::test]
    async fn test_concurrent_stale_reads_refresh_once() {
        let origin = ScriptedOrigin::new(&[], Duration::from_millis(100));
        let cache = SwrCache::new(origin.clone());
        let req = request("https://example.com/a", "randomWiki", Duration::from_secs(60));

        cache.get(&req).await.unwrap();
        cache.inner.entries.run_pending_tasks().await;
        cache.revalidate_tag("randomWiki").await;

        for _ in 0..5 {
            assert_eq!(body(&cache.get(&req).await.unwrap()), b"v1");
        }
        wait_for_calls(&origin, 2).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(origin.calls(), 2);
        assert_eq!(body(&cache.get(&req).await.unwrap()), b"v2");
    }
}
