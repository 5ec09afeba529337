//! Read-through result cache.
//!
//! Entries are grouped by [`Namespace`]. Any mutation that could change a
//! cached read evicts whole namespaces; the TTL bounds staleness for anything
//! an eviction misses.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;

const NAMESPACE_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Tasks,
    TasksByProject,
    TasksByDeveloper,
    TasksSorted,
    OverdueTasks,
    Projects,
    ProjectsPage,
    Developers,
    DevelopersPage,
}

impl Namespace {
    pub const ALL: [Namespace; NAMESPACE_COUNT] = [
        Namespace::Tasks,
        Namespace::TasksByProject,
        Namespace::TasksByDeveloper,
        Namespace::TasksSorted,
        Namespace::OverdueTasks,
        Namespace::Projects,
        Namespace::ProjectsPage,
        Namespace::Developers,
        Namespace::DevelopersPage,
    ];

    /// Every namespace holding task query results.
    pub const TASK_READS: &'static [Namespace] = &[
        Namespace::Tasks,
        Namespace::TasksByProject,
        Namespace::TasksByDeveloper,
        Namespace::TasksSorted,
        Namespace::OverdueTasks,
    ];

    pub const PROJECT_READS: &'static [Namespace] = &[Namespace::Projects, Namespace::ProjectsPage];

    pub const DEVELOPER_READS: &'static [Namespace] =
        &[Namespace::Developers, Namespace::DevelopersPage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Tasks => "tasks-all",
            Namespace::TasksByProject => "tasks-by-project",
            Namespace::TasksByDeveloper => "tasks-by-developer",
            Namespace::TasksSorted => "tasks-sorted",
            Namespace::OverdueTasks => "overdue-tasks",
            Namespace::Projects => "projects",
            Namespace::ProjectsPage => "projects-page",
            Namespace::Developers => "developers",
            Namespace::DevelopersPage => "developers-page",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

pub trait CacheProvider: Send + Sync {
    fn get(&self, namespace: Namespace, key: &str) -> Option<Value>;
    fn put(&self, namespace: Namespace, key: &str, value: Value);
    fn evict_namespace(&self, namespace: Namespace);
    /// Drops expired entries. Lookups never return them either way.
    fn purge_expired(&self) {}
}

/// Process-local cache backed by a [`DashMap`].
pub struct InMemoryCache {
    entries: DashMap<(Namespace, String), (Instant, Value)>,
    ttl: Duration,
}

impl InMemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheProvider for InMemoryCache {
    fn get(&self, namespace: Namespace, key: &str) -> Option<Value> {
        let cache_key = (namespace, key.to_string());
        let entry = self.entries.get(&cache_key)?;
        let (stored_at, value) = entry.value();
        if stored_at.elapsed() < self.ttl {
            return Some(value.clone());
        }
        drop(entry);
        self.entries.remove(&cache_key);
        None
    }

    fn put(&self, namespace: Namespace, key: &str, value: Value) {
        self.entries
            .insert((namespace, key.to_string()), (Instant::now(), value));
    }

    fn evict_namespace(&self, namespace: Namespace) {
        self.entries.retain(|(ns, _), _| *ns != namespace);
    }

    fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
    }
}

/// Cache that stores nothing.
pub struct NoCache;

impl CacheProvider for NoCache {
    fn get(&self, _namespace: Namespace, _key: &str) -> Option<Value> {
        None
    }

    fn put(&self, _namespace: Namespace, _key: &str, _value: Value) {}

    fn evict_namespace(&self, _namespace: Namespace) {}
}

/// Typed front for a [`CacheProvider`].
///
/// Each namespace carries a generation counter bumped on eviction, so a load
/// that started before an eviction does not write its result back. The
/// counter's lock is held across the check and the write, and across the
/// bump and the eviction, so the two cannot interleave.
#[derive(Clone)]
pub struct ResultCache {
    provider: Arc<dyn CacheProvider>,
    generations: Arc<[Mutex<u64>; NAMESPACE_COUNT]>,
}

impl ResultCache {
    pub fn new(provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            provider,
            generations: Arc::new(std::array::from_fn(|_| Mutex::new(0))),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoCache))
    }

    pub fn provider(&self) -> &Arc<dyn CacheProvider> {
        &self.provider
    }

    pub async fn get_or_load<T, F, Fut>(
        &self,
        namespace: Namespace,
        key: &str,
        load: F,
    ) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(cached) = self.provider.get(namespace, key) {
            match serde_json::from_value(cached) {
                Ok(value) => {
                    tracing::trace!(namespace = namespace.as_str(), key, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(
                        namespace = namespace.as_str(),
                        key,
                        "Discarding unreadable cache entry: {e}"
                    );
                }
            }
        }

        let generation = *self.generation(namespace);
        let value = load().await?;

        let json = match serde_json::to_value(&value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(namespace = namespace.as_str(), key, "Result not cached: {e}");
                return Ok(value);
            }
        };
        {
            let current = self.generation(namespace);
            if *current == generation {
                self.provider.put(namespace, key, json);
            }
        }
        Ok(value)
    }

    pub fn evict(&self, namespaces: &[Namespace]) {
        for namespace in namespaces {
            let mut generation = self.generation(*namespace);
            *generation += 1;
            self.provider.evict_namespace(*namespace);
            tracing::trace!(namespace = namespace.as_str(), "cache evicted");
        }
    }

    fn generation(&self, namespace: Namespace) -> MutexGuard<'_, u64> {
        // The guarded section never panics midway, so a poisoned counter is still valid.
        self.generations[namespace.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (Arc<InMemoryCache>, ResultCache) {
        let provider = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        (provider.clone(), ResultCache::new(provider))
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (_, cache) = cache();
        let first: Vec<i64> = cache
            .get_or_load(Namespace::Tasks, "all", || async { Ok(vec![1, 2]) })
            .await
            .unwrap();
        let second: Vec<i64> = cache
            .get_or_load(Namespace::Tasks, "all", || async {
                Err(AppError::Internal("loader ran on a hit".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn eviction_is_scoped_to_namespace() {
        let (provider, cache) = cache();
        let _: i64 = cache
            .get_or_load(Namespace::Tasks, "all", || async { Ok(1) })
            .await
            .unwrap();
        let _: i64 = cache
            .get_or_load(Namespace::Projects, "1", || async { Ok(2) })
            .await
            .unwrap();

        cache.evict(Namespace::TASK_READS);

        assert!(provider.get(Namespace::Tasks, "all").is_none());
        assert!(provider.get(Namespace::Projects, "1").is_some());
    }

    #[tokio::test]
    async fn load_racing_an_eviction_is_not_stored() {
        let (provider, cache) = cache();
        let evicting = cache.clone();
        let _: i64 = cache
            .get_or_load(Namespace::Tasks, "all", || async move {
                evicting.evict(&[Namespace::Tasks]);
                Ok(1)
            })
            .await
            .unwrap();
        assert!(provider.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_eviction_never_leaves_an_older_value() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let (provider, cache) = cache();
        let version = Arc::new(AtomicU64::new(0));

        for _ in 0..200 {
            let reader = {
                let cache = cache.clone();
                let version = version.clone();
                tokio::spawn(async move {
                    let _: u64 = cache
                        .get_or_load(Namespace::Tasks, "all", || async move {
                            let seen = version.load(Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok(seen)
                        })
                        .await
                        .unwrap();
                })
            };
            let writer = {
                let cache = cache.clone();
                let version = version.clone();
                tokio::spawn(async move {
                    version.fetch_add(1, Ordering::SeqCst);
                    cache.evict(&[Namespace::Tasks]);
                })
            };
            reader.await.unwrap();
            writer.await.unwrap();

            if let Some(cached) = provider.get(Namespace::Tasks, "all") {
                assert_eq!(cached, Value::from(version.load(Ordering::SeqCst)));
            }
        }
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let provider = InMemoryCache::new(Duration::ZERO);
        provider.put(Namespace::Tasks, "all", Value::from(1));
        assert!(provider.get(Namespace::Tasks, "all").is_none());
    }
}
