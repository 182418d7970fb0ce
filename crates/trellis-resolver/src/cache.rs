//! Lookup memoization shared across walks.
//!
//! A walk already avoids asking twice for the same range within one graph.
//! `CachedProvider` extends that across graphs and frameworks: wrap a
//! provider once and every walker built on it shares the results.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use trellis_core::framework::TargetFramework;
use trellis_core::library::LibraryRange;

use crate::graph::GraphItem;
use crate::provider::DependencyProvider;

type CacheKey = (LibraryRange, TargetFramework);

/// Memoizes `find_library` per `(range, framework)`, including misses.
pub struct CachedProvider<P: DependencyProvider> {
    inner: P,
    entries: DashMap<CacheKey, Option<GraphItem<P::Item>>>,
    hits: AtomicUsize,
}

impl<P: DependencyProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of cached lookups.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<P: DependencyProvider> DependencyProvider for CachedProvider<P> {
    type Item = P::Item;

    fn find_library(
        &self,
        range: &LibraryRange,
        framework: &TargetFramework,
    ) -> impl Future<Output = Option<GraphItem<P::Item>>> + Send {
        async move {
            let key = (range.clone(), framework.clone());
            let cached = self.entries.get(&key).map(|entry| entry.value().clone());
            if let Some(found) = cached {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("cache hit for {range} ({framework})");
                return found;
            }

            let found = self.inner.find_library(range, framework).await;
            self.entries.insert(key, found.clone());
            found
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use trellis_core::library::LibraryIdentity;
    use trellis_core::version::Version;

    /// Answers every request with version 1.0.0 and counts the calls.
    #[derive(Default)]
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    impl DependencyProvider for CountingProvider {
        type Item = ();

        fn find_library(
            &self,
            range: &LibraryRange,
            _framework: &TargetFramework,
        ) -> impl Future<Output = Option<GraphItem<()>>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let found = (range.name != "missing").then(|| {
                GraphItem::new(
                    LibraryIdentity::package(range.name.clone(), Version::new(1, 0, 0)),
                    Vec::new(),
                    (),
                )
            });
            std::future::ready(found)
        }
    }

    fn range(name: &str) -> LibraryRange {
        LibraryRange::package(name, "1.0").unwrap()
    }

    #[tokio::test]
    async fn repeated_lookup_hits_inner_once() {
        let counting = CountingProvider::default();
        let calls = counting.calls.clone();
        let cache = CachedProvider::new(counting);
        let any = TargetFramework::any();

        let first = cache.find_library(&range("A"), &any).await;
        let second = cache.find_library(&range("A"), &any).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn misses_are_cached_too() {
        let counting = CountingProvider::default();
        let calls = counting.calls.clone();
        let cache = CachedProvider::new(counting);
        let any = TargetFramework::any();

        assert!(cache.find_library(&range("missing"), &any).await.is_none());
        assert!(cache.find_library(&range("missing"), &any).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn frameworks_are_cached_separately() {
        let counting = CountingProvider::default();
        let calls = counting.calls.clone();
        let cache = CachedProvider::new(counting);

        cache.find_library(&range("A"), &TargetFramework::new("net8.0")).await;
        cache.find_library(&range("A"), &TargetFramework::new("NET8.0")).await;
        cache.find_library(&range("A"), &TargetFramework::new("net6.0")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
