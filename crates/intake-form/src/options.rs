//! Options resolution with per-session memoization
//!
//! Fields whose `options_ref` is a reference string get their selectable
//! values from an injected [`OptionsResolver`]. [`OptionsCache`] wraps the
//! resolver in a moka cache so that:
//! - a settled ref is never resolved again within the session,
//! - concurrent requests for the same ref share one in-flight resolution.
//!
//! Failed resolutions are not cached; the next request retries.

use async_trait::async_trait;
use intake_schema::SelectOption;
use moka::future::Cache;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Resolved, shared option list
pub type OptionList = Arc<Vec<SelectOption>>;

/// Resolves an options ref to its ordered list of choices
///
/// Transport is the implementor's concern; the engine imposes no timeout.
#[async_trait]
pub trait OptionsResolver: Send + Sync {
    /// Resolver failure, returned unchanged to callers
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolve `reference` to its options
    async fn resolve(&self, reference: &str) -> Result<Vec<SelectOption>, Self::Error>;
}

/// Memoizing front for an [`OptionsResolver`]
pub struct OptionsCache<R> {
    resolver: R,
    inner: Cache<String, OptionList>,
}

impl<R: OptionsResolver> OptionsCache<R> {
    /// Create cache holding at most `max_capacity` refs
    #[inline]
    #[must_use]
    pub fn new(resolver: R, max_capacity: u64) -> Self {
        Self {
            resolver,
            inner: Cache::new(max_capacity),
        }
    }

    /// Resolve `reference`, memoizing the settled list and the in-flight future
    ///
    /// # Errors
    /// Returns the resolver's error, shared by every caller that waited on the
    /// same resolution.
    pub async fn resolve(&self, reference: &str) -> Result<OptionList, Arc<R::Error>> {
        self.inner
            .try_get_with(reference.to_string(), async {
                tracing::debug!("Resolving options ref: {}", reference);
                let options = self.resolver.resolve(reference).await?;
                tracing::debug!("Resolved options ref {} ({} options)", reference, options.len());
                Ok::<_, R::Error>(Arc::new(options))
            })
            .await
    }

    /// Get an already-settled list without triggering resolution
    #[inline]
    pub async fn get(&self, reference: &str) -> Option<OptionList> {
        self.inner.get(reference).await
    }

    /// Check if a ref has settled
    #[inline]
    pub async fn contains(&self, reference: &str) -> bool {
        self.inner.get(reference).await.is_some()
    }

    /// Get the wrapped resolver
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

impl<R> Debug for OptionsCache<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsCache")
            .field("entry_count", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}

/// Resolver backed by a fixed table, for offline use
#[derive(Debug, Clone, Default)]
pub struct StaticOptionsResolver {
    table: HashMap<String, Vec<SelectOption>>,
}

impl StaticOptionsResolver {
    /// Create an empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With options for a ref
    #[inline]
    #[must_use]
    pub fn with(mut self, reference: impl Into<String>, options: Vec<SelectOption>) -> Self {
        self.table.insert(reference.into(), options);
        self
    }

    /// Number of refs in the table
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the table has no refs
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl From<HashMap<String, Vec<SelectOption>>> for StaticOptionsResolver {
    fn from(table: HashMap<String, Vec<SelectOption>>) -> Self {
        Self { table }
    }
}

/// Ref missing from a [`StaticOptionsResolver`] table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown options ref: '{0}'")]
pub struct UnknownOptionsRef(pub String);

#[async_trait]
impl OptionsResolver for StaticOptionsResolver {
    type Error = UnknownOptionsRef;

    async fn resolve(&self, reference: &str) -> Result<Vec<SelectOption>, Self::Error> {
        self.table
            .get(reference)
            .cloned()
            .ok_or_else(|| UnknownOptionsRef(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct SlowResolver {
        calls: AtomicUsize,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("resolver offline")]
    struct Offline;

    #[async_trait]
    impl OptionsResolver for SlowResolver {
        type Error = Offline;

        async fn resolve(&self, reference: &str) -> Result<Vec<SelectOption>, Self::Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if reference == "flaky" && call == 0 {
                return Err(Offline);
            }
            Ok(vec![SelectOption::new(reference, reference.to_uppercase())])
        }
    }

    #[tokio::test]
    async fn settled_ref_is_memoized() {
        let cache = OptionsCache::new(SlowResolver::default(), 100);

        let first = cache.resolve("status").await.unwrap();
        let second = cache.resolve("status").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.resolver().calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains("status").await);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_resolution() {
        let cache = OptionsCache::new(SlowResolver::default(), 100);

        let (a, b) = tokio::join!(cache.resolve("status"), cache.resolve("status"));

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(cache.resolver().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_refs_resolve_separately() {
        let cache = OptionsCache::new(SlowResolver::default(), 100);

        let (a, b) = tokio::join!(cache.resolve("a"), cache.resolve("b"));

        assert_eq!(a.unwrap()[0].label, "A");
        assert_eq!(b.unwrap()[0].label, "B");
        assert_eq!(cache.resolver().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = OptionsCache::new(SlowResolver::default(), 100);

        let err = cache.resolve("flaky").await.unwrap_err();
        assert_eq!(err.to_string(), "resolver offline");
        assert!(cache.get("flaky").await.is_none());

        let retried = cache.resolve("flaky").await.unwrap();
        assert_eq!(retried[0].label, "FLAKY");
        assert_eq!(cache.resolver().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn static_resolver_lookup() {
        let resolver = StaticOptionsResolver::new()
            .with("marital_status", vec![SelectOption::new("single", "Single")]);

        assert_eq!(resolver.len(), 1);
        assert_eq!(
            resolver.resolve("marital_status").await.unwrap(),
            vec![SelectOption::new("single", "Single")]
        );
        assert_eq!(
            resolver.resolve("missing").await.unwrap_err(),
            UnknownOptionsRef("missing".to_string())
        );
    }
}
