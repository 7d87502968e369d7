//! Client-side cache of remote reads.
//!
//! Each distinct QueryKey maps to one Entry holding the last fetched value.
//! Concurrent readers of a stale or empty Entry share a single in-flight fetch.
//! Invalidation marks an Entry stale, and Entries with mounted observers are
//! refetched in the background. The cached value is written only by fetches.

use crate::Error;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;

/// QueryKey identifies a cached read: a resource name and the ids scoping it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub resource: &'static str,
    pub scope: Vec<String>,
}

impl QueryKey {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            scope: Vec::new(),
        }
    }

    pub fn scoped(mut self, id: impl ToString) -> Self {
        self.scope.push(id.to_string());
        self
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resource)?;
        for id in &self.scope {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

type FetchResult<T> = Result<Arc<T>, Arc<anyhow::Error>>;
type InFlight<T> = Shared<BoxFuture<'static, FetchResult<T>>>;
type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Entry is the cached state of one QueryKey.
pub struct Entry<T> {
    key: QueryKey,
    fetcher: Fetcher<T>,
    state: Mutex<State<T>>,
    // Bumped whenever a fetch lands.
    version: watch::Sender<u64>,
    observers: AtomicUsize,
}

struct State<T> {
    data: Option<Arc<T>>,
    error: Option<Arc<anyhow::Error>>,
    stale: bool,
    // Bumped by each invalidation.
    generation: u64,
    in_flight: Option<InFlight<T>>,
    fetches: usize,
}

impl<T: Send + Sync + 'static> Entry<T> {
    fn new(key: QueryKey, fetcher: Fetcher<T>) -> Arc<Self> {
        let (version, _) = watch::channel(0);

        Arc::new(Self {
            key,
            fetcher,
            state: Mutex::new(State {
                data: None,
                error: None,
                stale: true,
                generation: 0,
                in_flight: None,
                fetches: 0,
            }),
            version,
            observers: AtomicUsize::new(0),
        })
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Last fetched value, if any.
    pub fn data(&self) -> Option<Arc<T>> {
        self.state.lock().unwrap().data.clone()
    }

    /// Error of the last fetch, if it failed.
    pub fn error(&self) -> Option<Arc<anyhow::Error>> {
        self.state.lock().unwrap().error.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.state.lock().unwrap().stale
    }

    pub fn is_fetching(&self) -> bool {
        self.state.lock().unwrap().in_flight.is_some()
    }

    /// Number of fetches which have been started.
    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    pub fn observers(&self) -> usize {
        self.observers.load(Ordering::SeqCst)
    }

    /// Read the cached value if it's fresh, or else fetch it,
    /// joining a fetch which is already in flight.
    pub async fn read(self: &Arc<Self>) -> FetchResult<T> {
        let in_flight = {
            let mut state = self.state.lock().unwrap();

            if let (Some(data), false) = (&state.data, state.stale) {
                return Ok(data.clone());
            }
            self.begin(&mut state)
        };
        in_flight.await
    }

    /// Fetch the value regardless of its freshness,
    /// joining a fetch which is already in flight.
    pub async fn refetch(self: &Arc<Self>) -> FetchResult<T> {
        let in_flight = self.begin(&mut self.state.lock().unwrap());
        in_flight.await
    }

    /// Mark the value stale, so that the next read fetches it.
    /// If the Entry is observed, it's refetched in the background.
    pub fn invalidate(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            state.stale = true;
            state.generation += 1;
        }
        let observers = self.observers();
        tracing::debug!(key = %self.key, observers, "invalidated query");

        if observers != 0 {
            self.spawn_refresh();
        }
    }

    fn begin(self: &Arc<Self>, state: &mut State<T>) -> InFlight<T> {
        if let Some(in_flight) = &state.in_flight {
            return in_flight.clone();
        }
        tracing::debug!(key = %self.key, "fetching query");

        let generation = state.generation;
        let fetch = (self.fetcher)();
        // Weak, so that an abandoned fetch doesn't keep its Entry alive.
        let this = Arc::downgrade(self);

        let in_flight = async move {
            let result = fetch.await.map(Arc::new).map_err(Arc::new);

            if let Some(this) = Weak::upgrade(&this) {
                this.land(generation, &result);
            }
            result
        }
        .boxed()
        .shared();

        state.in_flight = Some(in_flight.clone());
        state.fetches += 1;
        in_flight
    }

    fn land(&self, generation: u64, result: &FetchResult<T>) {
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight = None;

            match result {
                Ok(data) => {
                    state.data = Some(data.clone());
                    state.error = None;
                    // An invalidation which arrived mid-fetch leaves the value stale.
                    state.stale = state.generation != generation;
                }
                Err(err) => {
                    tracing::warn!(key = %self.key, ?err, "query fetch failed");
                    state.error = Some(err.clone());
                    state.stale = true;
                }
            }
        }
        self.version.send_modify(|version| *version += 1);
    }

    fn spawn_refresh(self: &Arc<Self>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Arc::clone(self).refresh());
            }
            Err(_) => tracing::debug!(key = %self.key, "no runtime; deferring refetch to next read"),
        }
    }

    // Refetch until the value is fresh, a fetch fails, or there are no observers.
    async fn refresh(self: Arc<Self>) {
        loop {
            let _ = self.read().await;

            let again = {
                let state = self.state.lock().unwrap();
                state.stale && state.error.is_none() && self.observers() != 0
            };
            if !again {
                return;
            }
        }
    }
}

trait AnyEntry: Send + Sync {
    fn mark_stale(self: Arc<Self>);
    fn resource(&self) -> &'static str;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + Sync + 'static> AnyEntry for Entry<T> {
    fn mark_stale(self: Arc<Self>) {
        self.invalidate()
    }
    fn resource(&self) -> &'static str {
        self.key.resource
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// QueryClient is the cache of all Entries, keyed on QueryKey.
/// Clones share the same cache.
#[derive(Clone, Default)]
pub struct QueryClient {
    entries: Arc<Mutex<HashMap<QueryKey, Arc<dyn AnyEntry>>>>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry of `key`, creating it with the `fetch` closure if it doesn't exist.
    /// An existing Entry retains the closure it was created with.
    pub fn entry<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Arc<Entry<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get(&key) {
            match entry.clone().into_any().downcast::<Entry<T>>() {
                Ok(entry) => return entry,
                Err(_) => tracing::error!(%key, "query key was used with another type; replacing it"),
            }
        }

        let fetcher: Fetcher<T> = Arc::new(move || fetch().boxed());
        let entry = Entry::new(key.clone(), fetcher);
        entries.insert(key, entry.clone());

        entry
    }

    /// Invalidate the Entry of `key`, if it exists.
    pub fn invalidate(&self, key: &QueryKey) {
        let entry = self.entries.lock().unwrap().get(key).cloned();

        if let Some(entry) = entry {
            entry.mark_stale();
        }
    }

    /// Invalidate every Entry of `resource`, regardless of scope.
    /// Returns the number of invalidated Entries.
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        let matched: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.resource() == resource)
            .cloned()
            .collect();

        let count = matched.len();
        for entry in matched {
            entry.mark_stale();
        }
        count
    }
}

/// Query is a mounted observer of an Entry. A Query of an unavailable scope
/// is disabled: it never fetches, has no data, and is not loading.
pub struct Query<T> {
    observed: Option<Observed<T>>,
}

struct Observed<T> {
    entry: Arc<Entry<T>>,
    version: watch::Receiver<u64>,
    // Subscriptions and pollers which live as long as this observer.
    guards: Vec<Box<dyn Send + Sync>>,
}

impl<T> Drop for Observed<T> {
    fn drop(&mut self) {
        self.entry.observers.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Send + Sync + 'static> Query<T> {
    pub fn disabled() -> Self {
        Self { observed: None }
    }

    /// Observe the Entry, fetching it in the background if it's empty or stale.
    pub fn observe(entry: Arc<Entry<T>>) -> Self {
        entry.observers.fetch_add(1, Ordering::SeqCst);
        let version = entry.version.subscribe();

        if entry.is_stale() && !entry.is_fetching() {
            entry.spawn_refresh();
        }

        Self {
            observed: Some(Observed {
                entry,
                version,
                guards: Vec::new(),
            }),
        }
    }

    /// Tie the lifetime of `guard` to this observer.
    pub fn attach(&mut self, guard: Box<dyn Send + Sync>) {
        if let Some(observed) = &mut self.observed {
            observed.guards.push(guard);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.observed.is_some()
    }

    pub fn key(&self) -> Option<&QueryKey> {
        self.observed.as_ref().map(|o| o.entry.key())
    }

    pub fn entry(&self) -> Option<&Arc<Entry<T>>> {
        self.observed.as_ref().map(|o| &o.entry)
    }

    /// Current value, or None if the Query is disabled or hasn't yet fetched.
    pub fn data(&self) -> Option<Arc<T>> {
        self.observed.as_ref().and_then(|o| o.entry.data())
    }

    /// True if the Query is enabled and has no value yet.
    /// A failed first fetch remains loading.
    pub fn is_loading(&self) -> bool {
        match &self.observed {
            Some(o) => o.entry.data().is_none(),
            None => false,
        }
    }

    pub fn error(&self) -> Option<Arc<anyhow::Error>> {
        self.observed.as_ref().and_then(|o| o.entry.error())
    }

    /// Wait for the next landed fetch of the observed Entry.
    /// A disabled Query never changes.
    pub async fn changed(&mut self) {
        match &mut self.observed {
            Some(o) => {
                if o.version.changed().await.is_err() {
                    futures::future::pending::<()>().await;
                }
            }
            None => futures::future::pending::<()>().await,
        }
    }
}

impl<T: Default + Send + Sync + 'static> Query<T> {
    /// Read the value, fetching it if it's stale. A disabled Query reads as empty.
    pub async fn read(&self) -> Result<Arc<T>, Error> {
        match &self.observed {
            Some(o) => o.entry.read().await.map_err(Error::RemoteRead),
            None => Ok(Arc::new(T::default())),
        }
    }

    /// Fetch the value from the remote service. A disabled Query reads as empty.
    pub async fn refetch(&self) -> Result<Arc<T>, Error> {
        match &self.observed {
            Some(o) => o.entry.refetch().await.map_err(Error::RemoteRead),
            None => Ok(Arc::new(T::default())),
        }
    }

    /// Current value, or empty if the Query is disabled or hasn't yet fetched.
    pub fn data_or_default(&self) -> Arc<T> {
        self.data().unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    // Entry whose fetches take `latency` and return an incrementing count.
    fn counter(client: &QueryClient, key: QueryKey, latency: Duration) -> Arc<Entry<usize>> {
        let count = Arc::new(AtomicUsize::new(0));

        client.entry(key, move || {
            let count = count.clone();
            async move {
                tokio::time::sleep(latency).await;
                Ok(count.fetch_add(1, Ordering::SeqCst) + 1)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_fetch() {
        let client = QueryClient::new();
        let entry = counter(&client, QueryKey::new("things"), Duration::from_secs(1));

        let (a, b) = tokio::join!(entry.read(), entry.read());
        assert_eq!((*a.unwrap(), *b.unwrap()), (1, 1));
        assert_eq!(entry.fetches(), 1);

        // A fresh value is served from cache.
        assert_eq!(*entry.read().await.unwrap(), 1);
        assert_eq!(entry.fetches(), 1);

        // The same key resolves to the same Entry.
        let again = client.entry(QueryKey::new("things"), || async { Ok(99usize) });
        assert!(Arc::ptr_eq(&entry, &again));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_fetch_is_not_lost() {
        let client = QueryClient::new();
        let entry = counter(&client, QueryKey::new("things"), Duration::from_secs(1));

        let read = tokio::spawn({
            let entry = entry.clone();
            async move { entry.read().await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(entry.is_fetching());

        client.invalidate_resource("things");
        assert_eq!(*read.await.unwrap().unwrap(), 1);

        // The landed value is stale, so the next read fetches again.
        assert!(entry.is_stale());
        assert_eq!(*entry.read().await.unwrap(), 2);
        assert!(!entry.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observed_entries_refetch_on_invalidation() {
        let client = QueryClient::new();
        let observed = counter(&client, QueryKey::new("a").scoped(1), Duration::from_secs(1));
        let unobserved = counter(&client, QueryKey::new("a").scoped(2), Duration::from_secs(1));

        let mut query = Query::observe(observed.clone());
        assert!(query.is_loading());

        query.changed().await;
        assert_eq!(query.data().as_deref(), Some(&1));
        assert_eq!(*unobserved.read().await.unwrap(), 1);

        assert_eq!(client.invalidate_resource("a"), 2);
        query.changed().await;
        assert_eq!(query.data().as_deref(), Some(&2));

        // Without observers, the Entry is only marked stale.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(unobserved.fetches(), 1);
        assert!(unobserved.is_stale());

        drop(query);
        assert_eq!(observed.observers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetches() {
        let client = QueryClient::new();
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));

        let entry = client.entry(QueryKey::new("flaky"), {
            let fail = fail.clone();
            move || {
                let fail = fail.load(Ordering::SeqCst);
                async move {
                    if fail {
                        anyhow::bail!("connection refused")
                    }
                    Ok(vec![1, 2, 3])
                }
            }
        });
        let query = Query::observe(entry.clone());

        let err = query.read().await.unwrap_err();
        assert_eq!(err.to_string(), "remote read failed: connection refused");
        assert!(query.is_loading());
        assert!(query.error().is_some());

        fail.store(false, Ordering::SeqCst);
        assert_eq!(*query.read().await.unwrap(), vec![1, 2, 3]);
        assert!(!query.is_loading());
        assert!(query.error().is_none());
    }

    #[tokio::test]
    async fn test_disabled_query() {
        let query = Query::<Vec<u32>>::disabled();

        assert!(!query.is_loading());
        assert!(!query.is_enabled());
        assert!(query.data().is_none());
        assert!(query.refetch().await.unwrap().is_empty());
    }
}
