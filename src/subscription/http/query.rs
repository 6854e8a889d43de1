//! Query subscriptions with caching and request deduplication.
//!
//! This module provides the [`Query`] subscription and [`QueryClient`] for managing
//! fetches of a remote resource with built-in caching, similar to SWR or TanStack
//! Query.
//!
//! # Design Pattern: Subscription-based State Management
//!
//! Queries are **subscriptions** that observe a shared cache entry. When you
//! subscribe to a query:
//!
//! 1. The current state of the entry is emitted first
//! 2. If the entry is missing or stale and nothing is in flight, one fetch starts
//! 3. Every later transition of the entry (`Pending`, `Error`, `Success`) is emitted
//!
//! Concurrent subscribers to the same key share a single in-flight fetch. Fetch and
//! validation failures are delivered as [`QueryResult::Error`], never as panics.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use futures::stream::BoxStream;
//! use hello_query::subscription::http::{
//!     ApiConfig, HelloApi, HelloPayload, QueryClient, QueryResult,
//! };
//!
//! # async fn run() {
//! let api = HelloApi::new(ApiConfig::default());
//! let client = Arc::new(QueryClient::new());
//!
//! let mut states: BoxStream<'static, QueryResult<HelloPayload>> =
//!     client.subscribe(HelloApi::query_key(), api.fetcher());
//! while let Some(state) = states.next().await {
//!     match state {
//!         QueryResult::Pending => println!("loading..."),
//!         QueryResult::Error { cause } => println!("error: {cause}"),
//!         QueryResult::Success { value } => println!("message: {}", value.message),
//!     }
//! }
//! # }
//! ```

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::subscription::{SubscriptionId, SubscriptionSource};

use super::cache::{CacheEntry, ErasedEntry, FetchTask};
use super::config::QueryConfig;
use super::key::QueryKey;
use super::schema::{Schema, ValidationError};

/// Performs one fetch attempt: transport plus JSON decoding, without validation.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync>;

/// Error type for query operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("request failed with status {status}")]
    Status { status: StatusCode },

    #[error("request failed: {0}")]
    Network(String),

    #[error("failed to decode response body as JSON: {0}")]
    Decode(String),

    #[error("invalid response payload: {0}")]
    Validation(#[from] ValidationError),

    #[error("fetch aborted: {0}")]
    Aborted(String),
}

/// The observable state of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult<T> {
    /// No data yet: a fetch is in flight or has not started.
    Pending,
    /// The fetch or the validation failed.
    Error {
        /// Human-readable description of the failure.
        cause: String,
    },
    /// Validated data is available.
    Success {
        /// The validated payload.
        value: T,
    },
}

impl<T> QueryResult<T> {
    /// Returns the value if the query succeeded, otherwise `None`.
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value } => Some(value),
            _ => None,
        }
    }

    /// Returns the failure description if the query failed, otherwise `None`.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Error { cause } => Some(cause),
            _ => None,
        }
    }

    /// Returns `true` if the query is waiting for data.
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns `true` if the query succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns `true` if the query failed.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl<T> From<Result<T, QueryError>> for QueryResult<T> {
    fn from(outcome: Result<T, QueryError>) -> Self {
        match outcome {
            Ok(value) => Self::Success { value },
            Err(e) => Self::Error {
                cause: e.to_string(),
            },
        }
    }
}

/// A client owning the query cache.
///
/// The `QueryClient` is the central state manager for queries. It handles:
/// - Caching query results per [`QueryKey`]
/// - Deduplicating fetches so at most one is in flight per key
/// - Broadcasting every state transition to the key's subscribers
/// - Invalidation and refetching
///
/// Cloning a client shares its cache.
///
/// # Example
///
/// ```rust
/// use hello_query::subscription::http::{QueryClient, QueryConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = QueryConfig::new(Duration::from_secs(30)); // stale_time
///
/// let client = Arc::new(QueryClient::with_config(config));
/// assert!(client.is_empty());
/// ```
#[derive(Clone)]
pub struct QueryClient {
    cache: Arc<DashMap<QueryKey, Box<dyn ErasedEntry>>>,
    config: QueryConfig,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.cache.len())
            .field("config", &self.config)
            .finish()
    }
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Subscribes to the query identified by `key`.
    ///
    /// The returned stream starts with the current state of the cache entry and
    /// then yields every transition. The cache is consulted, and a fetch started if
    /// needed, when the stream is first polled.
    pub fn subscribe<V, F>(
        self: &Arc<Self>,
        key: impl Into<QueryKey>,
        fetcher: F,
    ) -> BoxStream<'static, QueryResult<V>>
    where
        V: Schema + Clone + Send + Sync + 'static,
        F: Fn() -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync + 'static,
    {
        Query::new(key, fetcher, Arc::clone(self)).stream()
    }

    /// Invalidates the cache entry for `key`.
    ///
    /// The entry becomes stale, so the next subscriber refetches. If the key has
    /// live subscribers and no fetch in flight, a refetch starts right away.
    ///
    /// Returns `true` if a refetch was started.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let task = {
            let Some(mut slot) = self.cache.get_mut(key) else {
                return false;
            };
            slot.invalidate(self, key)
        };

        debug!(key = %key, refetch = task.is_some(), "query invalidated");
        match task {
            Some(task) => {
                self.spawn_fetch(key, task);
                true
            }
            None => false,
        }
    }

    /// Returns the current state of `key`, if it is cached with payload type `V`.
    #[must_use]
    pub fn state<V>(&self, key: &QueryKey) -> Option<QueryResult<V>>
    where
        V: Clone + 'static,
    {
        self.cache.get(key).and_then(|slot| {
            slot.as_any()
                .downcast_ref::<CacheEntry<V>>()
                .map(|entry| entry.state.clone())
        })
    }

    /// Returns `true` if a fetch for `key` is in flight.
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.cache.get(key).is_some_and(|slot| slot.is_fetching())
    }

    /// Returns the number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Gets the query configuration.
    #[must_use]
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Attaches a subscriber to the entry for `key`, creating the entry and
    /// starting a fetch when needed.
    ///
    /// Returns the current state together with a receiver for later transitions.
    fn attach<V>(
        &self,
        key: &QueryKey,
        fetcher: &Fetcher,
    ) -> Option<(QueryResult<V>, broadcast::Receiver<QueryResult<V>>)>
    where
        V: Schema + Clone + Send + Sync + 'static,
    {
        let (current, rx, task) = {
            let mut slot = self
                .cache
                .entry(key.clone())
                .or_insert_with(|| -> Box<dyn ErasedEntry> {
                    Box::new(CacheEntry::<V>::new(Arc::clone(fetcher)))
                });

            if !slot.as_any().is::<CacheEntry<V>>() {
                warn!(key = %key, "query key reused with another payload type, replacing entry");
                let replacement = CacheEntry::<V>::replacing(Arc::clone(fetcher), &**slot);
                *slot = Box::new(replacement);
            }
            let entry = slot.as_any_mut().downcast_mut::<CacheEntry<V>>()?;
            entry.fetcher = Arc::clone(fetcher);

            let task = if entry.check_staleness(self.config.stale_time) {
                entry
                    .begin()
                    .map(|attempt| self.fetch_task::<V>(key.clone(), attempt, Arc::clone(fetcher)))
            } else {
                None
            };

            // subscribe after `begin` so the new subscriber does not see `Pending` twice
            (entry.state.clone(), entry.subscribe(), task)
        };

        if let Some(task) = task {
            self.spawn_fetch(key, task);
        }
        Some((current, rx))
    }

    /// Builds the task running fetch attempt `attempt` and settling its outcome.
    fn fetch_task<V>(&self, key: QueryKey, attempt: u64, fetcher: Fetcher) -> FetchTask
    where
        V: Schema + Clone + Send + Sync + 'static,
    {
        let client = self.clone();
        let future = async move {
            debug!(key = %key, attempt, "fetch started");
            let outcome = match AssertUnwindSafe(async { fetcher().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(raw)) => V::validate(&raw).map_err(QueryError::from),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(QueryError::Aborted("fetcher panicked".to_string())),
            };
            client.settle(&key, attempt, QueryResult::<V>::from(outcome));
        }
        .boxed();
        FetchTask { attempt, future }
    }

    /// Runs a fetch task on the current runtime.
    ///
    /// Must be called without holding a cache guard.
    fn spawn_fetch(&self, key: &QueryKey, task: FetchTask) {
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task.future);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "no async runtime to run the fetch");
                if let Some(mut slot) = self.cache.get_mut(key) {
                    slot.fail(task.attempt, QueryError::Aborted(e.to_string()).to_string());
                }
            }
        }
    }

    /// Stores the outcome of fetch attempt `attempt` for `key`.
    ///
    /// Outcomes of attempts that no longer hold the key are dropped.
    fn settle<V>(&self, key: &QueryKey, attempt: u64, state: QueryResult<V>)
    where
        V: Schema + Clone + Send + Sync + 'static,
    {
        let failure = state.cause().map(str::to_owned);
        let task = {
            let Some(mut slot) = self.cache.get_mut(key) else {
                return;
            };
            let accepted = slot
                .as_any_mut()
                .downcast_mut::<CacheEntry<V>>()
                .is_some_and(|entry| entry.finish(attempt, state));

            if accepted {
                match &failure {
                    Some(cause) => warn!(key = %key, attempt, cause = %cause, "fetch failed"),
                    None => debug!(key = %key, attempt, "fetch succeeded"),
                }
                None
            } else {
                // superseded, or started for an entry that has since been replaced
                let task = slot.resume(self, key, attempt);
                debug!(
                    key = %key,
                    attempt,
                    refetch = task.is_some(),
                    "dropping result of superseded attempt"
                );
                task
            }
        };

        if let Some(task) = task {
            self.spawn_fetch(key, task);
        }
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ErasedEntry for CacheEntry<V>
where
    V: Schema + Clone + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn is_fetching(&self) -> bool {
        self.in_flight
    }

    fn attempt(&self) -> u64 {
        self.attempt
    }

    fn invalidate(&mut self, client: &QueryClient, key: &QueryKey) -> Option<FetchTask> {
        self.mark_stale();
        if self.subscriber_count() == 0 {
            return None;
        }
        let attempt = self.begin()?;
        Some(client.fetch_task::<V>(key.clone(), attempt, Arc::clone(&self.fetcher)))
    }

    fn resume(&mut self, client: &QueryClient, key: &QueryKey, attempt: u64) -> Option<FetchTask> {
        let attempt = self.restart(attempt)?;
        Some(client.fetch_task::<V>(key.clone(), attempt, Arc::clone(&self.fetcher)))
    }

    fn fail(&mut self, attempt: u64, cause: String) {
        self.finish(attempt, QueryResult::Error { cause });
    }
}

/// A query subscription that observes a cached entry and fetches it when needed.
///
/// `Query` is a subscription that automatically manages data fetching and caching.
/// When subscribed:
///
/// 1. The current state is emitted (`Success` straight from the cache when fresh)
/// 2. If data is missing or stale, a fetch is triggered and `Pending` is emitted
/// 3. The outcome of every fetch for the key is emitted as it settles
///
/// # Example
///
/// ```rust,ignore
/// use hello_query::subscription::{Subscription, http::{Query, QueryClient}};
/// use std::sync::Arc;
///
/// let client = Arc::new(QueryClient::new());
///
/// let query = Subscription::new(Query::<HelloPayload>::new(
///     "rust-hello",
///     api.fetcher(),
///     client.clone(),
/// ))
/// .map(Message::Hello);
/// ```
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher,
    client: Arc<QueryClient>,
    _payload: std::marker::PhantomData<fn() -> V>,
}

impl<V> Query<V>
where
    V: Schema + Clone + Send + Sync + 'static,
{
    /// Creates a new query with the given key, fetcher, and client.
    ///
    /// # Arguments
    ///
    /// * `key` - Identifies this query in the cache
    /// * `fetcher` - Performs the request and JSON decoding; may be called many times
    /// * `client` - The query client owning the cache
    pub fn new<F>(key: impl Into<QueryKey>, fetcher: F, client: Arc<QueryClient>) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            fetcher: Arc::new(fetcher),
            client,
            _payload: std::marker::PhantomData,
        }
    }

    /// Returns the key of this query.
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Schema + Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let key = self.key.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let client = Arc::clone(&self.client);

        stream::once(async move { client.attach::<V>(&key, &fetcher) })
            .flat_map(|attached| match attached {
                Some((current, rx)) => stream::once(future::ready(current))
                    .chain(
                        // a lagging subscriber skips missed transitions
                        BroadcastStream::new(rx).filter_map(|item| future::ready(item.ok())),
                    )
                    .boxed(),
                None => stream::empty().boxed(),
            })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl<V> Hash for Query<V> {
    fn hash<H>(&self, hasher: &mut H)
    where
        H: Hasher,
    {
        self.key.hash(hasher);
    }
}
