use std::any::Any;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use super::key::QueryKey;
use super::query::{Fetcher, QueryClient, QueryResult};

/// Number of transitions buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 16;

/// A cached query with its staleness information and subscriber registry.
pub struct CacheEntry<T> {
    pub state: QueryResult<T>,
    /// When the last fetch attempt settled.
    pub timestamp: Option<Instant>,
    pub is_stale: bool,
    pub in_flight: bool,
    /// Id of the latest fetch attempt; results of other attempts are ignored.
    pub attempt: u64,
    /// The in-flight attempt was started by a replaced entry of another type.
    adopted: bool,
    /// The most recently registered fetcher, used for refetches.
    pub fetcher: Fetcher,
    tx: broadcast::Sender<QueryResult<T>>,
}

impl<T: Clone> CacheEntry<T> {
    /// Creates a pending entry that has never been fetched.
    pub fn new(fetcher: Fetcher) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: QueryResult::Pending,
            timestamp: None,
            is_stale: true,
            in_flight: false,
            attempt: 0,
            adopted: false,
            fetcher,
            tx,
        }
    }

    /// Creates an entry replacing `previous` under the same key.
    ///
    /// An attempt still in flight for `previous` keeps holding the key, so the key
    /// never has two fetches running. Its outcome is not accepted by the new entry;
    /// see [`CacheEntry::restart`].
    pub fn replacing(fetcher: Fetcher, previous: &dyn ErasedEntry) -> Self {
        let mut entry = Self::new(fetcher);
        entry.attempt = previous.attempt();
        entry.in_flight = previous.is_fetching();
        entry.adopted = entry.in_flight;
        entry
    }

    /// Checks if this entry is stale based on the given stale time.
    ///
    /// Only a successful result can be fresh.
    pub fn check_staleness(&mut self, stale_time: Duration) -> bool {
        let expired = self
            .timestamp
            .is_none_or(|timestamp| timestamp.elapsed() >= stale_time);
        if expired || !self.state.is_success() {
            self.is_stale = true;
        }
        self.is_stale
    }

    /// Marks this entry as stale.
    pub const fn mark_stale(&mut self) {
        self.is_stale = true;
    }

    /// Starts a new fetch attempt, resetting the state to `Pending`.
    ///
    /// Returns the attempt id, or `None` if an attempt is already in flight.
    pub fn begin(&mut self) -> Option<u64> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        self.attempt += 1;
        self.adopted = false;
        self.publish(QueryResult::Pending);
        Some(self.attempt)
    }

    /// Hands the in-flight slot from `attempt` to a new attempt without
    /// publishing `Pending` again.
    ///
    /// Returns `None` if `attempt` is not the one in flight.
    pub fn restart(&mut self, attempt: u64) -> Option<u64> {
        if !self.in_flight || self.attempt != attempt {
            return None;
        }
        self.attempt += 1;
        self.adopted = false;
        Some(self.attempt)
    }

    /// Settles `attempt` with `state`.
    ///
    /// Returns `false`, leaving the entry untouched, if `attempt` is not the one
    /// in flight or was adopted from a replaced entry.
    pub fn finish(&mut self, attempt: u64, state: QueryResult<T>) -> bool {
        if !self.in_flight || self.adopted || self.attempt != attempt {
            return false;
        }
        self.update(state);
        true
    }

    /// Stores a settled state and notifies subscribers.
    pub fn update(&mut self, state: QueryResult<T>) {
        self.timestamp = Some(Instant::now());
        self.is_stale = false;
        self.in_flight = false;
        self.publish(state);
    }

    /// Registers a new subscriber for later transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryResult<T>> {
        self.tx.subscribe()
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&mut self, state: QueryResult<T>) {
        self.state = state.clone();
        // no receivers is fine: the state is kept for future subscribers
        let _ = self.tx.send(state);
    }
}

/// Type-erased view of a [`CacheEntry`], so entries of different payload types can
/// share one map.
pub trait ErasedEntry: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn is_fetching(&self) -> bool;

    fn attempt(&self) -> u64;

    /// Marks the entry stale and, if it has subscribers and nothing in flight,
    /// begins a new attempt and returns the fetch task to run.
    fn invalidate(&mut self, client: &QueryClient, key: &QueryKey) -> Option<FetchTask>;

    /// Called when `attempt` settles without being accepted by this entry, because
    /// it was started for a replaced entry. Returns a fetch for this entry if that
    /// attempt was still holding the key.
    fn resume(&mut self, client: &QueryClient, key: &QueryKey, attempt: u64) -> Option<FetchTask>;

    /// Settles `attempt` with an error.
    fn fail(&mut self, attempt: u64, cause: String);
}

/// A fetch attempt ready to be spawned.
pub struct FetchTask {
    pub attempt: u64,
    pub future: BoxFuture<'static, ()>,
}
