//! Subscriptions: long-lived sources of values observed by a consumer.
//!
//! A [`SubscriptionSource`] describes *what* to observe and produces a stream of
//! outputs. A [`Subscription`] wraps a source, remembers its identity and lets the
//! consumer map outputs into its own message type.
//!
//! # Example
//!
//! ```rust,ignore
//! use hello_query::prelude::*;
//!
//! enum Message {
//!     Hello(QueryResult<HelloPayload>),
//! }
//!
//! let sub = Subscription::new(hello_query(&api, client.clone())).map(Message::Hello);
//! ```

pub mod http;

use std::any::TypeId;

use futures::StreamExt;
use futures::stream::BoxStream;

/// Identity of a subscription: the concrete source type plus a hash of its
/// configuration.
///
/// Two sources with the same type and the same configuration hash are considered
/// the same subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Creates an id for the source type `T` with the given configuration hash.
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source of values that can be subscribed to.
pub trait SubscriptionSource: Send + 'static {
    /// The type of values produced by this source.
    type Output;

    /// Creates the stream of values for one subscriber.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Returns the identity of this source.
    fn id(&self) -> SubscriptionId;
}

/// A subscription producing messages of type `Msg`.
pub struct Subscription<Msg> {
    id: SubscriptionId,
    spawn: Box<dyn FnOnce() -> BoxStream<'static, Msg> + Send>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Wraps a source into a subscription.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        let id = source.id();
        Self {
            id,
            spawn: Box::new(move || source.stream()),
        }
    }

    /// Maps each output of this subscription into another message type.
    ///
    /// The mapped subscription keeps the identity of the original one.
    #[must_use]
    pub fn map<F, NewMsg>(self, f: F) -> Subscription<NewMsg>
    where
        F: Fn(Msg) -> NewMsg + Send + 'static,
        NewMsg: Send + 'static,
    {
        let spawn = self.spawn;
        Subscription {
            id: self.id,
            spawn: Box::new(move || spawn().map(f).boxed()),
        }
    }

    /// Returns the identity of this subscription.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Starts the subscription and returns its stream of messages.
    pub fn into_stream(self) -> BoxStream<'static, Msg> {
        (self.spawn)()
    }
}
