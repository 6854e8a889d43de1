//! Prelude module for convenient imports.
//!
//! ```
//! use hello_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`Subscription`] and [`SubscriptionSource`] - For observing queries
//! - [`QueryClient`], [`Query`], [`QueryKey`] and [`QueryResult`] - The query cache
//! - [`HelloApi`], [`HelloPayload`] and [`hello_query`] - The hello resource
//! - [`ApiConfig`] and [`QueryConfig`] - Configuration

pub use crate::subscription::http::{
    ApiConfig, HelloApi, HelloPayload, Query, QueryClient, QueryConfig, QueryError, QueryKey,
    QueryResult, hello_query,
};
pub use crate::subscription::{Subscription, SubscriptionSource};
