//! HTTP queries with validation and caching.
//!
//! This module provides subscription-based queries similar to SWR or TanStack Query.
//!
//! # Features
//!
//! - **Queries**: Subscription-based data fetching with caching and refetching
//! - **Deduplication**: Concurrent subscribers to a key share one in-flight fetch
//! - **Validation**: Decoded JSON is checked against a [`Schema`] before caching
//! - **Cache management**: Staleness and invalidation
//!
//! # Example
//!
//! ```rust,ignore
//! use hello_query::prelude::*;
//! use std::sync::Arc;
//!
//! struct App {
//!     query_client: Arc<QueryClient>,
//!     api: HelloApi,
//!     hello: QueryResult<HelloPayload>,
//! }
//!
//! impl App {
//!     fn subscriptions(&self) -> Vec<Subscription<Message>> {
//!         vec![
//!             Subscription::new(hello_query(&self.api, self.query_client.clone()))
//!                 .map(Message::Hello),
//!         ]
//!     }
//!
//!     fn update(&mut self, msg: Message) {
//!         match msg {
//!             Message::Hello(result) => self.hello = result,
//!             Message::Refresh => {
//!                 self.query_client.invalidate(&HelloApi::query_key());
//!             }
//!         }
//!     }
//! }
//! ```

mod cache;
mod config;
mod key;
pub mod query;
pub mod schema;
pub mod transport;

// Re-export main types
pub use config::{API_BASE_URL_ENV, ApiConfig, ConfigError, DEFAULT_API_BASE_URL, QueryConfig};
pub use key::{KeyToken, QueryKey};
pub use query::{Fetcher, Query, QueryClient, QueryError, QueryResult};
pub use schema::{HelloPayload, JsonKind, Schema, ValidationError, validate};
pub use transport::{HelloApi, fetch_json, hello_query};
