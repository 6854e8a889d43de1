//! # hello-query
//!
//! A small client-side data-fetch layer: it requests a JSON resource, validates its
//! shape and exposes the result as an observable state that is either pending,
//! failed or succeeded.
//!
//! ## Architecture
//!
//! 1. **Fetcher**: performs the HTTP request and decodes the body as JSON
//! 2. **Schema**: validates the decoded JSON into a typed payload
//! 3. **Query client**: caches results per key, deduplicates in-flight fetches and
//!    broadcasts every state transition to subscribers
//! 4. **Subscriptions**: the consumer-facing streams of query states
//!
//! ## Core Components
//!
//! - [`QueryClient`](subscription::http::QueryClient): owns the cache
//! - [`Query`](subscription::http::Query): a subscription to one cached query
//! - [`QueryResult`](subscription::http::QueryResult): `Pending`, `Error` or `Success`
//! - [`HelloApi`](subscription::http::HelloApi): transport for the hello resource
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use hello_query::prelude::*;
//!
//! # async fn run() -> Result<(), hello_query::subscription::http::ConfigError> {
//! let api = HelloApi::new(ApiConfig::from_env()?);
//! let client = Arc::new(QueryClient::new());
//!
//! let mut states = Subscription::new(hello_query(&api, client)).into_stream();
//! while let Some(state) = states.next().await {
//!     match state {
//!         QueryResult::Pending => println!("Loading message from API..."),
//!         QueryResult::Error { cause } => println!("Error: {cause}"),
//!         QueryResult::Success { value } => println!("Message from API: {}", value.message),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Failures never escape as panics or errors: transport, decode and validation
//! failures all arrive as [`QueryResult::Error`](subscription::http::QueryResult::Error).

pub mod prelude;
pub mod subscription;
