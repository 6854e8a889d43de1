//! Fetches the hello message and prints each state of the query.
//!
//! This example shows:
//! - Loading the API base URL from the environment (`API_BASE_URL`)
//! - Subscribing to a cached, validated query
//! - Rendering the pending, error and success states
//!
//! Run with: `API_BASE_URL=http://localhost:8080/api cargo run --example hello`
//! Set `RUST_LOG=hello_query=debug` to see fetch logs.

use std::sync::Arc;

use color_eyre::eyre::Result;
use futures::StreamExt;
use hello_query::prelude::*;
use tracing_subscriber::EnvFilter;

/// One line of output per query state.
fn render(state: &QueryResult<HelloPayload>) -> String {
    match state {
        QueryResult::Pending => "Loading message from API...".to_string(),
        QueryResult::Error { cause } => format!("Error: {cause}"),
        QueryResult::Success { value } => format!("Message from API: {}", value.message),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ApiConfig::from_env()?;
    tracing::info!(base_url = %config.base_url, "starting");

    let api = HelloApi::new(config);
    let client = Arc::new(QueryClient::new());

    let mut states = Subscription::new(hello_query(&api, client)).into_stream();
    while let Some(state) = states.next().await {
        println!("{}", render(&state));
        if !state.is_pending() {
            break;
        }
    }

    Ok(())
}
