// Integration tests for the hello query over real HTTP.
// Unit tests for the cache and state machine are in src/subscription/http/query.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::mock_api::{MockApi, MockResponse};
use futures::StreamExt;
use futures::stream::BoxStream;
use hello_query::prelude::*;
use tokio::time::timeout;

type HelloStream = BoxStream<'static, QueryResult<HelloPayload>>;

const WAIT: Duration = Duration::from_secs(5);

fn api_for(server: &MockApi) -> HelloApi {
    HelloApi::new(ApiConfig::new(server.base_url()).expect("mock url is valid"))
}

async fn next(stream: &mut HelloStream) -> QueryResult<HelloPayload> {
    timeout(WAIT, stream.next())
        .await
        .expect("stream should yield within timeout")
        .expect("stream should not end")
}

/// Subscribes once and returns the terminal state of the first attempt.
async fn settle(response: MockResponse) -> QueryResult<HelloPayload> {
    let server = MockApi::start(response).await;
    let api = api_for(&server);
    let client = Arc::new(QueryClient::new());

    let mut stream: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    assert!(next(&mut stream).await.is_pending());
    let state = next(&mut stream).await;
    assert_eq!(server.hits(), 1);
    state
}

#[tokio::test]
async fn test_success_payload() {
    let state = settle(MockResponse::json(r#"{"message":"hi"}"#)).await;
    assert_eq!(
        state,
        QueryResult::Success {
            value: HelloPayload {
                message: "hi".to_string()
            }
        }
    );
}

#[tokio::test]
async fn test_server_error_status() {
    let state = settle(MockResponse::error(500)).await;
    let cause = state.cause().expect("should fail");
    assert!(cause.contains("failed"), "cause: {cause}");
    assert!(cause.contains("status"), "cause: {cause}");
    assert!(cause.contains("500"), "cause: {cause}");
}

#[tokio::test]
async fn test_error_body_is_not_parsed() {
    // a well-formed payload behind an error status is still a failure
    let mut response = MockResponse::json(r#"{"message":"hi"}"#);
    response.status = 503;

    let state = settle(response).await;
    assert!(state.is_error());
}

#[tokio::test]
async fn test_wrong_field_name() {
    let state = settle(MockResponse::json(r#"{"msg":"hi"}"#)).await;
    let cause = state.cause().expect("should fail");
    assert!(cause.contains("missing"), "cause: {cause}");
    assert!(cause.contains("`message`"), "cause: {cause}");
}

#[tokio::test]
async fn test_wrong_field_type() {
    let state = settle(MockResponse::json(r#"{"message":123}"#)).await;
    let cause = state.cause().expect("should fail");
    assert!(cause.contains("type mismatch"), "cause: {cause}");
    assert!(cause.contains("expected string"), "cause: {cause}");
}

#[tokio::test]
async fn test_invalid_json_body() {
    let state = settle(MockResponse::json("<html>oops</html>")).await;
    let cause = state.cause().expect("should fail");
    assert!(cause.starts_with("failed to decode response body as JSON"), "cause: {cause}");
}

#[tokio::test]
async fn test_extra_fields_are_ignored() {
    let state = settle(MockResponse::json(r#"{"message":"hi","from":"rust"}"#)).await;
    assert_eq!(state.value().map(|v| v.message.as_str()), Some("hi"));
}

#[tokio::test]
async fn test_concurrent_subscribers_issue_one_request() {
    let server = MockApi::start(MockResponse::json(r#"{"message":"hi"}"#).with_delay(100)).await;
    let api = api_for(&server);
    let client = Arc::new(QueryClient::new());

    let mut first: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    let mut second: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());

    assert!(next(&mut first).await.is_pending());
    assert!(next(&mut second).await.is_pending());

    assert!(next(&mut first).await.is_success());
    assert!(next(&mut second).await.is_success());
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_fresh_data_is_not_refetched() {
    let server = MockApi::start(MockResponse::json(r#"{"message":"hi"}"#)).await;
    let api = api_for(&server);
    let client = Arc::new(QueryClient::with_config(QueryConfig::new(
        Duration::from_secs(60),
    )));

    let mut first: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    assert!(next(&mut first).await.is_pending());
    assert!(next(&mut first).await.is_success());
    drop(first);

    let mut second: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    assert!(next(&mut second).await.is_success());
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_invalidate_picks_up_new_data() {
    let server = MockApi::start(MockResponse::json(r#"{"message":"first"}"#)).await;
    let api = api_for(&server);
    let client = Arc::new(QueryClient::with_config(QueryConfig::new(
        Duration::from_secs(60),
    )));

    let mut stream: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    assert!(next(&mut stream).await.is_pending());
    assert_eq!(
        next(&mut stream).await.value().map(|v| v.message.clone()),
        Some("first".to_string())
    );

    server
        .respond_with(MockResponse::json(r#"{"message":"second"}"#))
        .await;
    assert!(client.invalidate(&HelloApi::query_key()));

    assert!(next(&mut stream).await.is_pending());
    assert_eq!(
        next(&mut stream).await.value().map(|v| v.message.clone()),
        Some("second".to_string())
    );
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_recovers_after_error() {
    let server = MockApi::start(MockResponse::error(500)).await;
    let api = api_for(&server);
    let client = Arc::new(QueryClient::new());

    let mut first: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    assert!(next(&mut first).await.is_pending());
    assert!(next(&mut first).await.is_error());

    server
        .respond_with(MockResponse::json(r#"{"message":"back"}"#))
        .await;

    // errors are never fresh, so subscribing again starts a new attempt
    let mut second: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    assert!(next(&mut second).await.is_pending());
    assert!(next(&mut second).await.is_success());
}

#[tokio::test]
async fn test_unknown_path_is_status_error() {
    let server = MockApi::start(MockResponse::json(r#"{"message":"hi"}"#)).await;
    let api = HelloApi::new(
        ApiConfig::new(format!("http://{}/missing", server.addr)).expect("valid url"),
    );
    let client = Arc::new(QueryClient::new());

    let mut stream: HelloStream = client.subscribe(HelloApi::query_key(), api.fetcher());
    assert!(next(&mut stream).await.is_pending());
    let state = next(&mut stream).await;
    assert!(state.cause().is_some_and(|c| c.contains("404")));
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn test_subscription_maps_into_messages() {
    #[derive(Debug, PartialEq)]
    enum Message {
        Loading,
        Failed(String),
        Hello(String),
    }

    let server = MockApi::start(MockResponse::json(r#"{"message":"hi"}"#)).await;
    let api = api_for(&server);
    let client = Arc::new(QueryClient::new());

    let sub = Subscription::new(hello_query(&api, client)).map(|state| match state {
        QueryResult::Pending => Message::Loading,
        QueryResult::Error { cause } => Message::Failed(cause),
        QueryResult::Success { value } => Message::Hello(value.message),
    });

    let messages: Vec<_> = timeout(WAIT, sub.into_stream().take(2).collect())
        .await
        .expect("should settle");
    assert_eq!(
        messages,
        vec![Message::Loading, Message::Hello("hi".to_string())]
    );
}
