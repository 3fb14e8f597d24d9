//! REST Integration Tests
//!
//! Exercise the rate limiter and retry loop against the fake REST API.
//!
//! Run with: cargo test -p concord-integration-tests --test rest_tests

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use concord_cache::EntityCache;
use concord_common::{default_error_hook, HttpConfig};
use concord_core::{Event, Snowflake};
use concord_gateway::{Context, HandlerError, ShardPlan, ShardSupervisor, WsConnector};
use concord_http::{CreateMessage, HttpClient, HttpError, Route};
use concord_integration_tests::*;

fn http_client(rest: &FakeRest, max_retries: u32) -> HttpClient {
    let config = HttpConfig {
        api_base_url: rest.base_url(),
        max_retries,
        ..HttpConfig::default()
    };
    HttpClient::new("integration-token", &config).unwrap()
}

fn elapsed_between(hits: &[Hit], first: usize, second: usize) -> Duration {
    hits[second].at.duration_since(hits[first].at)
}

// ============================================================================
// Rate Limit Tests
// ============================================================================

#[tokio::test]
async fn test_create_message_retries_after_429() {
    let rest = FakeRest::start().await.unwrap();
    rest.script(
        Method::POST,
        "/channels/10/messages",
        Scripted::rate_limited(0.3, false).bucket("msg", 5, 0, 0.3),
    );
    rest.script(
        Method::POST,
        "/channels/10/messages",
        Scripted::ok(message(11, 10, "hello")).bucket("msg", 5, 4, 5.0),
    );

    let http = http_client(&rest, 3);
    let sent = http
        .create_message(Snowflake::new(10), &CreateMessage::text("hello"))
        .await
        .unwrap();
    assert_eq!(sent.id, Snowflake::new(11));

    let hits = rest.hits_for("/channels/10/messages");
    assert_eq!(hits.len(), 2);
    assert!(elapsed_between(&hits, 0, 1) >= Duration::from_millis(300));
    assert_eq!(hits[1].body.as_ref().unwrap()["content"], "hello");
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_retry_ceiling() {
    let rest = FakeRest::start().await.unwrap();
    for _ in 0..2 {
        rest.script(
            Method::GET,
            "/users/@me",
            Scripted::rate_limited(0.05, false),
        );
    }

    let http = http_client(&rest, 1);
    let err = http.get_current_user().await.unwrap_err();
    assert!(matches!(err, HttpError::RateLimited { attempts: 2, .. }));
    assert_eq!(err.status(), Some(429));
    assert_eq!(rest.hits_for("/users/@me").len(), 2);
}

#[tokio::test]
async fn test_global_limit_holds_every_route() {
    let rest = FakeRest::start().await.unwrap();
    rest.script(Method::GET, "/users/@me", Scripted::rate_limited(0.4, true));
    rest.script(Method::GET, "/users/5", Scripted::ok(user(5, "other")));

    let http = http_client(&rest, 0);
    let err = http.get_current_user().await.unwrap_err();
    assert!(matches!(err, HttpError::RateLimited { .. }));
    assert!(http.limiter().global_remaining().is_some());

    let other = http.get_user(Snowflake::new(5)).await.unwrap();
    assert_eq!(other.username, "other");

    let hits = rest.hits();
    assert_eq!(hits.len(), 2);
    assert!(elapsed_between(&hits, 0, 1) >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_exhausted_bucket_delays_next_request() {
    let rest = FakeRest::start().await.unwrap();
    rest.script(
        Method::GET,
        "/users/5",
        Scripted::ok(user(5, "first")).bucket("users", 1, 0, 0.3),
    );
    rest.script(
        Method::GET,
        "/users/5",
        Scripted::ok(user(5, "second")).bucket("users", 1, 0, 0.3),
    );

    let http = http_client(&rest, 0);
    http.get_user(Snowflake::new(5)).await.unwrap();
    let snapshot = http.limiter().snapshot(&Route::get_user(Snowflake::new(5)));
    assert_eq!(snapshot.remaining, Some(0));

    let second = http.get_user(Snowflake::new(5)).await.unwrap();
    assert_eq!(second.username, "second");

    let hits = rest.hits_for("/users/5");
    assert!(elapsed_between(&hits, 0, 1) >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let rest = FakeRest::start().await.unwrap();
    rest.script(
        Method::GET,
        "/users/@me",
        Scripted::status(StatusCode::BAD_GATEWAY, serde_json::json!({})),
    );
    rest.script(Method::GET, "/users/@me", Scripted::ok(user(1, "concord")));

    let http = http_client(&rest, 2);
    let me = http.get_current_user().await.unwrap();
    assert_eq!(me.id, Snowflake::new(1));
    assert_eq!(rest.hits_for("/users/@me").len(), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let rest = FakeRest::start().await.unwrap();
    let http = http_client(&rest, 3);

    let err = http.get_user(Snowflake::new(404)).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(rest.hits_for("/users/404").len(), 1);
}

// ============================================================================
// Bootstrap Tests
// ============================================================================

#[tokio::test]
async fn test_plan_follows_gateway_bot() {
    let rest = FakeRest::start().await.unwrap();
    rest.script(
        Method::GET,
        "/gateway/bot",
        Scripted::ok(gateway_bot("wss://gateway.test", 3, 2)),
    );

    let config = test_config(&rest);
    let http = HttpClient::new(&config.token, &config.http).unwrap();
    let supervisor = ShardSupervisor::new(
        config.clone(),
        Arc::new(WsConnector),
        http,
        Arc::new(EntityCache::new(config.intents, 10)),
        Arc::new(|_ctx: Context, _event: Event| async { Ok::<(), HandlerError>(()) }),
        default_error_hook(),
    );

    let plan = supervisor.plan().await.unwrap();
    assert_eq!(
        plan,
        ShardPlan {
            url: "wss://gateway.test".into(),
            shard_count: 3,
            shard_ids: 0..3,
            max_concurrency: 2,
        }
    );
}
