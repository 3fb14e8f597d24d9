//! Gateway Integration Tests
//!
//! Drive a full client over a real websocket against the fake gateway, with
//! the shard plan bootstrapped from the fake REST API.
//!
//! Run with: cargo test -p concord-integration-tests --test gateway_tests

use axum::http::Method;
use concord_client::{Client, ClientError, Context, Event, HandlerError};
use concord_common::Classify;
use concord_core::Snowflake;
use concord_integration_tests::*;
use tokio::sync::mpsc;

struct Harness {
    gateway: FakeGateway,
    rest: FakeRest,
    client: Client,
    events: mpsc::UnboundedReceiver<Event>,
    run: tokio::task::JoinHandle<Result<(), ClientError>>,
}

impl Harness {
    async fn start() -> Self {
        let gateway = FakeGateway::start().await.unwrap();
        let rest = FakeRest::start().await.unwrap();
        rest.script(
            Method::GET,
            "/gateway/bot",
            Scripted::ok(gateway_bot(&gateway.url(), 1, 1)),
        );

        let (tx, events) = mpsc::unbounded_channel();
        let client = Client::builder(test_config(&rest))
            .event_handler(move |_ctx: Context, event: Event| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(event);
                    Ok::<(), HandlerError>(())
                }
            })
            .build()
            .unwrap();

        let running = client.clone();
        let run = tokio::spawn(async move { running.start().await });

        Self {
            gateway,
            rest,
            client,
            events,
            run,
        }
    }

    /// Next event matching `predicate`, skipping the rest
    async fn expect_event(&mut self, predicate: impl Fn(&Event) -> bool) -> Event {
        loop {
            let event = tokio::time::timeout(WAIT, self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("dispatcher stopped");
            if predicate(&event) {
                return event;
            }
        }
    }
}

/// Accept a connection, say hello and answer the identify with READY
async fn identify(harness: &mut Harness, session_id: &str, guilds: &[u64]) -> GatewaySocket {
    let mut socket = harness.gateway.accept().await.unwrap();
    assert!(socket.query.contains("v=10"));
    assert!(socket.query.contains("encoding=json"));

    socket.hello(45_000).await.unwrap();
    let identify = socket.recv_command().await.unwrap();
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], "integration-token");
    assert_eq!(identify["d"]["shard"], serde_json::json!([0, 1]));

    let resume_url = harness.gateway.url();
    socket
        .dispatch("READY", 1, ready(session_id, &resume_url, guilds))
        .await
        .unwrap();
    socket
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_client_bootstraps_and_becomes_ready() {
    let mut harness = Harness::start().await;
    let mut socket = identify(&mut harness, "session-1", &[7]).await;

    socket
        .dispatch("GUILD_CREATE", 2, guild_create(7, "lobby"))
        .await
        .unwrap();

    let ready = harness
        .expect_event(|e| matches!(e, Event::ShardReady { .. }))
        .await;
    assert_eq!(
        ready,
        Event::ShardReady {
            shard_id: 0,
            unavailable_guilds: Vec::new()
        }
    );
    harness
        .expect_event(|e| matches!(e, Event::AllShardsReady { shard_count: 1 }))
        .await;

    let guild = harness.client.cache().guild(Snowflake::new(7)).unwrap();
    assert_eq!(guild.name, "lobby");
    assert_eq!(harness.rest.hits_for("/gateway/bot").len(), 1);
    assert_eq!(
        harness.rest.hits()[0].authorization.as_deref(),
        Some("Bot integration-token")
    );

    harness.client.shutdown();
    assert_eq!(socket.closed().await.unwrap(), Some(1000));
    harness.run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reconnect_request_resumes_session() {
    let mut harness = Harness::start().await;
    let mut socket = identify(&mut harness, "session-2", &[]).await;
    harness
        .expect_event(|e| matches!(e, Event::AllShardsReady { .. }))
        .await;

    socket.reconnect().await.unwrap();
    assert_eq!(socket.closed().await.unwrap(), Some(4000));

    let mut resumed = harness.gateway.accept().await.unwrap();
    resumed.hello(45_000).await.unwrap();
    let resume = resumed.recv_command().await.unwrap();
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "session-2");
    assert_eq!(resume["d"]["seq"], 1);

    resumed
        .dispatch("RESUMED", 2, serde_json::Value::Null)
        .await
        .unwrap();
    resumed
        .dispatch("MESSAGE_CREATE", 3, message(30, 10, "after resume"))
        .await
        .unwrap();

    let event = harness
        .expect_event(|e| matches!(e, Event::MessageCreate(_)))
        .await;
    let Event::MessageCreate(message) = event else {
        unreachable!()
    };
    assert_eq!(message.content, "after resume");

    harness.client.shutdown();
    assert_eq!(resumed.closed().await.unwrap(), Some(1000));
    harness.run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_authentication_failure_stops_client() {
    let mut harness = Harness::start().await;
    let mut socket = harness.gateway.accept().await.unwrap();
    socket.hello(45_000).await.unwrap();
    let identify = socket.recv_command().await.unwrap();
    assert_eq!(identify["op"], 2);
    socket.close(4004).await.unwrap();

    let err = tokio::time::timeout(WAIT, harness.run)
        .await
        .expect("client kept running")
        .unwrap()
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.error_code(), "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn test_handler_replies_through_rest() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let rest = FakeRest::start().await.unwrap();
    rest.script(
        Method::GET,
        "/gateway/bot",
        Scripted::ok(gateway_bot(&gateway.url(), 1, 1)),
    );
    rest.script(
        Method::POST,
        "/channels/10/messages",
        Scripted::ok(message(31, 10, "pong")),
    );

    let (done_tx, mut done) = mpsc::unbounded_channel();
    let client = Client::builder(test_config(&rest))
        .event_handler(move |ctx: Context, event: Event| {
            let done_tx = done_tx.clone();
            async move {
                if let Event::MessageCreate(message) = event {
                    let reply = concord_http::CreateMessage::text("pong").reply_to(message.id);
                    let sent = ctx.http.create_message(message.channel_id, &reply).await?;
                    let _ = done_tx.send(sent.id);
                }
                Ok::<(), HandlerError>(())
            }
        })
        .build()
        .unwrap();
    let running = client.clone();
    let run = tokio::spawn(async move { running.start().await });

    let mut socket = gateway.accept().await.unwrap();
    socket.hello(45_000).await.unwrap();
    socket.recv_command().await.unwrap();
    socket
        .dispatch("READY", 1, ready("session-3", &gateway.url(), &[]))
        .await
        .unwrap();
    socket
        .dispatch("MESSAGE_CREATE", 2, message(30, 10, "ping"))
        .await
        .unwrap();

    let sent = tokio::time::timeout(WAIT, done.recv()).await.unwrap().unwrap();
    assert_eq!(sent, Snowflake::new(31));
    let posts = rest.hits_for("/channels/10/messages");
    assert_eq!(posts.len(), 1);
    let body = posts[0].body.as_ref().unwrap();
    assert_eq!(body["content"], "pong");
    assert_eq!(body["message_reference"]["message_id"], "30");

    client.shutdown();
    socket.closed().await.unwrap();
    run.await.unwrap().unwrap();
}
