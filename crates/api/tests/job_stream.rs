//! End-to-end tests for the live job stream at `/api/v1/jobs/{id}/ws`.
//!
//! Each test serves the full router on an ephemeral port and connects with
//! a real WebSocket client.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use slidecast_core::types::JobId;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use common::{create_job, wait_for_terminal, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn serve(test: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = test.app();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, job_id: &str, query: &str) -> Client {
    let url = format!("ws://{addr}/api/v1/jobs/{job_id}/ws{query}");
    let (ws, _) = connect_async(url).await.expect("WebSocket connect failed");
    ws
}

/// Next JSON event from the server, skipping control frames.
async fn next_event(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("Timed out waiting for an event")
            .expect("Stream ended")
            .expect("WebSocket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {other:?}"),
        }
    }
}

/// Read events until the terminal status arrives.
async fn read_until_terminal(ws: &mut Client) -> Vec<Value> {
    let mut events = Vec::new();
    loop {
        let event = next_event(ws).await;
        let terminal = event["type"] == "status"
            && matches!(
                event["status"].as_str(),
                Some("succeeded" | "failed" | "cancelled")
            );
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Poll the bus until `job_id` has exactly `expected` live observers.
async fn wait_for_observers(test: &TestApp, job_id: &JobId, expected: usize) {
    for _ in 0..500 {
        if test.state.bus.observer_count(job_id).unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {expected} observers, found {}",
        test.state.bus.observer_count(job_id).unwrap()
    );
}

fn seqs(events: &[Value]) -> Vec<u64> {
    events.iter().map(|e| e["seq"].as_u64().unwrap()).collect()
}

// ---------------------------------------------------------------------------
// Test: an observer sees every event exactly once, in order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_delivers_backlog_then_live_without_gaps() {
    let test = common::build_test_app_with_delay(Duration::from_millis(20));
    let addr = serve(&test).await;
    let job_id = create_job(test.app(), json!({"mode": "demo"})).await;

    let mut ws = connect(addr, &job_id, "?limit=1000").await;
    let events = read_until_terminal(&mut ws).await;

    let expected: Vec<u64> = (0..events.len() as u64).collect();
    assert_eq!(seqs(&events), expected);
    assert_eq!(events.last().unwrap()["status"], "succeeded");

    let snapshot = wait_for_terminal(test.app(), &job_id).await;
    assert_eq!(snapshot["event_count"], events.len() as u64);
}

// ---------------------------------------------------------------------------
// Test: concurrent observers receive identical sequences
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_observers_see_identical_sequences() {
    let test = common::build_test_app_with_delay(Duration::from_millis(20));
    let addr = serve(&test).await;
    let job_id = create_job(test.app(), json!({"mode": "demo"})).await;

    let mut first = connect(addr, &job_id, "?limit=1000").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut second = connect(addr, &job_id, "?limit=1000").await;

    let (a, b) = tokio::join!(
        read_until_terminal(&mut first),
        read_until_terminal(&mut second)
    );

    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// Test: a late observer gets the requested tail of the backlog
// ---------------------------------------------------------------------------

#[tokio::test]
async fn late_observer_receives_backlog_tail() {
    let test = common::build_test_app();
    let addr = serve(&test).await;
    let job_id = create_job(test.app(), json!({"mode": "demo"})).await;
    let snapshot = wait_for_terminal(test.app(), &job_id).await;
    let total = snapshot["event_count"].as_u64().unwrap();

    let mut ws = connect(addr, &job_id, "?limit=2").await;
    let events = vec![next_event(&mut ws).await, next_event(&mut ws).await];

    assert_eq!(seqs(&events), vec![total - 2, total - 1]);
    assert_eq!(events[1]["status"], "succeeded");

    // Nothing follows the terminal event.
    let more = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(more.is_err(), "no frames expected after the backlog");
}

// ---------------------------------------------------------------------------
// Test: the socket stays open after the terminal event and answers
// replay_paper requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replay_paper_after_terminal_event() {
    let test = common::build_test_app();
    let addr = serve(&test).await;
    let job_id = create_job(test.app(), json!({"mode": "demo"})).await;
    wait_for_terminal(test.app(), &job_id).await;

    let mut ws = connect(addr, &job_id, "?limit=1000").await;
    let events = read_until_terminal(&mut ws).await;
    let paper = events
        .iter()
        .find(|e| e["type"] == "paper")
        .expect("paper event in backlog")
        .clone();

    ws.send(Message::Text(json!({"type": "replay_paper"}).to_string()))
        .await
        .unwrap();
    let replayed = next_event(&mut ws).await;
    assert_eq!(replayed, paper);

    // Unknown client messages are ignored; the connection stays usable.
    ws.send(Message::Text("{\"type\":\"hello\"}".to_string()))
        .await
        .unwrap();
    ws.send(Message::Text(json!({"type": "replay_paper"}).to_string()))
        .await
        .unwrap();
    assert_eq!(next_event(&mut ws).await, paper);

    ws.close(None).await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: connections are tracked while open
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connections_are_registered_while_open() {
    let test = common::build_test_app();
    let addr = serve(&test).await;
    let job_id = create_job(test.app(), json!({"mode": "demo"})).await;
    wait_for_terminal(test.app(), &job_id).await;

    let mut ws = connect(addr, &job_id, "?limit=1").await;
    next_event(&mut ws).await;
    assert_eq!(test.state.ws_manager.connection_count().await, 1);

    ws.close(None).await.unwrap();
    for _ in 0..100 {
        if test.state.ws_manager.connection_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(test.state.ws_manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: a vanished client is unsubscribed and the job keeps running
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_client_unsubscribes_without_stopping_the_job() {
    let test = common::build_test_app_with_delay(Duration::from_millis(20));
    let addr = serve(&test).await;
    let job_id = create_job(test.app(), json!({"mode": "demo"})).await;
    let id = JobId::parse(&job_id).unwrap();

    let ws = connect(addr, &job_id, "?limit=0").await;
    wait_for_observers(&test, &id, 1).await;

    // No Close frame: the TCP connection just goes away.
    drop(ws);
    wait_for_observers(&test, &id, 0).await;

    let snapshot = wait_for_terminal(test.app(), &job_id).await;
    assert_eq!(snapshot["status"], "succeeded");
}

// ---------------------------------------------------------------------------
// Test: an observer that falls behind is closed with 1008 "lagged"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lagging_observer_is_closed_with_policy_code() {
    let output = tempfile::tempdir().unwrap();
    let mut config = common::test_config(&output, Duration::from_millis(20));
    config.observer_queue_capacity = 1;
    let test = common::build_test_app_from(config, output);
    let addr = serve(&test).await;
    let job_id = create_job(test.app(), json!({"mode": "demo"})).await;

    let mut ws = connect(addr, &job_id, "?limit=0").await;

    let close = loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("Timed out waiting for the close frame")
            .expect("Stream ended without a close frame")
            .expect("WebSocket error");
        match frame {
            Message::Close(frame) => break frame,
            Message::Text(_) | Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {other:?}"),
        }
    };

    let CloseFrame { code, reason } = close.expect("Close frame without payload");
    assert_eq!(code, CloseCode::Policy);
    assert_eq!(reason, "lagged");

    // The job itself is unaffected by the dropped observer.
    let snapshot = wait_for_terminal(test.app(), &job_id).await;
    assert_eq!(snapshot["status"], "succeeded");
}

// ---------------------------------------------------------------------------
// Test: unknown and malformed job ids are refused before upgrading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_is_refused_with_404() {
    let test = common::build_test_app();
    let addr = serve(&test).await;

    for id in ["0123456789abcdef0123456789abcdef", "not-a-job"] {
        let url = format!("ws://{addr}/api/v1/jobs/{id}/ws");
        match connect_async(url).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), 404);
            }
            other => panic!("Expected HTTP 404, got {:?}", other.map(|_| ())),
        }
    }
}
