//! Unit tests for `WsManager`.
//!
//! These tests exercise the WebSocket connection manager directly, without
//! performing any HTTP upgrades. They verify add/remove semantics, targeted
//! delivery, pings and graceful shutdown behaviour.

use axum::extract::ws::Message;
use slidecast_api::ws::WsManager;
use slidecast_core::types::JobId;

// ---------------------------------------------------------------------------
// Test: new manager starts with zero connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: add() and remove() track the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), JobId::new()).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: remove() with unknown ID is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), JobId::new()).await;
    manager.remove("nonexistent").await;

    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: connections are counted per job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connections_for_job_counts_only_that_job() {
    let manager = WsManager::new();
    let job_a = JobId::new();
    let job_b = JobId::new();

    let _rx1 = manager.add("conn-1".to_string(), job_a).await;
    let _rx2 = manager.add("conn-2".to_string(), job_a).await;
    let _rx3 = manager.add("conn-3".to_string(), job_b).await;

    assert_eq!(manager.connections_for_job(&job_a).await, 2);
    assert_eq!(manager.connections_for_job(&job_b).await, 1);
    assert_eq!(manager.connections_for_job(&JobId::new()).await, 0);
}

// ---------------------------------------------------------------------------
// Test: send() reaches only the addressed connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_targets_one_connection() {
    let manager = WsManager::new();
    let job_id = JobId::new();

    let mut rx1 = manager.add("conn-1".to_string(), job_id).await;
    let mut rx2 = manager.add("conn-2".to_string(), job_id).await;

    assert!(manager.send("conn-1", Message::Text("hello".into())).await);

    match rx1.try_recv() {
        Ok(Message::Text(text)) => assert_eq!(text.as_str(), "hello"),
        other => panic!("Expected Text frame, got {other:?}"),
    }
    assert!(rx2.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: send() reports unknown or closed connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_reports_unknown_and_closed_connections() {
    let manager = WsManager::new();

    assert!(!manager.send("missing", Message::Text("x".into())).await);

    let rx = manager.add("conn-1".to_string(), JobId::new()).await;
    drop(rx);
    assert!(!manager.send("conn-1", Message::Text("x".into())).await);
}

// ---------------------------------------------------------------------------
// Test: ping_all() pings every connection and skips closed channels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_reaches_open_connections() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), JobId::new()).await;
    let rx2 = manager.add("conn-2".to_string(), JobId::new()).await;
    drop(rx2);

    manager.ping_all().await;

    assert!(matches!(rx1.try_recv(), Ok(Message::Ping(_))));
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), JobId::new()).await;
    let mut rx2 = manager.add("conn-2".to_string(), JobId::new()).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(rx1.try_recv(), Ok(Message::Close(None))));
    assert!(matches!(rx2.try_recv(), Ok(Message::Close(None))));
}

// ---------------------------------------------------------------------------
// Test: adding with duplicate ID replaces the previous connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_id_replaces_previous_connection() {
    let manager = WsManager::new();

    let mut old_rx = manager.add("conn-1".to_string(), JobId::new()).await;
    let mut new_rx = manager.add("conn-1".to_string(), JobId::new()).await;

    assert_eq!(manager.connection_count().await, 1);

    manager.send("conn-1", Message::Text("to-new".into())).await;
    assert!(new_rx.try_recv().is_ok());
    // The old sender was dropped with the replaced entry.
    assert!(old_rx.try_recv().is_err());
}
