use std::sync::Arc;

use slidecast_events::EventBus;

use crate::config::ServerConfig;
use crate::engine::JobDispatcher;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job registry plus live event fan-out.
    pub bus: EventBus,
    /// Starts and cancels pipeline runs.
    pub dispatcher: Arc<JobDispatcher>,
    /// Live WebSocket connections.
    pub ws_manager: Arc<WsManager>,
}
