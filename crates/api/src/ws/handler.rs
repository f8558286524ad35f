//! Live connection handler: one WebSocket following one job.
//!
//! On upgrade the connection attaches to the job (backlog snapshot plus
//! live subscription, taken atomically), sends the backlog, then streams
//! every new event as one JSON text frame. After the terminal event the
//! socket stays open until the client closes it. An observer that falls
//! behind is dropped by the bus and its socket closed with 1008 `lagged`.

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use slidecast_core::event::SequencedEvent;
use slidecast_core::job_events::{CLIENT_MSG_REPLAY_PAPER, CLOSE_REASON_LAGGED};
use slidecast_core::types::JobId;
use slidecast_events::Attachment;
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};
use crate::handlers::jobs::parse_job_id;
use crate::query::StreamParams;
use crate::state::AppState;

type WsSink = SplitSink<WebSocket, Message>;

/// Frame sent by the client; only the `type` field matters.
#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
}

/// GET /api/v1/jobs/{id}/ws
///
/// Unknown or malformed ids are answered with 404 before upgrading.
pub async fn job_stream(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<StreamParams>, QueryRejection>,
) -> Response {
    let job_id = match existing_job(&state, &id) {
        Ok(job_id) => job_id,
        Err(e) => return e.into_response(),
    };
    let limit = match params {
        Ok(Query(params)) => state.config.replay_limit(params.limit),
        Err(rejection) => return AppError::from(rejection).into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id, limit))
}

fn existing_job(state: &AppState, raw: &str) -> AppResult<JobId> {
    let job_id = parse_job_id(raw)?;
    state.bus.registry().get(&job_id)?;
    Ok(job_id)
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Attaches to the job's events and registers with `WsManager`.
///   2. Spawns a sender task that writes the backlog, live events and
///      control frames to the sink.
///   3. Processes inbound messages on the current task.
///   4. Unsubscribes and deregisters on every exit path.
async fn handle_socket(socket: WebSocket, state: AppState, job_id: JobId, limit: usize) {
    let conn_id = uuid::Uuid::new_v4().to_string();

    let attachment = match state.bus.attach(&job_id, limit) {
        Ok(attachment) => attachment,
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, job_id = %job_id, error = %e, "WebSocket attach failed");
            return;
        }
    };
    let handle = attachment.subscription.handle();
    tracing::info!(
        conn_id = %conn_id,
        job_id = %job_id,
        replayed = attachment.backlog.len(),
        "WebSocket connected",
    );

    let control = state.ws_manager.add(conn_id.clone(), job_id).await;
    let (sink, mut stream) = socket.split();
    let mut send_task = tokio::spawn(forward(sink, attachment, control, conn_id.clone()));

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(conn_id = %conn_id, "Pong received");
                }
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(&state, &conn_id, &job_id, text.as_str()).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    state.bus.unsubscribe(&handle);
    tracing::info!(conn_id = %conn_id, job_id = %job_id, "WebSocket disconnected");
}

/// Sender task: backlog first, then live events and control frames.
async fn forward(
    mut sink: WsSink,
    attachment: Attachment,
    mut control: mpsc::UnboundedReceiver<Message>,
    conn_id: String,
) {
    let Attachment {
        backlog,
        mut subscription,
    } = attachment;

    for entry in &backlog {
        if send_event(&mut sink, entry).await.is_err() {
            return;
        }
    }

    let mut live = true;
    loop {
        tokio::select! {
            frame = control.recv() => {
                let Some(frame) = frame else { break };
                let closing = matches!(frame, Message::Close(_));
                if sink.send(frame).await.is_err() || closing {
                    break;
                }
            }
            event = subscription.recv(), if live => match event {
                Some(entry) => {
                    if send_event(&mut sink, &entry).await.is_err() {
                        tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                        break;
                    }
                }
                // The terminal event went out; nothing more will arrive.
                None if subscription.finished() => live = false,
                None => {
                    tracing::warn!(conn_id = %conn_id, "Observer lagged behind, closing connection");
                    let frame = CloseFrame {
                        code: close_code::POLICY,
                        reason: CLOSE_REASON_LAGGED.into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
            },
        }
    }
}

async fn send_event(sink: &mut WsSink, entry: &SequencedEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(entry) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!(seq = entry.seq, error = %e, "Failed to serialize event");
            Ok(())
        }
    }
}

async fn handle_client_message(state: &AppState, conn_id: &str, job_id: &JobId, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring malformed client message");
            return;
        }
    };
    if message.kind != CLIENT_MSG_REPLAY_PAPER {
        tracing::trace!(conn_id = %conn_id, kind = %message.kind, "Ignoring client message");
        return;
    }

    match state.bus.paper_event(job_id) {
        Ok(Some(entry)) => match serde_json::to_string(&entry) {
            Ok(json) => {
                state.ws_manager.send(conn_id, Message::Text(json.into())).await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize paper event"),
        },
        Ok(None) => tracing::debug!(conn_id = %conn_id, "No paper event to replay yet"),
        Err(e) => tracing::debug!(conn_id = %conn_id, error = %e, "Paper replay failed"),
    }
}
