// Device ingress WebSocket: one text frame per state report.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::session::{self, SessionHandle};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_device(
    ws: WebSocketUpgrade,
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if serial.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Some((handle, session_task)) = session::spawn(
        &serial,
        state.store.clone(),
        state.registry.clone(),
        state.session_config.clone(),
    ) else {
        return StatusCode::CONFLICT.into_response();
    };
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_device(socket, handle).await {
            tracing::info!(serial = %serial, "device stream error: {}", e);
        }
        // Handle dropped: wait for the session's final save.
        if let Err(e) = session_task.await {
            tracing::warn!(serial = %serial, error = %e, "device session task failed");
        }
    })
    .into_response()
}

async fn stream_device(socket: WebSocket, handle: SessionHandle) -> anyhow::Result<()> {
    tracing::info!(serial = %handle.serial_number(), "device connected");
    let (mut sink, mut stream) = socket.split();
    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if !handle.report(text.as_str().to_owned()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(serial = %handle.serial_number(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sink.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!(serial = %handle.serial_number(), "device disconnected");
    Ok(())
}
