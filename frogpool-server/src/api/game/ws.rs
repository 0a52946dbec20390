//! `GET /game/ws`: the per-user push stream.
//!
//! The socket is split in two halves. A writer task drains the
//! connection's [`ConnectionReceiver`] into the socket; the read half runs
//! on the upgrade task, answers `ping` frames and enforces the read
//! deadline. Whichever half finishes first ends the connection.

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use frogpool_core::config::GameConfig;
use frogpool_core::registry::{ConnectionHandle, ConnectionReceiver, Outgoing, connection};
use frogpool_sdk::objects::{WsClientMessage, WsCloseCode, WsServerMessage};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::api::extractors::AuthenticatedUser;
use crate::state::AppState;

pub(crate) async fn game_ws(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_game_ws(socket, state, user.id))
}

fn close_reason(code: u16) -> &'static str {
    match code {
        WsCloseCode::REPLACED => "replaced by a newer connection",
        WsCloseCode::IDLE_TIMEOUT => "idle timeout",
        WsCloseCode::INTERNAL_ERROR => "internal error",
        _ => "",
    }
}

async fn handle_game_ws(socket: WebSocket, state: AppState, user_id: i64) {
    let (handle, outgoing) = connection(state.config.ws_send_buffer);
    let connection_id = handle.id();
    let (sink, stream) = socket.split();

    let mut writer = tokio::spawn(write_loop(sink, outgoing, state.config.ws_write_timeout));

    state.registry.register(user_id, handle.clone()).await;
    info!(user_id, connection = %connection_id, "WS: connected");

    let reader_finished = tokio::select! {
        _ = read_loop(stream, &handle, &state.config) => true,
        _ = &mut writer => false,
    };
    if reader_finished {
        handle.close(WsCloseCode::NORMAL);
        if let Err(e) = writer.await {
            error!(user_id, connection = %connection_id, error = %e, "WS: writer task failed");
        }
    }

    state.registry.unregister(user_id, connection_id).await;
    info!(user_id, connection = %connection_id, "WS: disconnected");
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outgoing: ConnectionReceiver,
    write_timeout: Duration,
) {
    loop {
        match outgoing.next().await {
            Outgoing::Message(message) => {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(connection = %outgoing.id(), error = %e, "WS: failed to encode frame");
                        continue;
                    }
                };
                match tokio::time::timeout(write_timeout, sink.send(Message::Text(json.into())))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(connection = %outgoing.id(), error = %e, "WS: send failed");
                        return;
                    }
                    Err(_) => {
                        warn!(connection = %outgoing.id(), "WS: write deadline passed, dropping connection");
                        return;
                    }
                }
            }
            Outgoing::Close(code) => {
                let frame = CloseFrame {
                    code,
                    reason: Utf8Bytes::from_static(close_reason(code)),
                };
                let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(Some(frame))))
                    .await;
                return;
            }
        }
    }
}

async fn read_loop(mut stream: SplitStream<WebSocket>, handle: &ConnectionHandle, config: &GameConfig) {
    loop {
        let frame = match tokio::time::timeout(config.ws_read_timeout, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!(connection = %handle.id(), error = %e, "WS: read failed");
                return;
            }
            Ok(None) => return,
            Err(_) => {
                debug!(connection = %handle.id(), "WS: read deadline passed");
                handle.close(WsCloseCode::IDLE_TIMEOUT);
                return;
            }
        };

        match frame {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<WsClientMessage>(text.as_str()) {
                    Ok(WsClientMessage::Ping) => WsServerMessage::Pong,
                    Err(_) => WsServerMessage::Error {
                        code: WsCloseCode::UNSUPPORTED_DATA,
                        reason: "unrecognized message".into(),
                    },
                };
                if !handle.push(reply, config.ws_write_timeout).await {
                    return;
                }
            }
            Message::Close(_) => return,
            // Protocol pings are answered by the socket itself; every frame
            // resets the read deadline.
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reasons() {
        assert_eq!(
            close_reason(WsCloseCode::REPLACED),
            "replaced by a newer connection"
        );
        assert_eq!(close_reason(WsCloseCode::IDLE_TIMEOUT), "idle timeout");
        assert_eq!(close_reason(WsCloseCode::NORMAL), "");
    }
}
