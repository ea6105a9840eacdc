//! WebSocket subscriber connection
//!
//! One `snapshot` first, then every `patch` published after it. A client that
//! lags behind the broadcast buffer, or asks with `{"op":"resync"}`, gets a
//! fresh snapshot and a fresh receiver taken together by the state actor.

use axum::extract::ws::{Message, WebSocket};
use tracing::{debug, warn};

use crate::broadcast::Subscription;
use crate::protocol::{ClientMessage, SyncMessage};
use crate::state::StateActorHandle;

pub(super) async fn handle_socket(mut socket: WebSocket, state: StateActorHandle) {
    let mut rx = match resubscribe(&mut socket, &state).await {
        Some(rx) => rx,
        None => return,
    };
    debug!("WebSocket subscriber connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(message) => {
                        if send(&mut socket, &message).await.is_err() {
                            debug!("WebSocket subscriber disconnected");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket subscriber lagged by {} messages, resyncing", n);
                        match resubscribe(&mut socket, &state).await {
                            Some(fresh) => rx = fresh,
                            None => break,
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientMessage::Resync) = serde_json::from_str(&text) {
                            debug!("WebSocket subscriber requested resync");
                            match resubscribe(&mut socket, &state).await {
                                Some(fresh) => rx = fresh,
                                None => break,
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket subscriber closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

/// Take a snapshot + receiver pair and send the snapshot
///
/// Returns `None` if the actor is gone or the socket is closed.
async fn resubscribe(socket: &mut WebSocket, state: &StateActorHandle) -> Option<Subscription> {
    let (snapshot, rx) = match state.subscribe().await {
        Ok(pair) => pair,
        Err(e) => {
            warn!("Cannot register subscriber: {}", e);
            return None;
        }
    };
    send(socket, &snapshot).await.ok()?;
    Some(rx)
}

async fn send(socket: &mut WebSocket, message: &SyncMessage) -> Result<(), axum::Error> {
    let text = match message.to_json() {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize sync message: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}
