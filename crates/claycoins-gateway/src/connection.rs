use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use claycoins_engine::{ChatCoordinator, Engine, EngineError};
use claycoins_types::api::MessageContainer;

use crate::GatewayConfig;
use crate::session::{CloseReason, Session};

/// Run one chat socket until it closes.
///
/// Outbound: the replay buffer, then every message the hub publishes.
/// Inbound: each text frame is a post attempt, handed to the chat
/// coordinator. Nothing that happens here can affect other sessions.
pub async fn handle_connection(socket: WebSocket, engine: Engine, config: GatewayConfig) {
    let mut session = Session::new();
    let session_id = session.id();
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = engine.hub.subscribe();
    session.open();
    info!("Session {} connected to chat", session_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward hub messages -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
        heartbeat.tick().await;

        let reason = loop {
            tokio::select! {
                next = subscription.recv() => {
                    let Some(message) = next else {
                        break CloseReason::Evicted;
                    };
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Session {} failed to encode message {}: {}", session_id, message.message_id, e);
                            break CloseReason::Fault;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break CloseReason::Disconnected;
                    }
                }
                _ = heartbeat.tick() => {
                    if !pong_flag_send.swap(false, Ordering::AcqRel) {
                        break CloseReason::HeartbeatTimeout;
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break CloseReason::Disconnected;
                    }
                }
            }
        };

        // Tell the client why, when the server is the one hanging up
        if let Some(frame) = close_frame(reason) {
            let _ = sender.send(Message::Close(Some(frame))).await;
        }
        reason
    });

    // Read post attempts from client
    let chat = engine.chat.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => handle_post(&chat, session_id, &text).await,
                Ok(Message::Pong(_)) => pong_flag_recv.store(true, Ordering::Release),
                Ok(Message::Close(_)) => return CloseReason::ClientClosed,
                Ok(_) => {}
                Err(e) => {
                    debug!("Session {} read error: {}", session_id, e);
                    return CloseReason::Disconnected;
                }
            }
        }
        CloseReason::Disconnected
    });

    // Whichever side ends first takes the other down with it
    let outcome = tokio::select! {
        res = &mut send_task => { recv_task.abort(); res }
        res = &mut recv_task => { send_task.abort(); res }
    };
    let reason = outcome.unwrap_or_else(|e| {
        warn!("Session {} task failed: {}", session_id, e);
        CloseReason::Fault
    });

    session.close(reason);
    session.finish();
    info!("Session {} disconnected from chat", session_id);
}

async fn handle_post(chat: &ChatCoordinator, session_id: Uuid, text: &str) {
    let post = match serde_json::from_str::<MessageContainer>(text) {
        Ok(post) => post,
        Err(e) => {
            warn!(
                "Session {} bad frame: {} -- raw: {}",
                session_id,
                e,
                truncate(text, 200)
            );
            return;
        }
    };

    match chat.post_message(post.token.as_str(), &post.content).await {
        Ok(message) => debug!("Session {} posted message {}", session_id, message.message_id),
        Err(EngineError::PersistenceUnavailable { op }) => {
            warn!("Session {} post dropped, storage unavailable during {}", session_id, op)
        }
        Err(e) => debug!("Session {} post rejected: {}", session_id, e),
    }
}

fn close_frame(reason: CloseReason) -> Option<CloseFrame> {
    let code = match reason {
        CloseReason::HeartbeatTimeout => close_code::AWAY,
        CloseReason::Evicted => close_code::AGAIN,
        CloseReason::Fault => close_code::ERROR,
        CloseReason::ClientClosed | CloseReason::Disconnected => return None,
    };
    Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    })
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_side_closes_carry_a_frame() {
        let frame = close_frame(CloseReason::HeartbeatTimeout).unwrap();
        assert_eq!(frame.code, close_code::AWAY);
        assert_eq!(frame.reason.as_str(), "heartbeat timeout");
        assert!(close_frame(CloseReason::ClientClosed).is_none());
        assert!(close_frame(CloseReason::Disconnected).is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
