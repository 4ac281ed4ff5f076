// ABOUTME: WebSocket relay for live chat - channel rooms, messages, typing, presence and reactions
// ABOUTME: Applies inbound events to the shared environment and fans results out through WsHub

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use teamsim_core::{metrics, Message, UserStatus};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::server::ServerState;

// =============================================================================
// WebSocket Messages
// =============================================================================

/// Messages from the client to the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinChannel {
        channel_id: String,
    },
    LeaveChannel {
        channel_id: String,
    },
    SendMessage {
        channel_id: String,
        user_id: String,
        content: String,
    },
    Typing {
        channel_id: String,
        user_id: String,
        user_name: String,
    },
    UpdatePresence {
        user_id: String,
        status: String,
    },
    AddReaction {
        message_id: String,
        channel_id: String,
        reaction: String,
        user_id: String,
    },
}

/// Messages from the server to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    NewMessage {
        message: Message,
    },
    UnreadUpdate {
        channel_id: String,
        count: u32,
    },
    UserTyping {
        user_id: String,
        user_name: String,
    },
    PresenceUpdate {
        user_id: String,
        status: UserStatus,
    },
    ReactionAdded {
        message_id: String,
        reaction: String,
        user_id: String,
    },
    Error {
        message: String,
    },
}

// =============================================================================
// Hub: room-scoped fan-out to connected clients
// =============================================================================

/// A hub message plus its audience
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// Only connections that joined this channel receive it; `None` = everyone
    pub room: Option<String>,
    /// Connection that caused the event and should not see it echoed
    pub exclude: Option<String>,
    pub message: ServerMessage,
}

#[derive(Clone)]
pub struct WsHub {
    sender: broadcast::Sender<Broadcast>,
}

impl WsHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    fn send(&self, broadcast: Broadcast) {
        // Ignore send errors (no receivers connected)
        let _ = self.sender.send(broadcast);
    }

    /// Broadcast a message to all connected clients
    pub fn broadcast(&self, message: ServerMessage) {
        self.send(Broadcast {
            room: None,
            exclude: None,
            message,
        });
    }

    /// Broadcast to clients that joined `room`
    pub fn broadcast_to_room(&self, room: &str, message: ServerMessage) {
        self.send(Broadcast {
            room: Some(room.to_string()),
            exclude: None,
            message,
        });
    }

    /// Broadcast to clients that joined `room`, except `connection_id`
    pub fn broadcast_to_room_except(&self, room: &str, connection_id: &str, message: ServerMessage) {
        self.send(Broadcast {
            room: Some(room.to_string()),
            exclude: Some(connection_id.to_string()),
            message,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.sender.subscribe()
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Connection
// =============================================================================

/// One client connection and the channel rooms it has joined
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    rooms: Arc<Mutex<HashSet<String>>>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rooms: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn join(&self, room: &str) {
        self.rooms.lock().await.insert(room.to_string());
    }

    pub async fn leave(&self, room: &str) {
        self.rooms.lock().await.remove(room);
    }

    pub async fn in_room(&self, room: &str) -> bool {
        self.rooms.lock().await.contains(room)
    }

    /// Whether a hub broadcast should be delivered to this connection
    pub async fn accepts(&self, broadcast: &Broadcast) -> bool {
        if broadcast.exclude.as_deref() == Some(self.id.as_str()) {
            return false;
        }
        match &broadcast.room {
            None => true,
            Some(room) => self.in_room(room).await,
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Event handling
// =============================================================================

/// Apply one inbound event. Effects visible to other clients go through the
/// hub; the returned message (if any) is meant for the sender only.
pub async fn apply_client_message(
    state: &ServerState,
    conn: &Connection,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::JoinChannel { channel_id } => {
            conn.join(&channel_id).await;
            tracing::debug!(connection = %conn.id, channel_id = %channel_id, "Joined channel");
            None
        }
        ClientMessage::LeaveChannel { channel_id } => {
            conn.leave(&channel_id).await;
            tracing::debug!(connection = %conn.id, channel_id = %channel_id, "Left channel");
            None
        }
        ClientMessage::SendMessage {
            channel_id,
            user_id,
            content,
        } => {
            let (message, count) = {
                let mut env = state.env.lock().await;
                if env.channel(&channel_id).is_none() {
                    return Some(ServerMessage::Error {
                        message: format!("Unknown channel: {}", channel_id),
                    });
                }
                let message = env.add_message(&channel_id, &user_id, &content);
                let count = env.current_channel().map(|ch| ch.unread).unwrap_or(0);
                (message, count)
            };
            metrics::record_message("relay");
            tracing::info!(
                connection = %conn.id,
                channel_id = %channel_id,
                user_id = %user_id,
                "Relayed chat message"
            );

            state
                .hub
                .broadcast_to_room(&channel_id, ServerMessage::NewMessage { message });
            state
                .hub
                .broadcast(ServerMessage::UnreadUpdate { channel_id, count });
            None
        }
        ClientMessage::Typing {
            channel_id,
            user_id,
            user_name,
        } => {
            state.hub.broadcast_to_room_except(
                &channel_id,
                &conn.id,
                ServerMessage::UserTyping { user_id, user_name },
            );
            None
        }
        ClientMessage::UpdatePresence { user_id, status } => {
            let status = match status.parse::<UserStatus>() {
                Ok(status) => status,
                Err(e) => {
                    return Some(ServerMessage::Error {
                        message: e.to_string(),
                    })
                }
            };
            let change = state.env.lock().await.set_presence(&user_id, status);
            match change {
                Some(change) => {
                    tracing::debug!(user_id = %change.user_id, status = %change.status, "Presence updated");
                    state.hub.broadcast(ServerMessage::PresenceUpdate {
                        user_id: change.user_id,
                        status: change.status,
                    });
                }
                None => {
                    tracing::debug!(user_id = %user_id, "Presence update for unknown user ignored");
                }
            }
            None
        }
        ClientMessage::AddReaction {
            message_id,
            channel_id,
            reaction,
            user_id,
        } => {
            // Reactions are relayed only; messages keep no reaction state.
            state.hub.broadcast_to_room(
                &channel_id,
                ServerMessage::ReactionAdded {
                    message_id,
                    reaction,
                    user_id,
                },
            );
            None
        }
    }
}

// =============================================================================
// WebSocket Handler
// =============================================================================

/// WebSocket upgrade handler at /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: ServerState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);

    let conn = Connection::new();
    metrics::ws_connection_opened();
    tracing::info!(connection = %conn.id, "Client connected");

    let mut broadcast_rx = state.hub.subscribe();

    // Writer task: sends messages to the client
    let writer_conn = conn.clone();
    let writer_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                // Direct replies (errors for this client)
                Some(msg) = rx.recv() => msg,
                // Broadcast messages (from hub)
                result = broadcast_rx.recv() => match result {
                    Ok(broadcast) => {
                        if !writer_conn.accepts(&broadcast).await {
                            continue;
                        }
                        broadcast.message
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(connection = %writer_conn.id, skipped = n, "Relay client lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize WebSocket message");
                    continue;
                }
            };
            if ws_sink.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader task: reads messages from the client
    let reader_conn = conn.clone();
    let reader_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let parsed: ClientMessage = match serde_json::from_str(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::debug!(error = %e, "Invalid WebSocket message from client");
                            continue;
                        }
                    };
                    if let Some(reply) = apply_client_message(&state, &reader_conn, parsed).await {
                        if tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    run_until_either(writer_task, reader_task).await;

    metrics::ws_connection_closed();
    tracing::info!(connection = %conn.id, "Client disconnected");
}

/// Wait for either task to finish, then abort the other
async fn run_until_either(mut writer: JoinHandle<()>, mut reader: JoinHandle<()>) {
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_join_deserialize() {
        let json = r#"{"type": "join_channel", "channelId": "channel-1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::JoinChannel { channel_id } => assert_eq!(channel_id, "channel-1"),
            _ => panic!("Expected JoinChannel"),
        }
    }

    #[test]
    fn test_client_message_send_deserialize() {
        let json = r#"{"type": "send_message", "channelId": "channel-2", "userId": "user-1", "content": "hi"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SendMessage {
                channel_id,
                user_id,
                content,
            } => {
                assert_eq!(channel_id, "channel-2");
                assert_eq!(user_id, "user-1");
                assert_eq!(content, "hi");
            }
            _ => panic!("Expected SendMessage"),
        }
    }

    #[test]
    fn test_client_message_unknown_type() {
        let json = r#"{"type": "dance", "channelId": "channel-1"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_server_message_serialize_camel_case() {
        let msg = ServerMessage::UnreadUpdate {
            channel_id: "channel-3".to_string(),
            count: 2,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"unread_update\""));
        assert!(json.contains("\"channelId\":\"channel-3\""));
        assert!(json.contains("\"count\":2"));
    }

    #[test]
    fn test_presence_update_serializes_status_lowercase() {
        let msg = ServerMessage::PresenceUpdate {
            user_id: "user-1".to_string(),
            status: UserStatus::Away,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"presence_update\""));
        assert!(json.contains("\"status\":\"away\""));
    }

    #[test]
    fn test_ws_hub_no_receivers_doesnt_panic() {
        let hub = WsHub::new();
        hub.broadcast(ServerMessage::Error {
            message: "nobody listening".to_string(),
        });
    }

    #[tokio::test]
    async fn test_finished_task_aborts_the_other() {
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let stuck = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        let finished = tokio::spawn(async {});

        run_until_either(stuck, finished).await;

        // Sender is dropped without sending once the stuck task is aborted
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), alive_rx).await;
        assert!(matches!(result, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_connection_room_filtering() {
        let conn = Connection::new();
        conn.join("channel-1").await;

        let to_room = Broadcast {
            room: Some("channel-1".to_string()),
            exclude: None,
            message: ServerMessage::Error {
                message: "x".to_string(),
            },
        };
        let other_room = Broadcast {
            room: Some("channel-2".to_string()),
            ..to_room.clone()
        };
        let echoed = Broadcast {
            exclude: Some(conn.id.clone()),
            ..to_room.clone()
        };

        assert!(conn.accepts(&to_room).await);
        assert!(!conn.accepts(&other_room).await);
        assert!(!conn.accepts(&echoed).await);

        conn.leave("channel-1").await;
        assert!(!conn.accepts(&to_room).await);
    }
}
