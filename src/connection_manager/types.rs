//! Connection handle and related types

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::WebSocketConfig;
use crate::websocket::{OutboundMessage, ServerMessage};

/// Handle for a single WebSocket connection.
///
/// Only identifies the connection and reaches its writer task; membership
/// is owned by the registry. A handle stays inactive until its snapshot has
/// been queued, and broadcasts skip inactive handles.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub user_id: String,
    pub sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
    active: AtomicBool,
}

impl ConnectionHandle {
    pub fn new(user_id: String, sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            sender,
            connected_at: Utc::now(),
            active: AtomicBool::new(false),
        }
    }

    /// Mark the snapshot as queued; broadcasts reach this handle from now on
    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Queue a message for this connection's writer task
    pub async fn send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<OutboundMessage>> {
        self.sender.send(OutboundMessage::Raw(message)).await
    }

    /// Queue an already serialized message (fan-out path)
    pub async fn send_preserialized(
        &self,
        message: OutboundMessage,
    ) -> Result<(), mpsc::error::SendError<OutboundMessage>> {
        self.sender.send(message).await
    }

    /// Whether the writer task has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Total connection limit exceeded ({current}/{max})")]
    TotalLimitExceeded { current: usize, max: usize },

    #[error("User {user_id} connection limit exceeded ({current}/{max})")]
    UserLimitExceeded {
        user_id: String,
        current: usize,
        max: usize,
    },
}

/// Connection caps; zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub max_connections: usize,
    pub max_connections_per_user: usize,
}

impl From<&WebSocketConfig> for ConnectionLimits {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            max_connections_per_user: config.max_connections_per_user,
        }
    }
}
