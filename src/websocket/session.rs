use std::sync::Arc;

use crate::connection_manager::{ConnectionHandle, ConnectionRegistry};
use crate::game::{StateService, UserState};
use crate::metrics::{StoreMetrics, WsMessageMetrics};
use crate::store::StoreError;

use super::message::{ClientAction, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Registered, snapshot not yet sent
    Connecting,
    /// Snapshot sent, processing inbound actions
    Active,
    Closed,
}

/// Protocol state for one connection.
///
/// Inbound frames are handled one at a time by the owner of the session, so
/// actions from a single connection are applied in arrival order. Dropping
/// the session unregisters the connection if `close` was never reached.
pub struct Session {
    handle: Arc<ConnectionHandle>,
    registry: Arc<ConnectionRegistry>,
    service: Arc<StateService>,
    phase: SessionPhase,
}

impl Session {
    pub fn new(
        handle: Arc<ConnectionHandle>,
        registry: Arc<ConnectionRegistry>,
        service: Arc<StateService>,
    ) -> Self {
        Self {
            handle,
            registry,
            service,
            phase: SessionPhase::Connecting,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Send the initial snapshot and become active.
    ///
    /// The user's lock is held from the load until the handle is active, so
    /// a concurrent tick is either part of the snapshot or broadcast after it.
    pub async fn open(&mut self) -> Result<UserState, StoreError> {
        let service = self.service.clone();
        let user_id = self.handle.user_id.clone();
        let (state, guard) = service.snapshot_locked(&user_id).await?;

        if self
            .handle
            .send(ServerMessage::snapshot(user_id, &state))
            .await
            .is_err()
        {
            tracing::debug!(connection_id = %self.handle.id, "Writer gone before snapshot");
        }

        self.handle.activate();
        drop(guard);

        self.phase = SessionPhase::Active;
        Ok(state)
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed frames and unknown actions are dropped without a reply, as
    /// are actions whose state update fails in the store. Returns the reply
    /// queued for this connection, if any.
    pub async fn handle_text(&self, text: &str) -> Option<ServerMessage> {
        if self.phase != SessionPhase::Active {
            return None;
        }

        match ClientAction::decode(text) {
            Ok(action) => self.handle_action(action).await,
            Err(e) => {
                WsMessageMetrics::record_ignored();
                tracing::debug!(connection_id = %self.handle.id, error = %e, "Ignoring client message");
                None
            }
        }
    }

    #[tracing::instrument(
        name = "ws.action",
        skip_all,
        fields(
            connection_id = %self.handle.id,
            user_id = %self.handle.user_id,
            action = action.name()
        )
    )]
    async fn handle_action(&self, action: ClientAction) -> Option<ServerMessage> {
        WsMessageMetrics::record_action(action.name());
        let user_id = &self.handle.user_id;

        let result = match action {
            ClientAction::Increment { value } => self
                .service
                .click(user_id, value)
                .await
                .map(|state| ServerMessage::click(&state)),
            ClientAction::SetIncrement {
                new_increment_value,
            } => self
                .service
                .set_increment(user_id, new_increment_value)
                .await
                .map(ServerMessage::increment_set),
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                StoreMetrics::record_error("action");
                tracing::warn!(error = %e, "State update failed, action dropped");
                return None;
            }
        };

        if self.handle.send(reply.clone()).await.is_err() {
            tracing::debug!("Writer gone, reply dropped");
        }
        Some(reply)
    }

    /// Move to `Closed` and unregister. Only the first call unregisters.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        self.registry.disconnect(self.handle.id)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use crate::websocket::OutboundMessage;
    use tokio::sync::mpsc;

    struct Fixture {
        session: Session,
        registry: Arc<ConnectionRegistry>,
        rx: mpsc::Receiver<OutboundMessage>,
    }

    fn fixture(user_id: &str) -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let service = Arc::new(StateService::new(Arc::new(MemoryStateStore::new())));
        let (tx, rx) = mpsc::channel(16);
        let handle = registry.connect(user_id.to_string(), tx).unwrap();

        Fixture {
            session: Session::new(handle, registry.clone(), service),
            registry,
            rx,
        }
    }

    fn raw(message: OutboundMessage) -> ServerMessage {
        match message {
            OutboundMessage::Raw(m) => m,
            OutboundMessage::Preserialized(text) => serde_json::from_str(&text).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_open_sends_default_snapshot() {
        let mut f = fixture("alice");
        assert_eq!(f.session.phase(), SessionPhase::Connecting);

        assert!(!f.session.handle().is_active());
        f.session.open().await.unwrap();
        assert_eq!(f.session.phase(), SessionPhase::Active);
        assert!(f.session.handle().is_active());

        let snapshot = raw(f.rx.recv().await.unwrap());
        assert_eq!(
            snapshot,
            ServerMessage::Snapshot {
                counter: 0,
                energy: 100,
                increment_value: 1,
                user_id: "alice".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_actions_ignored_before_open() {
        let f = fixture("alice");
        assert!(f
            .session
            .handle_text(r#"{"action":"increment"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_click_reply_goes_to_connection() {
        let mut f = fixture("alice");
        f.session.open().await.unwrap();
        f.rx.recv().await.unwrap();

        let reply = f
            .session
            .handle_text(r#"{"action":"increment","value":10}"#)
            .await;
        assert_eq!(
            reply,
            Some(ServerMessage::ClickResult {
                counter: 10,
                energy: 90
            })
        );
        assert_eq!(raw(f.rx.recv().await.unwrap()), reply.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_messages_are_silent() {
        let mut f = fixture("alice");
        f.session.open().await.unwrap();
        f.rx.recv().await.unwrap();

        for text in ["garbage", r#"{"action":"jump"}"#, r#"{"value":1}"#, "[]"] {
            assert!(f.session.handle_text(text).await.is_none());
        }
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_unregisters_once() {
        let mut f = fixture("alice");
        assert!(f.registry.contains_user("alice"));

        assert!(f.session.close());
        assert!(!f.registry.contains_user("alice"));
        assert!(!f.session.close());
        assert_eq!(f.session.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let f = fixture("alice");
        let registry = f.registry.clone();
        drop(f);
        assert!(!registry.contains_user("alice"));
    }
}
