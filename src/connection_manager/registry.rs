use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::OutboundMessage;

use super::{ConnectionError, ConnectionHandle, ConnectionLimits, ConnectionStats};

/// Owns the user -> connections membership relation.
///
/// A user id is present in the index exactly while it has at least one
/// registered connection. All mutation and enumeration goes through here.
pub struct ConnectionRegistry {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// user_id -> Set<connection_id> (one user may have several devices)
    user_index: DashMap<String, HashSet<Uuid>>,
    limits: ConnectionLimits,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_limits(ConnectionLimits::default())
    }

    pub fn with_limits(limits: ConnectionLimits) -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
            limits,
        }
    }

    /// Register a new connection for `user_id`
    pub fn connect(
        &self,
        user_id: String,
        sender: mpsc::Sender<OutboundMessage>,
    ) -> Result<Arc<ConnectionHandle>, ConnectionError> {
        self.check_limits(&user_id)?;

        let handle = Arc::new(ConnectionHandle::new(user_id, sender));
        let conn_id = handle.id;

        self.connections.insert(conn_id, handle.clone());
        self.user_index
            .entry(handle.user_id.clone())
            .or_default()
            .insert(conn_id);

        tracing::info!(connection_id = %conn_id, user_id = %handle.user_id, "Connection registered");

        Ok(handle)
    }

    /// Remove a connection. Returns `false` if it was already removed.
    pub fn disconnect(&self, connection_id: Uuid) -> bool {
        let Some((_, handle)) = self.connections.remove(&connection_id) else {
            return false;
        };

        if let Some(mut user_conns) = self.user_index.get_mut(&handle.user_id) {
            user_conns.remove(&connection_id);
        }
        // Checked under the shard lock so a concurrent connect is never dropped
        self.user_index
            .remove_if(&handle.user_id, |_, conns| conns.is_empty());

        tracing::info!(connection_id = %connection_id, user_id = %handle.user_id, "Connection unregistered");
        true
    }

    pub fn list_connections(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        let conn_ids: Vec<Uuid> = match self.user_index.get(user_id) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };

        conn_ids
            .iter()
            .filter_map(|id| self.connections.get(id).map(|h| h.clone()))
            .collect()
    }

    /// Snapshot of every user id with at least one live connection
    pub fn user_ids(&self) -> Vec<String> {
        self.user_index.iter().map(|e| e.key().clone()).collect()
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.user_index.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.user_index.contains_key(user_id)
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.connections.len(),
            unique_users: self.user_index.len(),
        }
    }

    fn check_limits(&self, user_id: &str) -> Result<(), ConnectionError> {
        let max = self.limits.max_connections;
        let current = self.connections.len();
        if max > 0 && current >= max {
            return Err(ConnectionError::TotalLimitExceeded { current, max });
        }

        let max = self.limits.max_connections_per_user;
        let current = self.connection_count(user_id);
        if max > 0 && current >= max {
            return Err(ConnectionError::UserLimitExceeded {
                user_id: user_id.to_string(),
                current,
                max,
            });
        }

        Ok(())
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> mpsc::Sender<OutboundMessage> {
        mpsc::channel(8).0
    }

    #[test]
    fn test_first_connection_creates_entry() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.contains_user("alice"));

        let handle = registry.connect("alice".to_string(), sender()).unwrap();
        assert!(registry.contains_user("alice"));
        assert_eq!(handle.user_id, "alice");
        assert_eq!(registry.list_connections("alice").len(), 1);
    }

    #[test]
    fn test_entry_removed_with_last_connection() {
        let registry = ConnectionRegistry::new();
        let first = registry.connect("alice".to_string(), sender()).unwrap();
        let second = registry.connect("alice".to_string(), sender()).unwrap();
        assert_eq!(registry.connection_count("alice"), 2);

        assert!(registry.disconnect(first.id));
        assert!(registry.contains_user("alice"));
        assert_eq!(registry.list_connections("alice")[0].id, second.id);

        assert!(registry.disconnect(second.id));
        assert!(!registry.contains_user("alice"));
        assert!(registry.user_ids().is_empty());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let handle = registry.connect("alice".to_string(), sender()).unwrap();

        assert!(registry.disconnect(handle.id));
        assert!(!registry.disconnect(handle.id));
        assert_eq!(registry.stats().total_connections, 0);
    }

    #[test]
    fn test_handles_are_unique() {
        let registry = ConnectionRegistry::new();
        let a = registry.connect("alice".to_string(), sender()).unwrap();
        let b = registry.connect("alice".to_string(), sender()).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_stats_and_user_ids() {
        let registry = ConnectionRegistry::new();
        registry.connect("alice".to_string(), sender()).unwrap();
        registry.connect("alice".to_string(), sender()).unwrap();
        registry.connect("bob".to_string(), sender()).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total_connections, 3);
        assert_eq!(stats.unique_users, 2);

        let mut users = registry.user_ids();
        users.sort();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_per_user_limit() {
        let registry = ConnectionRegistry::with_limits(ConnectionLimits {
            max_connections: 0,
            max_connections_per_user: 1,
        });
        registry.connect("alice".to_string(), sender()).unwrap();

        let err = registry.connect("alice".to_string(), sender()).unwrap_err();
        assert!(matches!(err, ConnectionError::UserLimitExceeded { max: 1, .. }));
        assert!(registry.connect("bob".to_string(), sender()).is_ok());
    }

    #[test]
    fn test_total_limit() {
        let registry = ConnectionRegistry::with_limits(ConnectionLimits {
            max_connections: 2,
            max_connections_per_user: 0,
        });
        registry.connect("a".to_string(), sender()).unwrap();
        registry.connect("b".to_string(), sender()).unwrap();

        let err = registry.connect("c".to_string(), sender()).unwrap_err();
        assert_eq!(err, ConnectionError::TotalLimitExceeded { current: 2, max: 2 });
        assert!(!registry.contains_user("c"));
    }

    #[test]
    fn test_concurrent_connect_disconnect() {
        let registry = Arc::new(ConnectionRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let user = format!("user-{}", i % 2);
                        let handle = registry.connect(user, mpsc::channel(1).0).unwrap();
                        let _ = registry.user_ids();
                        assert!(registry.disconnect(handle.id));
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(
            registry.stats(),
            ConnectionStats {
                total_connections: 0,
                unique_users: 0,
            }
        );
    }
}
