use std::sync::Arc;

use crate::game::{UserState, DEFAULT_COUNTER, DEFAULT_ENERGY, DEFAULT_INCREMENT};

use super::{StateStore, StoreError};

/// The three keys holding one user's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    pub counter: String,
    pub energy: String,
    pub increment: String,
}

impl StateKeys {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            counter: format!("{}_counter", user_id),
            energy: format!("{}_energy", user_id),
            increment: format!("{}_increment", user_id),
        }
    }
}

/// Typed access to per-user state on top of a raw [`StateStore`].
///
/// Absent keys read as their defaults and are not written back until the
/// first mutation.
#[derive(Clone)]
pub struct UserStateRepository {
    store: Arc<dyn StateStore>,
}

impl UserStateRepository {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub async fn get_int(&self, key: &str, default: i64) -> Result<i64, StoreError> {
        Ok(self.store.get(key).await?.unwrap_or(default))
    }

    pub async fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.store.set(key, value).await
    }

    pub async fn load(&self, user_id: &str) -> Result<UserState, StoreError> {
        let keys = StateKeys::for_user(user_id);
        let counter = self.get_int(&keys.counter, DEFAULT_COUNTER).await?;
        let energy = self.get_int(&keys.energy, DEFAULT_ENERGY).await?;
        let increment = self.get_int(&keys.increment, DEFAULT_INCREMENT).await?;

        Ok(UserState::from_stored(counter, energy, increment))
    }

    pub async fn save_counter_energy(
        &self,
        user_id: &str,
        state: &UserState,
    ) -> Result<(), StoreError> {
        let keys = StateKeys::for_user(user_id);
        self.set_int(&keys.counter, state.counter).await?;
        self.set_int(&keys.energy, state.energy).await
    }

    pub async fn save_increment(&self, user_id: &str, increment: i64) -> Result<(), StoreError> {
        let keys = StateKeys::for_user(user_id);
        self.set_int(&keys.increment, increment).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;

    fn repository() -> (UserStateRepository, Arc<MemoryStateStore>) {
        let store = Arc::new(MemoryStateStore::new());
        (UserStateRepository::new(store.clone()), store)
    }

    #[test]
    fn test_key_layout() {
        let keys = StateKeys::for_user("42");
        assert_eq!(keys.counter, "42_counter");
        assert_eq!(keys.energy, "42_energy");
        assert_eq!(keys.increment, "42_increment");
    }

    #[tokio::test]
    async fn test_load_defaults_without_writing() {
        let (repo, store) = repository();
        let state = repo.load("new-user").await.unwrap();

        assert_eq!(state, UserState::default());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (repo, store) = repository();
        let state = UserState {
            counter: 12,
            energy: 40,
            increment: 1,
        };
        repo.save_counter_energy("bob", &state).await.unwrap();
        repo.save_increment("bob", 4).await.unwrap();

        assert_eq!(store.get("bob_counter").await.unwrap(), Some(12));
        assert_eq!(store.get("bob_energy").await.unwrap(), Some(40));

        let loaded = repo.load("bob").await.unwrap();
        assert_eq!(loaded.counter, 12);
        assert_eq!(loaded.energy, 40);
        assert_eq!(loaded.increment, 4);
    }

    #[tokio::test]
    async fn test_load_clamps_corrupted_values() {
        let (repo, store) = repository();
        store.set("eve_counter", -5).await.unwrap();
        store.set("eve_energy", 250).await.unwrap();
        store.set("eve_increment", 0).await.unwrap();

        let state = repo.load("eve").await.unwrap();
        assert_eq!(state.counter, 0);
        assert_eq!(state.energy, 100);
        assert_eq!(state.increment, 1);
    }
}
