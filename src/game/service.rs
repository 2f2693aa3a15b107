use std::sync::Arc;

use crate::store::{StateStore, StoreError, UserStateRepository};

use super::{normalize_increment, UserLockGuard, UserLocks, UserState};

/// Applies clicks, increment changes and ticks to persisted user state.
///
/// Every mutation runs under the user's lock, so for a given user the
/// load-apply-save sequences never interleave.
pub struct StateService {
    repository: UserStateRepository,
    locks: UserLocks,
}

impl StateService {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            repository: UserStateRepository::new(store),
            locks: UserLocks::new(),
        }
    }

    pub fn repository(&self) -> &UserStateRepository {
        &self.repository
    }

    /// Current state without mutating anything
    pub async fn snapshot(&self, user_id: &str) -> Result<UserState, StoreError> {
        let (state, _guard) = self.snapshot_locked(user_id).await?;
        Ok(state)
    }

    /// Load the state and keep the user's lock. No click, increment change
    /// or tick for the user completes until the guard is dropped.
    pub async fn snapshot_locked(
        &self,
        user_id: &str,
    ) -> Result<(UserState, UserLockGuard<'_>), StoreError> {
        let guard = self.locks.lock(user_id).await;
        let state = self.repository.load(user_id).await?;
        Ok((state, guard))
    }

    pub async fn click(&self, user_id: &str, value: i64) -> Result<UserState, StoreError> {
        let _guard = self.locks.lock(user_id).await;

        let mut state = self.repository.load(user_id).await?;
        state.apply_click(value);
        debug_assert!(state.holds_invariants());
        self.repository.save_counter_energy(user_id, &state).await?;

        Ok(state)
    }

    /// Persist a new increment, returning the value actually stored.
    pub async fn set_increment(&self, user_id: &str, value: i64) -> Result<i64, StoreError> {
        let _guard = self.locks.lock(user_id).await;

        let increment = normalize_increment(value);
        self.repository.save_increment(user_id, increment).await?;

        Ok(increment)
    }

    pub async fn tick(&self, user_id: &str) -> Result<UserState, StoreError> {
        let _guard = self.locks.lock(user_id).await;

        let mut state = self.repository.load(user_id).await?;
        state.apply_tick();
        debug_assert!(state.holds_invariants());
        self.repository.save_counter_energy(user_id, &state).await?;

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;

    fn service() -> Arc<StateService> {
        Arc::new(StateService::new(Arc::new(MemoryStateStore::new())))
    }

    #[tokio::test]
    async fn test_snapshot_defaults() {
        let service = service();
        assert_eq!(service.snapshot("u1").await.unwrap(), UserState::default());
    }

    #[tokio::test]
    async fn test_click_persists() {
        let service = service();
        let state = service.click("u1", 10).await.unwrap();
        assert_eq!(state.counter, 10);
        assert_eq!(state.energy, 90);

        let reloaded = service.snapshot("u1").await.unwrap();
        assert_eq!(reloaded, state);
    }

    #[tokio::test]
    async fn test_increment_applies_on_tick() {
        let service = service();
        assert_eq!(service.set_increment("u1", 5).await.unwrap(), 5);

        let state = service.tick("u1").await.unwrap();
        assert_eq!(state.counter, 5);
        assert_eq!(state.energy, 100);
        assert_eq!(state.increment, 5);
    }

    #[tokio::test]
    async fn test_set_increment_below_minimum() {
        let service = service();
        assert_eq!(service.set_increment("u1", 0).await.unwrap(), 1);
        assert_eq!(service.snapshot("u1").await.unwrap().increment, 1);
    }

    #[tokio::test]
    async fn test_tick_waits_for_snapshot_guard() {
        let service = service();
        let (state, guard) = service.snapshot_locked("u1").await.unwrap();
        assert_eq!(state.counter, 0);

        let ticker = service.clone();
        let tick = tokio::spawn(async move { ticker.tick("u1").await.unwrap() });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!tick.is_finished());

        drop(guard);
        assert_eq!(tick.await.unwrap().counter, 1);
    }

    #[tokio::test]
    async fn test_concurrent_clicks_and_ticks_lose_nothing() {
        let service = service();
        let mut handles = Vec::new();

        for _ in 0..50 {
            let clicker = service.clone();
            handles.push(tokio::spawn(async move {
                clicker.click("u1", 1).await.unwrap();
            }));
            let ticker = service.clone();
            handles.push(tokio::spawn(async move {
                ticker.tick("u1").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 50 clicks of 1 plus 50 ticks of increment 1
        assert_eq!(service.snapshot("u1").await.unwrap().counter, 100);
    }
}
