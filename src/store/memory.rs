use async_trait::async_trait;
use dashmap::DashMap;

use super::{StateStore, StoreError};

/// In-process store for tests and single-node runs without Redis.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: DashMap<String, i64>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys written so far
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.values.get(key).map(|v| *v))
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
