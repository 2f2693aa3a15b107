use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};

use crate::redis::{RedisDiagnostics, RedisPool};

use super::{parse_stored_int, StateStore, StoreError};

/// Redis-backed store. Values are plain decimal strings (`SET key "42"`).
pub struct RedisStateStore {
    pool: Arc<RedisPool>,
}

impl RedisStateStore {
    pub fn new(pool: Arc<RedisPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let owned = key.to_string();
        let raw: Option<String> = self
            .pool
            .execute(|mut conn| async move {
                let value: RedisResult<Option<String>> = conn.get(owned).await;
                value
            })
            .await?;

        raw.map(|text| parse_stored_int(key, &text)).transpose()
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let owned = key.to_string();
        self.pool
            .execute(|mut conn| async move {
                let reply: RedisResult<()> = conn.set(owned, value).await;
                reply
            })
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    fn is_healthy(&self) -> bool {
        self.pool.is_healthy()
    }

    fn redis_diagnostics(&self) -> Option<RedisDiagnostics> {
        Some(self.pool.diagnostics())
    }
}
