use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde_json::Value;
use tokio::{sync::Mutex, time::timeout};

use crate::storage::{
    adapters::StorageAdapter,
    registry::{StorageAdapterFuture, register_adapter},
};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_REDIS_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisAdapter {
    publisher: Arc<Mutex<ConnectionManager>>,
}

impl RedisAdapter {
    pub async fn new(redis_url: String) -> anyhow::Result<Self> {
        let client = Client::open(redis_url.as_str())?;
        let manager = timeout(
            DEFAULT_REDIS_CONNECTION_TIMEOUT,
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Redis connection timed out after {:?}. Please ensure Redis is running at: {}",
                DEFAULT_REDIS_CONNECTION_TIMEOUT,
                redis_url
            )
        })?
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis at {}: {}", redis_url, e))?;

        let publisher = Arc::new(Mutex::new(manager));
        Ok(Self { publisher })
    }
}

#[async_trait]
impl StorageAdapter for RedisAdapter {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.publisher.lock().await;
        let value = conn.get::<_, Option<String>>(key).await.inspect_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to get value from Redis");
        })?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut conn = self.publisher.lock().await;
        conn.set::<_, _, ()>(key, value).await.inspect_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to set value in Redis");
        })?;
        tracing::debug!(key = %key, "Value set in Redis");
        Ok(())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.publisher.lock().await;
        conn.del::<_, ()>(key).await.inspect_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to delete key from Redis");
        })?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
        let mut conn = self.publisher.lock().await;
        conn.sadd::<_, _, ()>(key, member).await.inspect_err(|e| {
            tracing::error!(
                error = %e,
                key = %key,
                member = %member,
                "Failed to add set member in Redis"
            );
        })?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
        let mut conn = self.publisher.lock().await;
        conn.srem::<_, _, ()>(key, member).await.inspect_err(|e| {
            tracing::error!(
                error = %e,
                key = %key,
                member = %member,
                "Failed to remove set member in Redis"
            );
        })?;
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> anyhow::Result<bool> {
        let mut conn = self.publisher.lock().await;
        let is_member = conn.sismember::<_, _, bool>(key, member).await?;
        Ok(is_member)
    }

    async fn smembers(&self, key: &str) -> anyhow::Result<HashSet<String>> {
        let mut conn = self.publisher.lock().await;
        let members = conn.smembers::<_, HashSet<String>>(key).await?;
        Ok(members)
    }

    async fn smembers_all(&self, keys: &[String]) -> anyhow::Result<Vec<HashSet<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.smembers(key);
        }

        let mut conn = self.publisher.lock().await;
        let sets: Vec<HashSet<String>> = pipe.query_async(&mut *conn).await.inspect_err(|e| {
            tracing::error!(error = %e, keys = keys.len(), "Failed to read sets from Redis");
        })?;
        Ok(sets)
    }

    async fn del_by_prefix(&self, prefix: &str) -> anyhow::Result<usize> {
        let mut conn = self.publisher.lock().await;
        let pattern = format!("{}*", escape_glob(prefix));

        let keys = conn.keys::<_, Vec<String>>(pattern).await.inspect_err(|e| {
            tracing::error!(error = %e, prefix = %prefix, "Failed to list keys from Redis");
        })?;
        if keys.is_empty() {
            return Ok(0);
        }

        let removed = conn.del::<_, usize>(&keys).await?;
        tracing::debug!(prefix = %prefix, removed = removed, "Deleted keys by prefix from Redis");
        Ok(removed)
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        tracing::debug!("Destroying RedisAdapter");
        Ok(())
    }
}

/// Escapes the characters KEYS treats as glob syntax.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn make_adapter(config: Option<Value>) -> StorageAdapterFuture {
    Box::pin(async move {
        let redis_url = config
            .as_ref()
            .and_then(|c| c.get("redis_url"))
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_REDIS_URL)
            .to_string();
        Ok(Arc::new(RedisAdapter::new(redis_url).await?) as Arc<dyn StorageAdapter>)
    })
}

register_adapter!("tabs::storage::RedisAdapter", make_adapter);
