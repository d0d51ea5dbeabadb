use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    builtins::BuiltinKvStore,
    storage::{
        adapters::StorageAdapter,
        registry::{StorageAdapterFuture, register_adapter},
    },
};

pub struct KvStoreAdapter {
    storage: BuiltinKvStore,
}

impl KvStoreAdapter {
    pub fn new(config: Option<Value>) -> Self {
        let storage = BuiltinKvStore::new(config);
        Self { storage }
    }
}

impl Default for KvStoreAdapter {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl StorageAdapter for KvStoreAdapter {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.storage.get(key).await)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.storage.set(key, value.to_string()).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        self.storage.delete(key).await;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
        self.storage.sadd(key, member.to_string()).await;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
        self.storage.srem(key, member).await;
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> anyhow::Result<bool> {
        Ok(self.storage.sismember(key, member).await)
    }

    async fn smembers(&self, key: &str) -> anyhow::Result<HashSet<String>> {
        Ok(self.storage.smembers(key).await)
    }

    async fn smembers_all(&self, keys: &[String]) -> anyhow::Result<Vec<HashSet<String>>> {
        Ok(self.storage.smembers_all(keys).await)
    }

    async fn del_by_prefix(&self, prefix: &str) -> anyhow::Result<usize> {
        let removed = self.storage.delete_by_prefix(prefix).await;
        tracing::debug!(prefix = %prefix, removed = removed, "Deleted keys by prefix");
        Ok(removed)
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        tracing::debug!("Destroying KvStoreAdapter");
        self.storage.shutdown();
        Ok(())
    }
}

fn make_adapter(config: Option<Value>) -> StorageAdapterFuture {
    Box::pin(async move { Ok(Arc::new(KvStoreAdapter::new(config)) as Arc<dyn StorageAdapter>) })
}

register_adapter!("tabs::storage::KvStore", make_adapter);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_kv_store_adapter_strings() {
        let adapter = KvStoreAdapter::default();

        adapter.set("key", "value").await.unwrap();
        assert_eq!(adapter.get("key").await.unwrap(), Some("value".to_string()));

        adapter.del("key").await.unwrap();
        assert_eq!(adapter.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_kv_store_adapter_smembers_all() {
        let adapter = KvStoreAdapter::default();
        adapter.sadd("bucket:1", "t1").await.unwrap();
        adapter.sadd("bucket:1", "t2").await.unwrap();
        adapter.sadd("bucket:3", "t2").await.unwrap();

        let keys: Vec<String> = (1..=3).map(|i| format!("bucket:{}", i)).collect();
        let sets = adapter.smembers_all(&keys).await.unwrap();

        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].len(), 2);
        assert!(sets[1].is_empty());
        assert!(sets[2].contains("t2"));
    }

    #[tokio::test]
    async fn test_kv_store_adapter_del_by_prefix_without_matches() {
        let adapter = KvStoreAdapter::default();
        assert_eq!(adapter.del_by_prefix("stat:task:nothing").await.unwrap(), 0);
    }
}
