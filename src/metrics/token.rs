// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{
    error::{Result, TabsError},
    metrics::{EventType, bucket_key, task_prefix},
    resolution::Resolution,
    storage::StorageAdapter,
};

/// Handle on one tracked instance of a task. Compared and hashed by id only.
#[derive(Clone)]
pub struct Token {
    id: String,
    task_key: String,
    storage: Arc<dyn StorageAdapter>,
}

impl Token {
    pub fn new(
        id: impl Into<String>,
        task_key: impl Into<String>,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        Self {
            id: id.into(),
            task_key: task_key.into(),
            storage,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task_key(&self) -> &str {
        &self.task_key
    }

    /// Set of every token id ever started for `task_key`.
    pub fn index_key(task_key: &str) -> String {
        format!("{}:tokens", task_prefix(task_key))
    }

    pub fn time_key(&self, event: EventType) -> String {
        format!("{}:{}:{}_time", task_prefix(&self.task_key), self.id, event)
    }

    pub async fn start(&self, timestamp: DateTime<Utc>, resolutions: &[Resolution]) -> Result<()> {
        self.store_time(EventType::Started, timestamp).await?;
        self.storage
            .sadd(&Self::index_key(&self.task_key), &self.id)
            .await?;
        self.register(EventType::Started, timestamp, resolutions).await
    }

    /// Fails with [`TabsError::UnstartedTask`] without writing anything when the
    /// token has no recorded start.
    pub async fn complete(
        &self,
        timestamp: DateTime<Utc>,
        resolutions: &[Resolution],
    ) -> Result<()> {
        if self.started_time().await?.is_none() {
            return Err(TabsError::UnstartedTask {
                task: self.task_key.clone(),
                token: self.id.clone(),
            });
        }

        self.store_time(EventType::Completed, timestamp).await?;
        self.register(EventType::Completed, timestamp, resolutions).await
    }

    pub async fn started_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.load_time(EventType::Started).await
    }

    pub async fn completed_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.load_time(EventType::Completed).await
    }

    pub async fn time_elapsed_in_seconds(&self) -> Result<f64> {
        let started = self
            .started_time()
            .await?
            .ok_or_else(|| self.incomplete("started"))?;
        let completed = self
            .completed_time()
            .await?
            .ok_or_else(|| self.incomplete("completed"))?;

        Ok((completed - started).num_milliseconds() as f64 / 1000.0)
    }

    pub async fn time_elapsed(&self, resolution: Resolution) -> Result<f64> {
        let seconds = self.time_elapsed_in_seconds().await?;
        Ok(resolution.from_seconds(seconds))
    }

    async fn register(
        &self,
        event: EventType,
        timestamp: DateTime<Utc>,
        resolutions: &[Resolution],
    ) -> Result<()> {
        for resolution in resolutions {
            let key = bucket_key(&self.task_key, *resolution, timestamp, event);
            self.storage.sadd(&key, &self.id).await?;
        }
        Ok(())
    }

    async fn store_time(&self, event: EventType, timestamp: DateTime<Utc>) -> Result<()> {
        let value = timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        self.storage.set(&self.time_key(event), &value).await?;
        Ok(())
    }

    async fn load_time(&self, event: EventType) -> Result<Option<DateTime<Utc>>> {
        let key = self.time_key(event);
        let Some(raw) = self.storage.get(&key).await? else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid timestamp '{}' stored at {}: {}", raw, key, e))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    fn incomplete(&self, missing: &'static str) -> TabsError {
        TabsError::IncompleteToken {
            task: self.task_key.clone(),
            token: self.id.clone(),
            missing,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("task_key", &self.task_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::storage::KvStoreAdapter;

    fn storage() -> Arc<dyn StorageAdapter> {
        Arc::new(KvStoreAdapter::default())
    }

    fn day0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_start_registers_token_in_every_resolution() {
        let storage = storage();
        let token = Token::new("t1", "signup", storage.clone());
        token
            .start(day0(), &[Resolution::Hour, Resolution::Day])
            .await
            .unwrap();

        assert!(
            storage
                .sismember("stat:task:signup:started:hour:2024-01-01-09", "t1")
                .await
                .unwrap()
        );
        assert!(
            storage
                .sismember("stat:task:signup:started:day:2024-01-01", "t1")
                .await
                .unwrap()
        );
        assert!(storage.sismember("stat:task:signup:tokens", "t1").await.unwrap());
        assert_eq!(token.started_time().await.unwrap(), Some(day0()));
    }

    #[tokio::test]
    async fn test_complete_without_start_fails_and_writes_nothing() {
        let storage = storage();
        let token = Token::new("ghost", "signup", storage.clone());

        let err = token.complete(day0(), &[Resolution::Day]).await.unwrap_err();
        assert!(matches!(
            err,
            TabsError::UnstartedTask { ref task, ref token } if task == "signup" && token == "ghost"
        ));

        assert_eq!(token.completed_time().await.unwrap(), None);
        assert!(
            storage
                .smembers("stat:task:signup:completed:day:2024-01-01")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_time_elapsed() {
        let token = Token::new("t1", "signup", storage());
        token.start(day0(), &[Resolution::Day]).await.unwrap();
        token
            .complete(day0() + TimeDelta::minutes(90), &[Resolution::Day])
            .await
            .unwrap();

        assert_eq!(token.time_elapsed_in_seconds().await.unwrap(), 5_400.0);
        assert_eq!(token.time_elapsed(Resolution::Hour).await.unwrap(), 1.5);
        assert_eq!(token.time_elapsed(Resolution::Minute).await.unwrap(), 90.0);
    }

    #[tokio::test]
    async fn test_time_elapsed_requires_completion() {
        let token = Token::new("t1", "signup", storage());
        token.start(day0(), &[Resolution::Day]).await.unwrap();

        let err = token.time_elapsed_in_seconds().await.unwrap_err();
        assert!(matches!(err, TabsError::IncompleteToken { missing: "completed", .. }));
    }

    #[tokio::test]
    async fn test_tokens_compare_by_id() {
        let storage = storage();
        let a = Token::new("t1", "signup", storage.clone());
        let b = Token::new("t1", "checkout", storage);
        assert_eq!(a, b);
    }
}
