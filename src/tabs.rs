// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    clock::{Clock, SystemClock},
    config::TabsConfig,
    error::{Result, TabsError},
    metrics::{Task, TaskStats},
    resolution::{Period, Resolution},
    storage::StorageAdapter,
};

const METRICS_KEY: &str = "metrics";
const TASK_METRIC_TYPE: &str = "task";

fn metric_type_key(key: &str) -> String {
    format!("metric_type:{}", key)
}

/// Registry of named task metrics sharing one storage backend.
#[derive(Clone)]
pub struct Tabs {
    storage: Arc<dyn StorageAdapter>,
    config: Arc<TabsConfig>,
    clock: Arc<dyn Clock>,
}

impl Tabs {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: TabsConfig) -> Self {
        Self {
            storage,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    /// Builds the storage adapter named in `config` and wraps it.
    pub async fn from_config(config: TabsConfig) -> Result<Self> {
        let storage = config.storage.create_adapter().await?;
        tracing::info!(adapter = %config.storage.adapter_class(), "Tabs storage ready");
        Ok(Self::new(storage, config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TabsConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }

    fn task_handle(&self, key: &str) -> Task {
        Task::new(key, self.storage.clone(), &self.config).with_clock(self.clock.clone())
    }

    pub async fn task_exists(&self, key: &str) -> Result<bool> {
        Ok(self.storage.sismember(METRICS_KEY, key).await?)
    }

    pub async fn create_task(&self, key: &str) -> Result<Task> {
        if self.task_exists(key).await? {
            return Err(TabsError::DuplicateMetric(key.to_string()));
        }

        self.storage.sadd(METRICS_KEY, key).await?;
        self.storage.set(&metric_type_key(key), TASK_METRIC_TYPE).await?;
        tracing::info!(task = %key, "Task metric created");
        Ok(self.task_handle(key))
    }

    /// Looks up a registered metric and checks that it was created as a task.
    pub async fn get_task(&self, key: &str) -> Result<Task> {
        if !self.task_exists(key).await? {
            return Err(TabsError::UnknownMetric(key.to_string()));
        }

        match self.storage.get(&metric_type_key(key)).await? {
            Some(found) if found != TASK_METRIC_TYPE => Err(TabsError::MetricTypeMismatch {
                key: key.to_string(),
                found,
            }),
            _ => Ok(self.task_handle(key)),
        }
    }

    pub async fn list_tasks(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .storage
            .smembers(METRICS_KEY)
            .await?
            .into_iter()
            .collect();
        keys.sort();
        Ok(keys)
    }

    pub async fn drop_task(&self, key: &str) -> Result<()> {
        let task = self.get_task(key).await?;
        task.drop_all().await?;
        self.storage.srem(METRICS_KEY, key).await?;
        self.storage.del(&metric_type_key(key)).await?;
        tracing::info!(task = %key, "Task metric dropped");
        Ok(())
    }

    pub async fn drop_all_tasks(&self) -> Result<()> {
        for key in self.list_tasks().await? {
            self.drop_task(&key).await?;
        }
        Ok(())
    }

    /// Starts `token` on task `key`, creating the task on first use.
    pub async fn start_task(
        &self,
        key: &str,
        token: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.ensure_task(key).await?.start(token, timestamp).await
    }

    /// Completes `token` on an existing task. Unlike `start_task` this never
    /// registers the metric.
    pub async fn complete_task(
        &self,
        key: &str,
        token: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.get_task(key).await?.complete(token, timestamp).await
    }

    pub async fn task_stats(
        &self,
        key: &str,
        period: &Period,
        resolution: Resolution,
    ) -> Result<TaskStats> {
        self.get_task(key).await?.stats(period, resolution).await
    }

    async fn ensure_task(&self, key: &str) -> Result<Task> {
        match self.create_task(key).await {
            Ok(task) => Ok(task),
            Err(TabsError::DuplicateMetric(_)) => Ok(self.task_handle(key)),
            Err(e) => Err(e),
        }
    }
}
