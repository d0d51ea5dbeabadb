// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::{
    clock::{Clock, SystemClock},
    config::TabsConfig,
    error::Result,
    metrics::{EventType, Token, bucket_key, task_prefix},
    resolution::{Period, Resolution},
    storage::StorageAdapter,
};

/// Aggregated funnel metrics for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub started_within_period: usize,
    pub completed_within_period: usize,
    pub started_and_completed_within_period: usize,
    /// Matched tokens per bucket in the window, not per started token.
    pub completion_rate: f64,
    /// Mean time to completion in units of the queried resolution.
    pub average_completion_time: f64,
    pub average_completion_time_in_seconds: f64,
}

/// Funnel metric keyed by `key`: tokens are started, later completed, and
/// `stats` reports how many did each within a window.
#[derive(Clone)]
pub struct Task {
    key: String,
    storage: Arc<dyn StorageAdapter>,
    resolutions: Vec<Resolution>,
    decimal_precision: u32,
    clock: Arc<dyn Clock>,
}

impl Task {
    pub fn new(
        key: impl Into<String>,
        storage: Arc<dyn StorageAdapter>,
        config: &TabsConfig,
    ) -> Self {
        Self {
            key: key.into(),
            storage,
            resolutions: config.resolutions.clone(),
            decimal_precision: config.decimal_precision,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    pub fn token(&self, token_id: impl Into<String>) -> Token {
        Token::new(token_id, self.key.clone(), self.storage.clone())
    }

    /// Marks `token_id` as started at `timestamp`, or now when `None`.
    pub async fn start(&self, token_id: &str, timestamp: Option<DateTime<Utc>>) -> Result<()> {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        self.token(token_id)
            .start(timestamp, &self.resolutions)
            .await?;
        tracing::debug!(
            task = %self.key,
            token = %token_id,
            timestamp = %timestamp,
            "Task started"
        );
        Ok(())
    }

    /// Marks `token_id` as completed. Fails with `TabsError::UnstartedTask` if it
    /// was never started.
    pub async fn complete(&self, token_id: &str, timestamp: Option<DateTime<Utc>>) -> Result<()> {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        self.token(token_id)
            .complete(timestamp, &self.resolutions)
            .await?;
        tracing::debug!(
            task = %self.key,
            token = %token_id,
            timestamp = %timestamp,
            "Task completed"
        );
        Ok(())
    }

    pub async fn stats(&self, period: &Period, resolution: Resolution) -> Result<TaskStats> {
        let range = resolution.timestamp_range(period);
        let started_tokens = self
            .tokens_for_period(&range, resolution, EventType::Started)
            .await?;
        let completed_tokens = self
            .tokens_for_period(&range, resolution, EventType::Completed)
            .await?;

        let completed_ids: HashSet<&str> = completed_tokens.iter().map(Token::id).collect();
        let matching_tokens: Vec<&Token> = started_tokens
            .iter()
            .filter(|token| completed_ids.contains(token.id()))
            .collect();

        let completion_rate = round_to(
            matching_tokens.len() as f64 / range.len() as f64,
            self.decimal_precision,
        );

        let elapsed = try_join_all(matching_tokens.iter().map(|token| async move {
            let in_resolution = token.time_elapsed(resolution).await?;
            let in_seconds = token.time_elapsed_in_seconds().await?;
            Ok::<_, crate::error::TabsError>((in_resolution, in_seconds))
        }))
        .await?;

        let (average_completion_time, average_completion_time_in_seconds) = if elapsed.is_empty() {
            (0.0, 0.0)
        } else {
            let count = elapsed.len() as f64;
            let total: f64 = elapsed.iter().map(|(units, _)| units).sum();
            let total_seconds: f64 = elapsed.iter().map(|(_, seconds)| seconds).sum();
            (total / count, total_seconds / count)
        };

        tracing::debug!(
            task = %self.key,
            resolution = %resolution,
            buckets = range.len(),
            started = started_tokens.len(),
            completed = completed_tokens.len(),
            matched = matching_tokens.len(),
            "Computed task stats"
        );

        Ok(TaskStats {
            started_within_period: started_tokens.len(),
            completed_within_period: completed_tokens.len(),
            started_and_completed_within_period: matching_tokens.len(),
            completion_rate,
            average_completion_time,
            average_completion_time_in_seconds,
        })
    }

    /// Every token id ever started on this task, sorted. Survives until `drop_all`.
    pub async fn token_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .storage
            .smembers(&Token::index_key(&self.key))
            .await?
            .into_iter()
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Deletes every persisted key under this task's namespace. The handle stays usable.
    pub async fn drop_all(&self) -> Result<()> {
        let removed = self.storage.del_by_prefix(&task_prefix(&self.key)).await?;
        tracing::info!(task = %self.key, removed = removed, "Dropped task data");
        Ok(())
    }

    pub fn storage_key(
        &self,
        resolution: Resolution,
        timestamp: DateTime<Utc>,
        event: EventType,
    ) -> String {
        bucket_key(&self.key, resolution, timestamp, event)
    }

    /// Distinct tokens seen under `event` in any bucket of `range`, fetched in one batch.
    async fn tokens_for_period(
        &self,
        range: &[DateTime<Utc>],
        resolution: Resolution,
        event: EventType,
    ) -> Result<Vec<Token>> {
        let keys = self.keys_for_range(range, resolution, event);
        let sets = self.storage.smembers_all(&keys).await?;

        let ids: BTreeSet<String> = sets.into_iter().flatten().collect();
        Ok(ids.into_iter().map(|id| self.token(id)).collect())
    }

    fn keys_for_range(
        &self,
        range: &[DateTime<Utc>],
        resolution: Resolution,
        event: EventType,
    ) -> Vec<String> {
        range
            .iter()
            .map(|timestamp| self.storage_key(resolution, *timestamp, event))
            .collect()
    }
}

fn round_to(value: f64, decimal_precision: u32) -> f64 {
    let factor = 10f64.powi(decimal_precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::{clock::FixedClock, error::TabsError, storage::KvStoreAdapter};

    fn day0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn task(key: &str) -> Task {
        Task::new(key, Arc::new(KvStoreAdapter::default()), &TabsConfig::default())
    }

    #[test]
    fn test_storage_key_format() {
        let task = task("signup");
        let ts = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 1).unwrap();

        assert_eq!(
            task.storage_key(Resolution::Day, ts, EventType::Started),
            "stat:task:signup:started:day:2024-02-29"
        );
        assert_eq!(
            task.storage_key(Resolution::Minute, ts, EventType::Completed),
            "stat:task:signup:completed:minute:2024-02-29-23-59"
        );
        assert_eq!(
            task.storage_key(Resolution::Minute, ts, EventType::Completed),
            task.storage_key(Resolution::Minute, ts, EventType::Completed)
        );
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.0 / 3.0, 5), 0.66667);
        assert_eq!(round_to(2.0 / 3.0, 0), 1.0);
        assert_eq!(round_to(0.125, 2), 0.13);
    }

    #[tokio::test]
    async fn test_stats_on_empty_task_are_zero() {
        let task = task("empty");
        let period = Period::new(day0(), day0() + TimeDelta::days(6)).unwrap();

        let stats = task.stats(&period, Resolution::Day).await.unwrap();
        assert_eq!(
            stats,
            TaskStats {
                started_within_period: 0,
                completed_within_period: 0,
                started_and_completed_within_period: 0,
                completion_rate: 0.0,
                average_completion_time: 0.0,
                average_completion_time_in_seconds: 0.0,
            }
        );
    }

    #[tokio::test]
    async fn test_completion_rate_divides_by_bucket_count() {
        let task = task("checkout");
        task.start("a", Some(day0())).await.unwrap();
        task.complete("a", Some(day0() + TimeDelta::hours(2))).await.unwrap();
        task.start("b", Some(day0())).await.unwrap();

        // three day buckets, one matched token
        let period = Period::new(day0(), day0() + TimeDelta::days(2)).unwrap();
        let stats = task.stats(&period, Resolution::Day).await.unwrap();

        assert_eq!(stats.started_within_period, 2);
        assert_eq!(stats.completed_within_period, 1);
        assert_eq!(stats.started_and_completed_within_period, 1);
        assert_eq!(stats.completion_rate, 0.33333);
        assert_eq!(stats.average_completion_time_in_seconds, 7_200.0);
        assert_eq!(stats.average_completion_time, 7_200.0 / 86_400.0);
    }

    #[tokio::test]
    async fn test_matching_spans_buckets() {
        let task = task("onboarding");
        task.start("t", Some(day0())).await.unwrap();
        task.complete("t", Some(day0() + TimeDelta::days(1))).await.unwrap();

        let period = Period::new(day0(), day0() + TimeDelta::days(1)).unwrap();
        let stats = task.stats(&period, Resolution::Day).await.unwrap();
        assert_eq!(stats.started_and_completed_within_period, 1);
        assert_eq!(stats.completion_rate, 0.5);
        assert_eq!(stats.average_completion_time, 1.0);

        // completion falls outside a window covering only the first day
        let first_day = Period::new(day0(), day0()).unwrap();
        let stats = task.stats(&first_day, Resolution::Day).await.unwrap();
        assert_eq!(stats.started_within_period, 1);
        assert_eq!(stats.completed_within_period, 0);
        assert_eq!(stats.started_and_completed_within_period, 0);
    }

    #[tokio::test]
    async fn test_start_defaults_to_clock() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let task = task("clocked").with_clock(Arc::new(FixedClock(now)));

        task.start("t", None).await.unwrap();
        assert_eq!(task.token("t").started_time().await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn test_complete_unstarted_propagates() {
        let task = task("signup");
        let err = task.complete("nobody", Some(day0())).await.unwrap_err();
        assert!(matches!(err, TabsError::UnstartedTask { .. }));
    }

    #[tokio::test]
    async fn test_drop_all_clears_task_only() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(KvStoreAdapter::default());
        let config = TabsConfig::default();
        let signup = Task::new("signup", storage.clone(), &config);
        let checkout = Task::new("checkout", storage.clone(), &config);

        signup.start("t1", Some(day0())).await.unwrap();
        checkout.start("t1", Some(day0())).await.unwrap();

        signup.start("t2", Some(day0())).await.unwrap();
        assert_eq!(signup.token_ids().await.unwrap(), vec!["t1", "t2"]);

        signup.drop_all().await.unwrap();
        signup.drop_all().await.unwrap();
        assert!(signup.token_ids().await.unwrap().is_empty());
        assert_eq!(checkout.token_ids().await.unwrap(), vec!["t1"]);

        let period = Period::new(day0(), day0()).unwrap();
        assert_eq!(
            signup.stats(&period, Resolution::Day).await.unwrap().started_within_period,
            0
        );
        assert_eq!(
            checkout.stats(&period, Resolution::Day).await.unwrap().started_within_period,
            1
        );
    }
}
