// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

pub mod kv_store;
pub mod redis_adapter;

use std::collections::HashSet;

use async_trait::async_trait;

/// Key-value storage with string values and unordered sets of members.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn del(&self, key: &str) -> anyhow::Result<()>;

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()>;
    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()>;
    async fn sismember(&self, key: &str, member: &str) -> anyhow::Result<bool>;
    async fn smembers(&self, key: &str) -> anyhow::Result<HashSet<String>>;

    /// Members of each set in `keys`, one entry per key in input order, fetched
    /// in a single round trip. Absent keys yield an empty set.
    async fn smembers_all(&self, keys: &[String]) -> anyhow::Result<Vec<HashSet<String>>>;

    /// Deletes every key starting with `prefix`, returning how many were removed.
    async fn del_by_prefix(&self, prefix: &str) -> anyhow::Result<usize>;

    async fn destroy(&self) -> anyhow::Result<()>;
}
