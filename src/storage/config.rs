// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{
    adapters::StorageAdapter,
    registry::{available_adapters, find_adapter},
};

pub const DEFAULT_ADAPTER_CLASS: &str = "tabs::storage::KvStore";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AdapterEntry {
    pub class: String,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub adapter: Option<AdapterEntry>,
}

impl StorageConfig {
    pub fn adapter_class(&self) -> &str {
        self.adapter
            .as_ref()
            .map(|entry| entry.class.as_str())
            .unwrap_or(DEFAULT_ADAPTER_CLASS)
    }

    /// Builds the configured adapter, falling back to the builtin kv store.
    pub async fn create_adapter(&self) -> anyhow::Result<Arc<dyn StorageAdapter>> {
        let class = self.adapter_class();
        let Some(registration) = find_adapter(class) else {
            return Err(anyhow::anyhow!(
                "Storage adapter '{}' not found. Available: {:?}",
                class,
                available_adapters()
            ));
        };

        let adapter_config = self.adapter.as_ref().and_then(|entry| entry.config.clone());
        tracing::debug!(
            "Using storage adapter '{}' with config: {:?}",
            class,
            &adapter_config
        );
        (registration.factory)(adapter_config).await
    }
}
