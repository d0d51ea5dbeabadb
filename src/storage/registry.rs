// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use crate::storage::adapters::StorageAdapter;

pub type StorageAdapterFuture =
    Pin<Box<dyn Future<Output = anyhow::Result<Arc<dyn StorageAdapter>>> + Send>>;

pub struct StorageAdapterRegistration {
    pub class: &'static str,
    pub factory: fn(Option<Value>) -> StorageAdapterFuture,
}

inventory::collect!(StorageAdapterRegistration);

pub fn find_adapter(class: &str) -> Option<&'static StorageAdapterRegistration> {
    inventory::iter::<StorageAdapterRegistration>
        .into_iter()
        .find(|registration| registration.class == class)
}

pub fn available_adapters() -> Vec<&'static str> {
    let mut classes: Vec<&'static str> = inventory::iter::<StorageAdapterRegistration>
        .into_iter()
        .map(|registration| registration.class)
        .collect();
    classes.sort_unstable();
    classes
}

macro_rules! register_adapter {
    ($class:expr, $factory:expr) => {
        inventory::submit! {
            $crate::storage::registry::StorageAdapterRegistration {
                class: $class,
                factory: $factory,
            }
        }
    };
}

pub(crate) use register_adapter;
