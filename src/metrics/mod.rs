// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

mod task;
mod token;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resolution::Resolution;

pub use self::{
    task::{Task, TaskStats},
    token::Token,
};

/// Which end of the funnel a token was observed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Started,
    Completed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Started => "started",
            EventType::Completed => "completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace every key of a task lives under.
pub fn task_prefix(task_key: &str) -> String {
    format!("stat:task:{}", task_key)
}

/// `stat:task:<task_key>:<event>:<resolution>:<bucket_label>`
pub fn bucket_key(
    task_key: &str,
    resolution: Resolution,
    timestamp: DateTime<Utc>,
    event: EventType,
) -> String {
    format!(
        "{}:{}:{}:{}",
        task_prefix(task_key),
        event,
        resolution,
        resolution.serialize(timestamp)
    )
}
