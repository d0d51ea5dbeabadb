// Copyright Motia LLC and/or licensed to Motia LLC under one or more
// contributor license agreements. Licensed under the Elastic License 2.0;
// you may not use this file except in compliance with the Elastic License 2.0.
// This software is patent protected. We welcome discussions - reach out at support@motia.dev
// See LICENSE and PATENTS files for details.

use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, TabsError>;

#[derive(thiserror::Error, Debug)]
pub enum TabsError {
    /// `complete` was called for a token that has no recorded start.
    #[error("token '{token}' of task '{task}' was completed before it was started")]
    UnstartedTask { task: String, token: String },
    #[error("token '{token}' of task '{task}' is missing its {missing} time")]
    IncompleteToken {
        task: String,
        token: String,
        missing: &'static str,
    },
    #[error("unknown resolution: {0}")]
    UnknownResolution(String),
    #[error("invalid period: end {end} is before start {start}")]
    InvalidPeriod {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("metric '{0}' already exists")]
    DuplicateMetric(String),
    #[error("metric '{0}' does not exist")]
    UnknownMetric(String),
    #[error("metric '{key}' is a {found} metric, not a task")]
    MetricTypeMismatch { key: String, found: String },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
