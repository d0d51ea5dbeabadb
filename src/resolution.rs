use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Months, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    error::{Result, TabsError},
};

/// Time bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Resolution {
    pub const ALL: [Resolution; 6] = [
        Resolution::Minute,
        Resolution::Hour,
        Resolution::Day,
        Resolution::Week,
        Resolution::Month,
        Resolution::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Day => "day",
            Resolution::Week => "week",
            Resolution::Month => "month",
            Resolution::Year => "year",
        }
    }

    fn label_format(&self) -> &'static str {
        match self {
            Resolution::Minute => "%Y-%m-%d-%H-%M",
            Resolution::Hour => "%Y-%m-%d-%H",
            Resolution::Day => "%Y-%m-%d",
            Resolution::Week => "%Y-%W",
            Resolution::Month => "%Y-%m",
            Resolution::Year => "%Y",
        }
    }

    /// Canonical label of the bucket containing `timestamp`. Formats the bucket
    /// start, so a week crossing New Year keeps the label of its Monday.
    pub fn serialize(&self, timestamp: DateTime<Utc>) -> String {
        self.normalize(timestamp)
            .format(self.label_format())
            .to_string()
    }

    /// Start of the bucket containing `timestamp`. Weeks start on Monday.
    pub fn normalize(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = timestamp.date_naive().and_time(NaiveTime::MIN).and_utc();
        match self {
            Resolution::Minute => {
                midnight
                    + TimeDelta::minutes(i64::from(timestamp.hour() * 60 + timestamp.minute()))
            }
            Resolution::Hour => midnight + TimeDelta::hours(i64::from(timestamp.hour())),
            Resolution::Day => midnight,
            Resolution::Week => {
                midnight
                    - TimeDelta::days(i64::from(timestamp.weekday().num_days_from_monday()))
            }
            Resolution::Month => midnight - TimeDelta::days(i64::from(timestamp.day0())),
            Resolution::Year => midnight - TimeDelta::days(i64::from(timestamp.ordinal0())),
        }
    }

    /// Advances `timestamp` by `count` buckets. `None` when the result is out of range.
    pub fn add(&self, timestamp: DateTime<Utc>, count: u32) -> Option<DateTime<Utc>> {
        let count_i64 = i64::from(count);
        match self {
            Resolution::Minute => timestamp.checked_add_signed(TimeDelta::minutes(count_i64)),
            Resolution::Hour => timestamp.checked_add_signed(TimeDelta::hours(count_i64)),
            Resolution::Day => timestamp.checked_add_signed(TimeDelta::days(count_i64)),
            Resolution::Week => timestamp.checked_add_signed(TimeDelta::weeks(count_i64)),
            Resolution::Month => timestamp.checked_add_months(Months::new(count)),
            Resolution::Year => timestamp.checked_add_months(Months::new(count.checked_mul(12)?)),
        }
    }

    /// Seconds in one bucket. Months count as 30 days, years as 365.
    pub fn seconds(&self) -> f64 {
        match self {
            Resolution::Minute => 60.0,
            Resolution::Hour => 3_600.0,
            Resolution::Day => 86_400.0,
            Resolution::Week => 604_800.0,
            Resolution::Month => 2_592_000.0,
            Resolution::Year => 31_536_000.0,
        }
    }

    pub fn from_seconds(&self, seconds: f64) -> f64 {
        seconds / self.seconds()
    }

    /// One representative timestamp per bucket covering `period`, oldest first.
    pub fn timestamp_range(&self, period: &Period) -> Vec<DateTime<Utc>> {
        let start = self.normalize(period.start());
        let end = self.normalize(period.end());

        let mut range = vec![start];
        let mut current = start;
        while let Some(next) = self.add(current, 1) {
            if next > end {
                break;
            }
            range.push(next);
            current = next;
        }
        range
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = TabsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" => Ok(Resolution::Minute),
            "hour" => Ok(Resolution::Hour),
            "day" => Ok(Resolution::Day),
            "week" => Ok(Resolution::Week),
            "month" => Ok(Resolution::Month),
            "year" => Ok(Resolution::Year),
            other => Err(TabsError::UnknownResolution(other.to_string())),
        }
    }
}

/// Inclusive time window queried by `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(TabsError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window of `length` ending at `anchor`.
    pub fn ending_at(anchor: DateTime<Utc>, length: TimeDelta) -> Result<Self> {
        Self::new(anchor - length, anchor)
    }

    /// Window of `length` ending now, according to `clock`.
    pub fn last(length: TimeDelta, clock: &dyn Clock) -> Result<Self> {
        Self::ending_at(clock.now(), length)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

pub fn timestamp_range(period: &Period, resolution: Resolution) -> Vec<DateTime<Utc>> {
    resolution.timestamp_range(period)
}
