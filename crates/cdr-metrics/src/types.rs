//! Core types for CDR metrics.
//!
//! - [`MetricType`]: Which traffic metric an alarm watches
//! - [`TimeWindow`]: An inclusive calendar-day interval
//! - [`MetricSample`]: A computed value for one window
//! - [`CdrRecord`], [`DailyAnalytic`], [`HangupCause`]: Store documents

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Q.850 cause code for a normally cleared (answered) call.
pub const NORMAL_CLEARING: u16 = 16;

/// The traffic metric an alarm is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// ALOC: mean call duration in seconds.
    AverageCallDuration,
    /// ASR: answered calls over call attempts.
    AnswerSeizureRatio,
}

impl MetricType {
    /// Decodes the persisted numeric code (1 = ALOC, 2 = ASR).
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::UnknownMetric` for any other code.
    pub const fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::AverageCallDuration),
            2 => Ok(Self::AnswerSeizureRatio),
            _ => Err(MetricsError::UnknownMetric { code }),
        }
    }

    /// Returns the persisted numeric code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::AverageCallDuration => 1,
            Self::AnswerSeizureRatio => 2,
        }
    }

    /// Returns the short metric name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AverageCallDuration => "aloc",
            Self::AnswerSeizureRatio => "asr",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inclusive time interval `[start, end]`.
///
/// Windows built with [`TimeWindow::full_day`] cover
/// `00:00:00.000000` to `23:59:59.999999` of one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First instant of the window.
    pub start: DateTime<Utc>,
    /// Last instant of the window (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window covering the whole of `date`.
    #[must_use]
    pub fn full_day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1) - Duration::microseconds(1);
        Self { start, end }
    }

    /// The calendar day the window ends on.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Checks if an instant falls within this window (inclusive on both ends).
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// A single computed metric value for a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// The metric that was computed.
    pub metric: MetricType,
    /// The window it was computed over.
    pub window: TimeWindow,
    /// The computed value.
    pub value: f64,
}

/// A raw call detail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdrRecord {
    /// When the call attempt started.
    pub start: DateTime<Utc>,
    /// Billed duration in seconds.
    pub duration_secs: u64,
    /// Store id of the hangup cause (see [`HangupCause`]).
    pub hangup_cause_id: u32,
    /// Dialled destination number.
    #[serde(default)]
    pub destination: String,
}

/// One bucket of the pre-aggregated daily analytics collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAnalytic {
    /// The bucket date (`metadata.date`).
    pub date: DateTime<Utc>,
    /// Number of calls in the bucket.
    pub call_count: u64,
    /// Summed call duration in seconds.
    pub total_duration_secs: u64,
}

/// Hangup cause lookup entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangupCause {
    /// Store id referenced by [`CdrRecord::hangup_cause_id`].
    pub id: u32,
    /// Q.850 cause code.
    pub code: u16,
    /// Cause name, e.g. `NORMAL_CLEARING`.
    #[serde(default)]
    pub name: String,
}

/// One row returned by the average-duration aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// The bucket day.
    pub date: NaiveDate,
    /// Calls counted in the bucket.
    pub call_count: u64,
    /// Mean call duration of the bucket, in seconds.
    pub duration_avg: f64,
}

/// Totals over a window, used by the daily report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSummary {
    /// All call attempts.
    pub total_calls: u64,
    /// Summed duration in seconds.
    pub total_duration_secs: u64,
    /// Attempts per hangup cause id.
    pub by_hangup_cause: BTreeMap<u32, u64>,
}
