//! Core types for the alarm engine.
//!
//! This module provides the fundamental types used throughout the cdr-alarms crate:
//! - [`Period`]: How often an alarm is evaluated
//! - [`ComparisonBase`]: Which historical day the current day is compared against
//! - [`ComparisonMode`]: How the metric is compared against the threshold
//! - [`Alarm`]: A typed alarm definition, built from a persisted [`AlarmRecord`]
//! - [`AlarmReport`]: The append-only record of one evaluation

use std::collections::BTreeSet;

use cdr_metrics::MetricType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AlarmError, Result};

/// Scheduling cadence of an alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Evaluated once a day.
    #[default]
    Day,
    /// Evaluated once every seven days.
    Week,
    /// Evaluated once every thirty days.
    Month,
}

impl Period {
    /// Decodes the persisted numeric code (1 = day, 2 = week, 3 = month).
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::Configuration` for any other code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Day),
            2 => Ok(Self::Week),
            3 => Ok(Self::Month),
            _ => Err(AlarmError::configuration(format!("unknown period code {code}"))),
        }
    }

    /// Returns the persisted numeric code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Day => 1,
            Self::Week => 2,
            Self::Month => 3,
        }
    }

    /// Whole days that must elapse after a run before the alarm is due again.
    #[must_use]
    pub const fn min_days(&self) -> i64 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
        }
    }

    /// Returns the period as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which historical window the current day is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonBase {
    /// The day before the current day.
    #[default]
    SameDayPriorPeriod,
    /// The same weekday one week earlier.
    SameDayPriorWeek,
}

impl ComparisonBase {
    /// Decodes the persisted numeric code (1 = prior day, 2 = prior week).
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::Configuration` for any other code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::SameDayPriorPeriod),
            2 => Ok(Self::SameDayPriorWeek),
            _ => Err(AlarmError::configuration(format!(
                "unknown comparison base code {code}"
            ))),
        }
    }

    /// Returns the persisted numeric code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::SameDayPriorPeriod => 1,
            Self::SameDayPriorWeek => 2,
        }
    }

    /// Days between the previous and the current window.
    #[must_use]
    pub const fn offset_days(&self) -> i64 {
        match self {
            Self::SameDayPriorPeriod => 1,
            Self::SameDayPriorWeek => 7,
        }
    }
}

/// How a metric sample is compared against the alarm threshold.
///
/// The firing rule of each mode lives in [`crate::evaluator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Fires when `threshold < current`.
    LessThan,
    /// Fires when `threshold > current`.
    GreaterThan,
    /// Fires when `|current - previous| < threshold`.
    DecreaseByMoreThan,
    /// Fires when `|current - previous| > threshold`.
    IncreaseByMoreThan,
    /// Fires when the percentage difference is below the threshold.
    PercentDecreaseByMoreThan,
    /// Fires when the percentage difference is above the threshold.
    PercentIncreaseByMoreThan,
}

impl ComparisonMode {
    /// All modes, in persisted code order.
    pub const ALL: [Self; 6] = [
        Self::LessThan,
        Self::GreaterThan,
        Self::DecreaseByMoreThan,
        Self::IncreaseByMoreThan,
        Self::PercentDecreaseByMoreThan,
        Self::PercentIncreaseByMoreThan,
    ];

    /// Decodes the persisted numeric code (1..=6 in [`ComparisonMode::ALL`] order).
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::Configuration` for any other code.
    pub fn from_code(code: u8) -> Result<Self> {
        code.checked_sub(1)
            .and_then(|i| Self::ALL.get(usize::from(i)).copied())
            .ok_or_else(|| {
                AlarmError::configuration(format!("unknown comparison mode code {code}"))
            })
    }

    /// Returns the persisted numeric code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::LessThan => 1,
            Self::GreaterThan => 2,
            Self::DecreaseByMoreThan => 3,
            Self::IncreaseByMoreThan => 4,
            Self::PercentDecreaseByMoreThan => 5,
            Self::PercentIncreaseByMoreThan => 6,
        }
    }

    /// Returns true if the mode compares the current window against the previous one.
    #[must_use]
    pub const fn needs_previous(&self) -> bool {
        !matches!(self, Self::LessThan | Self::GreaterThan)
    }

    /// Returns the mode as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LessThan => "less_than",
            Self::GreaterThan => "greater_than",
            Self::DecreaseByMoreThan => "decrease_by_more_than",
            Self::IncreaseByMoreThan => "increase_by_more_than",
            Self::PercentDecreaseByMoreThan => "percent_decrease_by_more_than",
            Self::PercentIncreaseByMoreThan => "percent_increase_by_more_than",
        }
    }
}

impl std::fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An alarm definition as stored by the persistence layer.
///
/// Enumerations are kept as the numeric codes of the stored schema; decoding
/// into an [`Alarm`] happens per alarm so one bad row cannot stop a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    /// Unique identifier of the alarm.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Metric code (1 = ALOC, 2 = ASR).
    pub metric: u8,
    /// Period code (1 = day, 2 = week, 3 = month).
    pub period: u8,
    /// Comparison base code (1 = prior day, 2 = prior week).
    pub comparison_base: u8,
    /// Comparison mode code (1..=6).
    pub comparison_mode: u8,
    /// Threshold value.
    pub threshold: f64,
    /// Whether the alarm is active.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Recipients notified when the alarm fires.
    #[serde(default)]
    pub recipients: Vec<String>,
}

const fn default_active() -> bool {
    true
}

/// A typed alarm definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    /// Unique identifier for the alarm.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The metric evaluated.
    pub metric: MetricType,
    /// Scheduling cadence.
    pub period: Period,
    /// Which historical window to compare against.
    pub comparison_base: ComparisonBase,
    /// How the metric is compared against the threshold.
    pub comparison_mode: ComparisonMode,
    /// Threshold value.
    pub threshold: f64,
    /// Whether the alarm is evaluated at all.
    pub active: bool,
    /// Recipients notified when the alarm fires.
    pub notification_targets: BTreeSet<String>,
}

impl Alarm {
    /// Maximum allowed length for alarm names.
    pub const MAX_NAME_LENGTH: usize = 256;

    /// Creates a new alarm builder.
    pub fn builder(
        name: impl Into<String>,
        metric: MetricType,
        comparison_mode: ComparisonMode,
        threshold: f64,
    ) -> AlarmBuilder {
        AlarmBuilder::new(name, metric, comparison_mode, threshold)
    }

    /// Converts the alarm back to its stored form.
    #[must_use]
    pub fn to_record(&self) -> AlarmRecord {
        AlarmRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            metric: self.metric.code(),
            period: self.period.code(),
            comparison_base: self.comparison_base.code(),
            comparison_mode: self.comparison_mode.code(),
            threshold: self.threshold,
            active: self.active,
            recipients: self.notification_targets.iter().cloned().collect(),
        }
    }
}

impl TryFrom<AlarmRecord> for Alarm {
    type Error = AlarmError;

    fn try_from(record: AlarmRecord) -> Result<Self> {
        if !record.threshold.is_finite() {
            return Err(AlarmError::configuration(format!(
                "alarm '{}' has a non-finite threshold",
                record.id
            )));
        }

        Ok(Self {
            metric: MetricType::from_code(record.metric)?,
            period: Period::from_code(record.period)?,
            comparison_base: ComparisonBase::from_code(record.comparison_base)?,
            comparison_mode: ComparisonMode::from_code(record.comparison_mode)?,
            threshold: record.threshold,
            active: record.active,
            notification_targets: record.recipients.into_iter().collect(),
            id: record.id,
            name: record.name,
        })
    }
}

/// Builder for creating [`Alarm`] instances.
#[derive(Debug)]
pub struct AlarmBuilder {
    name: String,
    metric: MetricType,
    comparison_mode: ComparisonMode,
    threshold: f64,
    period: Period,
    comparison_base: ComparisonBase,
    active: bool,
    notification_targets: BTreeSet<String>,
}

impl AlarmBuilder {
    fn new(
        name: impl Into<String>,
        metric: MetricType,
        comparison_mode: ComparisonMode,
        threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            metric,
            comparison_mode,
            threshold,
            period: Period::Day,
            comparison_base: ComparisonBase::SameDayPriorPeriod,
            active: true,
            notification_targets: BTreeSet::new(),
        }
    }

    /// Sets the scheduling cadence.
    #[must_use]
    pub const fn period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    /// Sets the comparison base.
    #[must_use]
    pub const fn comparison_base(mut self, base: ComparisonBase) -> Self {
        self.comparison_base = base;
        self
    }

    /// Sets whether the alarm is active.
    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Adds a notification recipient.
    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.notification_targets.insert(recipient.into());
        self
    }

    /// Builds the [`Alarm`].
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::Configuration` if:
    /// - The name is empty or too long
    /// - The threshold is NaN or infinite
    pub fn build(self) -> Result<Alarm> {
        if self.name.is_empty() {
            return Err(AlarmError::configuration("alarm name cannot be empty"));
        }

        if self.name.len() > Alarm::MAX_NAME_LENGTH {
            return Err(AlarmError::configuration(format!(
                "alarm name exceeds maximum length of {} characters",
                Alarm::MAX_NAME_LENGTH
            )));
        }

        if !self.threshold.is_finite() {
            return Err(AlarmError::configuration("threshold must be a finite number"));
        }

        Ok(Alarm {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            metric: self.metric,
            period: self.period,
            comparison_base: self.comparison_base,
            comparison_mode: self.comparison_mode,
            threshold: self.threshold,
            active: self.active,
            notification_targets: self.notification_targets,
        })
    }
}

/// Outcome recorded for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// The threshold was not crossed.
    NoAlarmSent,
    /// The threshold was crossed and recipients were notified.
    AlarmSent,
    /// The evaluation could not complete.
    Error,
}

impl ReportStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoAlarmSent => "no_alarm_sent",
            Self::AlarmSent => "alarm_sent",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of one alarm evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmReport {
    /// Unique identifier for this report.
    pub id: String,
    /// The alarm evaluated.
    pub alarm_id: String,
    /// The value the decision was made on.
    pub computed_value: f64,
    /// Outcome of the evaluation.
    pub status: ReportStatus,
    /// When the evaluation ran.
    pub run_at: DateTime<Utc>,
    /// The day of the window the value was computed for, if any.
    pub window_day: Option<NaiveDate>,
    /// Error description for [`ReportStatus::Error`] reports.
    pub error: Option<String>,
}

impl AlarmReport {
    /// A report for a completed evaluation.
    #[must_use]
    pub fn evaluated(
        alarm_id: impl Into<String>,
        computed_value: f64,
        fired: bool,
        run_at: DateTime<Utc>,
        window_day: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            alarm_id: alarm_id.into(),
            computed_value,
            status: if fired {
                ReportStatus::AlarmSent
            } else {
                ReportStatus::NoAlarmSent
            },
            run_at,
            window_day: Some(window_day),
            error: None,
        }
    }

    /// A report for an evaluation that failed.
    #[must_use]
    pub fn failed(
        alarm_id: impl Into<String>,
        default_value: f64,
        run_at: DateTime<Utc>,
        error: &AlarmError,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            alarm_id: alarm_id.into(),
            computed_value: default_value,
            status: ReportStatus::Error,
            run_at,
            window_day: None,
            error: Some(error.to_string()),
        }
    }
}
