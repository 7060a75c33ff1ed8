//! Notification dispatch boundary.
//!
//! The engine hands a [`Notice`] and a recipient list to a
//! [`NotificationDispatcher`]. Delivery (mail, templating, retries) belongs to
//! the dispatcher; the engine only logs a failed hand-off.

use std::fmt;
use std::sync::Arc;

use cdr_metrics::MetricType;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AlarmError, Result};
use crate::prefix::PrefixList;
use crate::report::DailyReport;
use crate::types::{Alarm, ComparisonMode};

/// Details of an alarm whose threshold was crossed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// The alarm that fired.
    pub alarm_id: String,
    /// The alarm's name.
    pub alarm_name: String,
    /// The metric evaluated.
    pub metric: MetricType,
    /// The comparison applied.
    pub comparison_mode: ComparisonMode,
    /// The alarm threshold.
    pub threshold: f64,
    /// The sample the decision was made on.
    pub value: f64,
    /// The previous-window sample, for comparison modes.
    pub previous: Option<f64>,
}

impl AlarmEvent {
    /// Creates an event for `alarm` with the samples that fired it.
    #[must_use]
    pub fn new(alarm: &Alarm, value: f64, previous: Option<f64>) -> Self {
        Self {
            alarm_id: alarm.id.clone(),
            alarm_name: alarm.name.clone(),
            metric: alarm.metric,
            comparison_mode: alarm.comparison_mode,
            threshold: alarm.threshold,
            value,
            previous,
        }
    }
}

/// Something worth telling a recipient about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// An alarm threshold was crossed.
    AlarmFired(AlarmEvent),
    /// The previous day's traffic summary.
    DailyReport(DailyReport),
    /// A dialled destination matched a blacklist or whitelist prefix.
    PrefixMatched {
        /// The list that matched.
        list: PrefixList,
        /// The destination dialled.
        destination: String,
    },
}

impl Notice {
    /// A short label for the notice category.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::AlarmFired(_) => "alarm",
            Self::DailyReport(_) => "daily_report",
            Self::PrefixMatched { list, .. } => list.as_str(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlarmFired(event) => write!(
                f,
                "alarm '{}': {} {} {} (value {})",
                event.alarm_name, event.metric, event.comparison_mode, event.threshold, event.value
            ),
            Self::DailyReport(report) => write!(
                f,
                "CDR report for {}: {} calls",
                report.day, report.total_calls
            ),
            Self::PrefixMatched { list, destination } => {
                write!(f, "{list} prefix matched for {destination}")
            }
        }
    }
}

/// Trait for notification dispatchers.
///
/// Implement this trait to hand notices to a delivery system.
pub trait NotificationDispatcher: Send + Sync + fmt::Debug {
    /// Returns the name of this dispatcher.
    fn name(&self) -> &str;

    /// Hands `notice` over for delivery to `recipients`.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::NotificationFailed` if the notice cannot be handed over.
    fn notify(&self, notice: &Notice, recipients: &[String]) -> Result<()>;
}

/// A dispatcher that writes notices to the log.
#[derive(Debug, Clone)]
pub struct LogDispatcher {
    name: String,
}

impl LogDispatcher {
    /// Creates a new log dispatcher.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogDispatcher {
    fn default() -> Self {
        Self::new("log")
    }
}

impl NotificationDispatcher for LogDispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, notice: &Notice, recipients: &[String]) -> Result<()> {
        let payload = serde_json::to_string(notice)?;
        info!(
            dispatcher = %self.name,
            category = notice.category(),
            recipients = ?recipients,
            "{notice}"
        );
        debug!(payload = %payload, "notice payload");
        Ok(())
    }
}

/// A dispatcher that keeps every notice in memory.
///
/// Cloning shares the recorded notices.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<(Notice, Vec<String>)>>>,
    failing: bool,
}

impl RecordingDispatcher {
    /// Creates a dispatcher that accepts every notice.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher that rejects every notice.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            failing: true,
        }
    }

    /// Returns every notice accepted so far, with its recipients.
    #[must_use]
    pub fn sent(&self) -> Vec<(Notice, Vec<String>)> {
        self.sent.lock().clone()
    }

    /// Returns the number of notices accepted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Returns true if nothing has been accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify(&self, notice: &Notice, recipients: &[String]) -> Result<()> {
        if self.failing {
            return Err(AlarmError::NotificationFailed {
                reason: "dispatcher rejected notice".to_string(),
            });
        }
        self.sent.lock().push((notice.clone(), recipients.to_vec()));
        Ok(())
    }
}
