//! Metric computation over a [`CdrStore`].
//!
//! [`MetricSource`] is the seam the alarm engine depends on. [`CdrMetricSource`]
//! implements it on top of any store:
//!
//! - ALOC: one aggregation query over the daily analytics buckets of the window.
//! - ASR: two counts over raw CDRs (all attempts, normally cleared attempts).

use std::sync::Arc;

use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::storage::CdrStore;
use crate::types::{MetricSample, MetricType, NORMAL_CLEARING, TimeWindow};

/// Computes a named metric over a time window.
pub trait MetricSource: Send + Sync + std::fmt::Debug {
    /// Computes `metric` over `window`.
    ///
    /// # Errors
    ///
    /// - `MetricsError::DataUnavailable` when the store has nothing to compute from
    /// - `MetricsError::SourceError` when a query fails
    fn compute(&self, metric: MetricType, window: &TimeWindow) -> Result<MetricSample>;
}

/// [`MetricSource`] backed by a CDR store.
#[derive(Debug, Clone)]
pub struct CdrMetricSource {
    store: Arc<dyn CdrStore>,
    answered_cause: u16,
}

impl CdrMetricSource {
    /// Creates a source counting Q.850 cause 16 as answered.
    #[must_use]
    pub fn new(store: Arc<dyn CdrStore>) -> Self {
        Self {
            store,
            answered_cause: NORMAL_CLEARING,
        }
    }

    /// Overrides the Q.850 code counted as an answered call.
    #[must_use]
    pub const fn with_answered_cause(mut self, code: u16) -> Self {
        self.answered_cause = code;
        self
    }

    fn average_call_duration(&self, window: &TimeWindow) -> Result<f64> {
        let rows = self.store.aggregate_duration(window)?;
        if rows.is_empty() {
            return Err(MetricsError::unavailable(
                MetricType::AverageCallDuration,
                format!("no analytics buckets in {window}"),
            ));
        }

        // Several buckets are weighted by their call count.
        let calls: u64 = rows.iter().map(|r| r.call_count).sum();
        if calls == 0 {
            return Err(MetricsError::unavailable(
                MetricType::AverageCallDuration,
                format!("no calls in {window}"),
            ));
        }
        let weighted: f64 = rows
            .iter()
            .map(|r| r.duration_avg * r.call_count as f64)
            .sum();
        Ok(weighted / calls as f64)
    }

    fn answer_seizure_ratio(&self, window: &TimeWindow) -> Result<f64> {
        let total = self.store.count_calls(window, None)?;
        if total == 0 {
            return Err(MetricsError::unavailable(
                MetricType::AnswerSeizureRatio,
                format!("no call attempts in {window}"),
            ));
        }

        let cause_id = self
            .store
            .hangup_cause_id(self.answered_cause)?
            .ok_or_else(|| {
                MetricsError::unavailable(
                    MetricType::AnswerSeizureRatio,
                    format!("hangup cause {} is not in the lookup", self.answered_cause),
                )
            })?;
        let answered = self.store.count_calls(window, Some(cause_id))?;

        debug!(window = %window, total, answered, "counted call attempts");
        Ok(answered as f64 / total as f64)
    }
}

impl MetricSource for CdrMetricSource {
    fn compute(&self, metric: MetricType, window: &TimeWindow) -> Result<MetricSample> {
        let value = match metric {
            MetricType::AverageCallDuration => self.average_call_duration(window)?,
            MetricType::AnswerSeizureRatio => self.answer_seizure_ratio(window)?,
        };

        Ok(MetricSample {
            metric,
            window: *window,
            value,
        })
    }
}
