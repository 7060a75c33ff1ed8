//! Evaluation of a single alarm.
//!
//! The runner turns one [`Alarm`] into metric samples, decisions, reports and
//! notifications. It never decides *whether* an alarm should run; that is the
//! scheduler's job.

use std::collections::BTreeSet;
use std::sync::Arc;

use cdr_metrics::{MetricSource, TimeWindow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::channels::{AlarmEvent, Notice, NotificationDispatcher};
use crate::error::{AlarmError, Result};
use crate::evaluator::{self, Decision};
use crate::store::AlarmStore;
use crate::types::{Alarm, AlarmReport, ReportStatus};
use crate::window::WindowCalculator;

/// Reports written by one alarm run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Reports appended, in order.
    pub reports: Vec<AlarmReport>,
    /// Number of evaluations that fired.
    pub fired: usize,
}

impl RunOutcome {
    /// Returns true if the run ended with an error report.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.reports
            .last()
            .is_some_and(|r| r.status == ReportStatus::Error)
    }
}

/// Evaluates alarms against a metric source.
#[derive(Debug)]
pub struct AlarmRunner {
    source: Arc<dyn MetricSource>,
    store: Arc<dyn AlarmStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    windows: WindowCalculator,
    admin_recipients: Vec<String>,
}

impl AlarmRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        source: Arc<dyn MetricSource>,
        store: Arc<dyn AlarmStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            source,
            store,
            dispatcher,
            windows: WindowCalculator::new(),
            admin_recipients: Vec::new(),
        }
    }

    /// Sets recipients who are told about every fired alarm.
    #[must_use]
    pub fn with_admin_recipients(mut self, recipients: Vec<String>) -> Self {
        self.admin_recipients = recipients;
        self
    }

    /// Returns the alarm store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn AlarmStore> {
        &self.store
    }

    /// Runs `alarm` as of `now`.
    ///
    /// Single-sample modes evaluate the previous window and then the current
    /// window, writing one report each. Comparison modes evaluate once. A
    /// failed computation ends the run with an error report.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::Storage` if a report cannot be appended.
    pub fn run(&self, alarm: &Alarm, now: DateTime<Utc>) -> Result<RunOutcome> {
        let pair = self.windows.for_evaluation(alarm.comparison_base, now);
        debug!(
            alarm_id = %alarm.id,
            previous = %pair.previous,
            current = %pair.current,
            mode = %alarm.comparison_mode,
            "running alarm"
        );

        let mut outcome = RunOutcome::default();

        if alarm.comparison_mode.needs_previous() {
            let evaluated = self.sample(alarm, &pair.previous).and_then(|previous| {
                let current = self.sample(alarm, &pair.current)?;
                let decision = evaluator::evaluate(
                    alarm.comparison_mode,
                    alarm.threshold,
                    current,
                    Some(previous),
                )?;
                Ok((current, previous, decision))
            });

            match evaluated {
                Ok((current, previous, decision)) => {
                    self.record(
                        alarm,
                        &pair.current,
                        current,
                        Some(previous),
                        decision,
                        now,
                        &mut outcome,
                    )?;
                }
                Err(e) => self.fail(alarm, now, &e, &mut outcome)?,
            }
        } else {
            for window in [&pair.previous, &pair.current] {
                let evaluated = self.sample(alarm, window).and_then(|value| {
                    let decision =
                        evaluator::evaluate(alarm.comparison_mode, alarm.threshold, value, None)?;
                    Ok((value, decision))
                });

                match evaluated {
                    Ok((value, decision)) => {
                        self.record(alarm, window, value, None, decision, now, &mut outcome)?;
                    }
                    Err(e) => {
                        self.fail(alarm, now, &e, &mut outcome)?;
                        break;
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Appends an error report for an alarm that could not be run at all.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::Storage` if the report cannot be appended.
    pub fn record_failure(
        &self,
        alarm_id: &str,
        default_value: f64,
        now: DateTime<Utc>,
        error: &AlarmError,
    ) -> Result<AlarmReport> {
        let report = AlarmReport::failed(alarm_id, default_value, now, error);
        self.store.append_report(report.clone())?;
        Ok(report)
    }

    fn sample(&self, alarm: &Alarm, window: &TimeWindow) -> Result<f64> {
        Ok(self.source.compute(alarm.metric, window)?.value)
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        alarm: &Alarm,
        window: &TimeWindow,
        value: f64,
        previous: Option<f64>,
        decision: Decision,
        now: DateTime<Utc>,
        outcome: &mut RunOutcome,
    ) -> Result<()> {
        let fired = decision.is_fired();
        let report = AlarmReport::evaluated(&alarm.id, value, fired, now, window.end_date());
        self.store.append_report(report.clone())?;
        outcome.reports.push(report);

        if fired {
            outcome.fired += 1;
            info!(
                alarm_id = %alarm.id,
                alarm_name = %alarm.name,
                metric = %alarm.metric,
                value,
                threshold = alarm.threshold,
                day = %window.end_date(),
                "alarm fired"
            );
            self.notify(alarm, value, previous);
        } else {
            debug!(alarm_id = %alarm.id, value, day = %window.end_date(), "alarm not fired");
        }
        Ok(())
    }

    fn fail(
        &self,
        alarm: &Alarm,
        now: DateTime<Utc>,
        error: &AlarmError,
        outcome: &mut RunOutcome,
    ) -> Result<()> {
        warn!(
            alarm_id = %alarm.id,
            error_kind = error.kind(),
            error = %error,
            "alarm evaluation failed"
        );
        let report = self.record_failure(&alarm.id, alarm.threshold, now, error)?;
        outcome.reports.push(report);
        Ok(())
    }

    fn notify(&self, alarm: &Alarm, value: f64, previous: Option<f64>) {
        let recipients = self.recipients(alarm);
        if recipients.is_empty() {
            warn!(alarm_id = %alarm.id, "alarm fired but has no recipients");
            return;
        }

        let notice = Notice::AlarmFired(AlarmEvent::new(alarm, value, previous));
        if let Err(e) = self.dispatcher.notify(&notice, &recipients) {
            warn!(
                alarm_id = %alarm.id,
                dispatcher = self.dispatcher.name(),
                error = %e,
                "failed to send alarm notification"
            );
        }
    }

    /// The alarm's targets plus the administrators, without duplicates.
    fn recipients(&self, alarm: &Alarm) -> Vec<String> {
        alarm
            .notification_targets
            .iter()
            .chain(&self.admin_recipients)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
