//! The periodic alarm tick.
//!
//! Each tick lists the active alarms, works out from the latest report of each
//! whether it is due, and runs every due alarm exactly once. The whole tick
//! runs under a named [`RunLock`]; a tick that finds the lock held does
//! nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::lock::{DEFAULT_LOCK_TTL, LockGuard, RunLock};
use crate::runner::AlarmRunner;
use crate::types::{Alarm, AlarmRecord, Period};

/// Default tick cadence: once a day.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(86_400);

/// Returns true if an alarm with `period`, last run at `last_run`, is due at `now`.
///
/// An alarm that never ran is always due. Otherwise the UTC calendar days
/// between the last run and `now` must reach the period length, so the time
/// of day a tick lands at does not matter.
#[must_use]
pub fn is_due(period: Period, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    last_run.is_none_or(|last| {
        (now.date_naive() - last.date_naive()).num_days() >= period.min_days()
    })
}

/// Configuration for the alarm scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name of the run lock guarding a tick.
    pub lock_key: String,
    /// Run lock expiry.
    pub lock_ttl: Duration,
    /// Time between ticks.
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lock_key: "chk_alarm".to_string(),
            lock_ttl: DEFAULT_LOCK_TTL,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    /// Sets the run lock name.
    #[must_use]
    pub fn with_lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = key.into();
        self
    }

    /// Sets the run lock expiry.
    #[must_use]
    pub const fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Sets the time between ticks.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// True if another worker held the lock and nothing ran.
    pub lock_held: bool,
    /// Alarms that were due and ran.
    pub evaluated: usize,
    /// Alarms that were not due.
    pub skipped: usize,
    /// Alarms whose run ended in an error.
    pub errored: usize,
    /// Evaluations that fired.
    pub fired: usize,
    /// Reports appended.
    pub reports: usize,
}

/// Runs due alarms on every tick.
#[derive(Debug)]
pub struct AlarmScheduler {
    runner: AlarmRunner,
    lock: Arc<dyn RunLock>,
    config: SchedulerConfig,
}

impl AlarmScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(runner: AlarmRunner, lock: Arc<dyn RunLock>, config: SchedulerConfig) -> Self {
        Self {
            runner,
            lock,
            config,
        }
    }

    /// Returns the scheduler configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs one tick as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the run lock fails or the active alarms cannot be
    /// listed. Failures of individual alarms are counted in the summary.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let Some(_guard) = LockGuard::acquire(
            self.lock.as_ref(),
            &self.config.lock_key,
            self.config.lock_ttl,
            now,
        )?
        else {
            info!(key = %self.config.lock_key, "alarm tick already running, skipping");
            return Ok(TickSummary {
                lock_held: true,
                ..TickSummary::default()
            });
        };

        let records = self.runner.store().active_alarms()?;
        debug!(alarms = records.len(), "alarm tick started");

        let mut summary = TickSummary::default();
        for record in records {
            self.tick_one(record, now, &mut summary);
        }

        info!(
            evaluated = summary.evaluated,
            skipped = summary.skipped,
            errored = summary.errored,
            fired = summary.fired,
            reports = summary.reports,
            "alarm tick finished"
        );
        Ok(summary)
    }

    fn tick_one(&self, record: AlarmRecord, now: DateTime<Utc>, summary: &mut TickSummary) {
        let alarm_id = record.id.clone();
        let threshold = record.threshold;

        let alarm = match Alarm::try_from(record) {
            Ok(alarm) => alarm,
            Err(e) => {
                warn!(alarm_id = %alarm_id, error = %e, "cannot decode alarm");
                summary.errored += 1;
                match self.runner.record_failure(&alarm_id, threshold, now, &e) {
                    Ok(_) => summary.reports += 1,
                    Err(store_err) => {
                        warn!(
                            alarm_id = %alarm_id,
                            error = %store_err,
                            "failed to record alarm error"
                        );
                    }
                }
                return;
            }
        };

        if !alarm.active {
            summary.skipped += 1;
            return;
        }

        let last_run = match self.runner.store().latest_report(&alarm.id) {
            Ok(report) => report.map(|r| r.run_at),
            Err(e) => {
                warn!(alarm_id = %alarm.id, error = %e, "failed to read latest alarm report");
                summary.errored += 1;
                return;
            }
        };

        if !is_due(alarm.period, last_run, now) {
            debug!(alarm_id = %alarm.id, period = %alarm.period, "alarm not due");
            summary.skipped += 1;
            return;
        }

        match self.runner.run(&alarm, now) {
            Ok(outcome) => {
                summary.evaluated += 1;
                summary.fired += outcome.fired;
                summary.reports += outcome.reports.len();
                if outcome.failed() {
                    summary.errored += 1;
                }
            }
            Err(e) => {
                warn!(alarm_id = %alarm.id, error = %e, "alarm run failed");
                summary.errored += 1;
            }
        }
    }
}
