//! Wiring of the scheduler, the daily report and the prefix notifier.

use std::sync::Arc;

use cdr_metrics::{CdrMetricSource, CdrStore};
use chrono::{DateTime, Utc};
use tracing::error;

use crate::channels::NotificationDispatcher;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::lock::RunLock;
use crate::prefix::PrefixNotifier;
use crate::report::{DailyReportJob, ReportRun};
use crate::runner::AlarmRunner;
use crate::scheduler::{AlarmScheduler, TickSummary};
use crate::store::AlarmStore;

/// Outcome of one engine tick.
#[derive(Debug)]
pub struct EngineTick {
    /// The alarm tick.
    pub alarms: Result<TickSummary>,
    /// The daily report.
    pub report: Result<ReportRun>,
}

impl EngineTick {
    /// Returns true if neither job failed outright.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.alarms.is_ok() && self.report.is_ok()
    }
}

/// The assembled alarm engine.
#[derive(Debug)]
pub struct Engine {
    scheduler: AlarmScheduler,
    reports: DailyReportJob,
    prefixes: PrefixNotifier,
    config: EngineConfig,
}

impl Engine {
    /// Builds an engine over the given stores.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        cdrs: Arc<dyn CdrStore>,
        alarms: Arc<dyn AlarmStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        lock: Arc<dyn RunLock>,
    ) -> Self {
        let source =
            CdrMetricSource::new(Arc::clone(&cdrs)).with_answered_cause(config.answered_cause);
        let runner = AlarmRunner::new(Arc::new(source), alarms, Arc::clone(&dispatcher))
            .with_admin_recipients(config.admin_recipients.clone());
        let scheduler = AlarmScheduler::new(runner, Arc::clone(&lock), config.scheduler_config());
        let reports =
            DailyReportJob::new(cdrs, Arc::clone(&dispatcher), lock, config.report_config());
        let prefixes = PrefixNotifier::new(
            dispatcher,
            config.prefixes.clone(),
            config.admin_recipients.clone(),
        )
        .with_notice_delay(config.notice_delay());

        Self {
            scheduler,
            reports,
            prefixes,
            config,
        }
    }

    /// Runs the alarm tick and then the daily report.
    pub fn run_once(&self, now: DateTime<Utc>) -> EngineTick {
        let alarms = self.scheduler.tick(now);
        if let Err(e) = &alarms {
            error!(error = %e, error_kind = e.kind(), "alarm tick failed");
        }

        let report = self.reports.run(now);
        if let Err(e) = &report {
            error!(error = %e, error_kind = e.kind(), "daily report failed");
        }

        EngineTick { alarms, report }
    }

    /// The prefix notifier.
    #[must_use]
    pub const fn prefixes(&self) -> &PrefixNotifier {
        &self.prefixes
    }

    /// The configuration the engine was built from.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}
