//! The daily CDR traffic report.
//!
//! Once a day the previous day's calls are summarised and the summary is
//! handed to each report recipient. The job runs under its own run lock so
//! that two workers never send the report twice. Recipients whose delivery
//! failed are retried on later ticks of the same day.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use cdr_metrics::{CallSummary, CdrStore, NORMAL_CLEARING, TimeWindow};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channels::{Notice, NotificationDispatcher};
use crate::error::Result;
use crate::lock::{DEFAULT_LOCK_TTL, LockGuard, RunLock};

/// Summary of one day of calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    /// The day summarised.
    pub day: NaiveDate,
    /// Number of calls started that day.
    pub total_calls: u64,
    /// Sum of call durations in seconds.
    pub total_duration_secs: u64,
    /// Average call duration in seconds; 0 without calls.
    pub acd: f64,
    /// Average calls per hour, floored.
    pub act: u64,
    /// Answer-seizure ratio, when the day had calls and the answered cause is known.
    pub asr: Option<f64>,
    /// Call counts keyed by hangup cause id.
    pub by_hangup_cause: BTreeMap<u32, u64>,
}

impl DailyReport {
    /// Builds the report for `day` from a store summary.
    ///
    /// `answered_cause_id` is the store id of the cause counted as answered.
    #[must_use]
    pub fn from_summary(
        day: NaiveDate,
        summary: CallSummary,
        answered_cause_id: Option<u32>,
    ) -> Self {
        let total = summary.total_calls;
        let acd = if total == 0 {
            0.0
        } else {
            summary.total_duration_secs as f64 / total as f64
        };
        let asr = match (total, answered_cause_id) {
            (0, _) | (_, None) => None,
            (_, Some(id)) => {
                let answered = summary.by_hangup_cause.get(&id).copied().unwrap_or(0);
                Some(answered as f64 / total as f64)
            }
        };

        Self {
            day,
            total_calls: total,
            total_duration_secs: summary.total_duration_secs,
            acd,
            act: total / 24,
            asr,
            by_hangup_cause: summary.by_hangup_cause,
        }
    }
}

/// Settings of the daily report job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Who receives the report.
    pub recipients: Vec<String>,
    /// Name of the run lock.
    pub lock_key: String,
    /// Run lock expiry.
    pub lock_ttl: Duration,
    /// Q.850 code counted as an answered call.
    pub answered_cause: u16,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            lock_key: "send_cdr_report".to_string(),
            lock_ttl: DEFAULT_LOCK_TTL,
            answered_cause: NORMAL_CLEARING,
        }
    }
}

impl ReportConfig {
    /// Sets the report recipients.
    #[must_use]
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Sets the run lock expiry.
    #[must_use]
    pub const fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Sets the Q.850 code counted as answered.
    #[must_use]
    pub const fn with_answered_cause(mut self, code: u16) -> Self {
        self.answered_cause = code;
        self
    }
}

/// What one invocation of the report job did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRun {
    /// Another worker holds the report lock.
    LockHeld,
    /// No recipients are configured.
    NoRecipients,
    /// Every recipient already has the report for this day.
    AlreadySent(NaiveDate),
    /// The report was built and handed to the recipients still waiting for it.
    Sent {
        /// The report.
        report: DailyReport,
        /// Recipients the dispatcher accepted on this run.
        delivered: usize,
        /// Recipients still waiting, retried on the next run.
        pending: usize,
    },
}

/// Builds and dispatches the previous day's report.
#[derive(Debug)]
pub struct DailyReportJob {
    store: Arc<dyn CdrStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    lock: Arc<dyn RunLock>,
    config: ReportConfig,
    deliveries: Mutex<Deliveries>,
}

/// Recipients that accepted the report for one day.
#[derive(Debug, Default)]
struct Deliveries {
    day: Option<NaiveDate>,
    accepted: BTreeSet<String>,
}

impl Deliveries {
    /// Configured recipients that have not yet accepted the report for `day`.
    fn pending<'a>(&mut self, day: NaiveDate, recipients: &'a [String]) -> Vec<&'a String> {
        if self.day != Some(day) {
            self.day = Some(day);
            self.accepted.clear();
        }
        recipients
            .iter()
            .filter(|r| !self.accepted.contains(*r))
            .collect()
    }
}

impl DailyReportJob {
    /// Creates a report job.
    #[must_use]
    pub fn new(
        store: Arc<dyn CdrStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        lock: Arc<dyn RunLock>,
        config: ReportConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            lock,
            config,
            deliveries: Mutex::new(Deliveries::default()),
        }
    }

    /// Returns the job settings.
    #[must_use]
    pub const fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Builds the report for `day` without sending it.
    ///
    /// # Errors
    ///
    /// Returns an error if the CDR store cannot be queried.
    pub fn build(&self, day: NaiveDate) -> Result<DailyReport> {
        let window = TimeWindow::full_day(day);
        let summary = self.store.summarize(&window)?;
        let answered = self.store.hangup_cause_id(self.config.answered_cause)?;
        if answered.is_none() {
            debug!(code = self.config.answered_cause, "answered hangup cause not found");
        }
        Ok(DailyReport::from_summary(day, summary, answered))
    }

    /// Sends the report for the day before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the run lock or the CDR store fails. Delivery
    /// failures are logged, and the recipient stays pending for the day.
    pub fn run(&self, now: DateTime<Utc>) -> Result<ReportRun> {
        let Some(_guard) = LockGuard::acquire(
            self.lock.as_ref(),
            &self.config.lock_key,
            self.config.lock_ttl,
            now,
        )?
        else {
            info!(key = %self.config.lock_key, "daily report already running, skipping");
            return Ok(ReportRun::LockHeld);
        };

        if self.config.recipients.is_empty() {
            warn!("no report recipients configured, skipping daily report");
            return Ok(ReportRun::NoRecipients);
        }

        let day = now.date_naive() - chrono::Duration::days(1);
        let waiting = self.deliveries.lock().pending(day, &self.config.recipients);
        if waiting.is_empty() {
            debug!(day = %day, "daily report already sent");
            return Ok(ReportRun::AlreadySent(day));
        }

        let report = self.build(day)?;
        let notice = Notice::DailyReport(report.clone());

        let mut delivered = 0;
        let mut pending = 0;
        for recipient in waiting {
            match self
                .dispatcher
                .notify(&notice, std::slice::from_ref(recipient))
            {
                Ok(()) => {
                    self.deliveries.lock().accepted.insert(recipient.clone());
                    delivered += 1;
                }
                Err(e) => {
                    pending += 1;
                    warn!(
                        recipient = %recipient,
                        dispatcher = self.dispatcher.name(),
                        error = %e,
                        "failed to send daily report"
                    );
                }
            }
        }

        info!(
            day = %day,
            total_calls = report.total_calls,
            delivered,
            pending,
            "daily report sent"
        );
        Ok(ReportRun::Sent {
            report,
            delivered,
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::RecordingDispatcher;
    use crate::lock::MemoryRunLock;
    use cdr_metrics::{CdrRecord, HangupCause, MemoryCdrStore};
    use chrono::TimeZone;

    fn summary(total: u64, duration: u64, causes: &[(u32, u64)]) -> CallSummary {
        CallSummary {
            total_calls: total,
            total_duration_secs: duration,
            by_hangup_cause: causes.iter().copied().collect(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, 6, 0, 0).unwrap()
    }

    fn store() -> MemoryCdrStore {
        let store = MemoryCdrStore::new();
        store.add_hangup_cause(HangupCause {
            id: 7,
            code: NORMAL_CLEARING,
            name: "NORMAL_CLEARING".to_string(),
        });
        store.add_hangup_cause(HangupCause {
            id: 8,
            code: 17,
            name: "USER_BUSY".to_string(),
        });
        for hour in 0..10 {
            store.push_record(CdrRecord {
                start: Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap(),
                duration_secs: 60,
                hangup_cause_id: if hour < 8 { 7 } else { 8 },
                destination: "34650".to_string(),
            });
        }
        // Outside the report day.
        store.push_record(CdrRecord {
            start: Utc.with_ymd_and_hms(2024, 3, 11, 1, 0, 0).unwrap(),
            duration_secs: 999,
            hangup_cause_id: 7,
            destination: "34650".to_string(),
        });
        store
    }

    fn job(
        dispatcher: &RecordingDispatcher,
        lock: &MemoryRunLock,
        recipients: &[&str],
    ) -> DailyReportJob {
        DailyReportJob::new(
            Arc::new(store()),
            Arc::new(dispatcher.clone()),
            Arc::new(lock.clone()),
            ReportConfig::default()
                .with_recipients(recipients.iter().map(ToString::to_string).collect()),
        )
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn averages() {
            let totals = summary(48, 4800, &[(1, 36), (2, 12)]);
            let report = DailyReport::from_summary(day(), totals, Some(1));
            assert_eq!(report.total_calls, 48);
            assert!((report.acd - 100.0).abs() < f64::EPSILON);
            assert_eq!(report.act, 2);
            assert!((report.asr.unwrap() - 0.75).abs() < f64::EPSILON);
        }

        #[test]
        fn act_is_floored() {
            let report = DailyReport::from_summary(day(), summary(47, 0, &[]), None);
            assert_eq!(report.act, 1);
        }

        #[test]
        fn empty_day() {
            let report = DailyReport::from_summary(day(), summary(0, 0, &[]), Some(1));
            assert!(report.acd.abs() < f64::EPSILON);
            assert_eq!(report.act, 0);
            assert!(report.asr.is_none());
        }

        #[test]
        fn unknown_answered_cause_has_no_asr() {
            let report = DailyReport::from_summary(day(), summary(10, 100, &[(1, 10)]), None);
            assert!(report.asr.is_none());
        }

        #[test]
        fn answered_cause_without_calls_is_zero() {
            let report = DailyReport::from_summary(day(), summary(10, 100, &[(2, 10)]), Some(1));
            assert_eq!(report.asr, Some(0.0));
        }
    }

    #[test]
    fn build_summarises_one_day() {
        let dispatcher = RecordingDispatcher::new();
        let report = job(&dispatcher, &MemoryRunLock::new(), &[]).build(day()).unwrap();
        assert_eq!(report.total_calls, 10);
        assert_eq!(report.total_duration_secs, 600);
        assert!((report.acd - 60.0).abs() < f64::EPSILON);
        assert!((report.asr.unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(report.by_hangup_cause.get(&7), Some(&8));
    }

    #[test]
    fn run_sends_yesterday_to_each_recipient() {
        let dispatcher = RecordingDispatcher::new();
        let lock = MemoryRunLock::new();
        let outcome = job(&dispatcher, &lock, &["ops@example.com", "cfo@example.com"])
            .run(now())
            .unwrap();

        match outcome {
            ReportRun::Sent {
                report,
                delivered,
                pending,
            } => {
                assert_eq!(report.day, day());
                assert_eq!(delivered, 2);
                assert_eq!(pending, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, vec!["ops@example.com".to_string()]);
        assert!(matches!(sent[0].0, Notice::DailyReport(_)));
        assert!(!lock.is_held("send_cdr_report", now()));
    }

    #[test]
    fn report_goes_out_once_per_day() {
        let dispatcher = RecordingDispatcher::new();
        let job = job(&dispatcher, &MemoryRunLock::new(), &["ops@example.com"]);

        assert!(matches!(job.run(now()).unwrap(), ReportRun::Sent { .. }));
        assert_eq!(
            job.run(now() + chrono::Duration::hours(6)).unwrap(),
            ReportRun::AlreadySent(day())
        );
        assert!(matches!(
            job.run(now() + chrono::Duration::days(1)).unwrap(),
            ReportRun::Sent { .. }
        ));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn run_without_recipients_skips() {
        let dispatcher = RecordingDispatcher::new();
        let outcome = job(&dispatcher, &MemoryRunLock::new(), &[]).run(now()).unwrap();
        assert_eq!(outcome, ReportRun::NoRecipients);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn run_skips_when_lock_held() {
        let dispatcher = RecordingDispatcher::new();
        let lock = MemoryRunLock::new();
        lock.try_acquire("send_cdr_report", DEFAULT_LOCK_TTL, now()).unwrap();
        let outcome = job(&dispatcher, &lock, &["ops@example.com"]).run(now()).unwrap();
        assert_eq!(outcome, ReportRun::LockHeld);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn delivery_failures_are_counted_not_raised() {
        let lock = MemoryRunLock::new();
        let job = DailyReportJob::new(
            Arc::new(store()),
            Arc::new(RecordingDispatcher::failing()),
            Arc::new(lock),
            ReportConfig::default().with_recipients(vec!["ops@example.com".to_string()]),
        );
        match job.run(now()).unwrap() {
            ReportRun::Sent {
                delivered,
                pending,
                ..
            } => {
                assert_eq!(delivered, 0);
                assert_eq!(pending, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// Rejects every notice addressed to the recipients in `down`.
    #[derive(Debug, Default)]
    struct PartialDispatcher {
        down: Mutex<BTreeSet<String>>,
        accepted: Mutex<Vec<String>>,
    }

    impl NotificationDispatcher for PartialDispatcher {
        fn name(&self) -> &str {
            "partial"
        }

        fn notify(&self, _notice: &Notice, recipients: &[String]) -> Result<()> {
            if recipients.iter().any(|r| self.down.lock().contains(r)) {
                return Err(crate::error::AlarmError::NotificationFailed {
                    reason: "mailbox unavailable".to_string(),
                });
            }
            self.accepted.lock().extend(recipients.iter().cloned());
            Ok(())
        }
    }

    #[test]
    fn failed_recipient_is_retried_alone() {
        let dispatcher = Arc::new(PartialDispatcher::default());
        dispatcher.down.lock().insert("cfo@example.com".to_string());
        let job = DailyReportJob::new(
            Arc::new(store()),
            Arc::clone(&dispatcher) as Arc<dyn NotificationDispatcher>,
            Arc::new(MemoryRunLock::new()),
            ReportConfig::default().with_recipients(vec![
                "ops@example.com".to_string(),
                "cfo@example.com".to_string(),
            ]),
        );

        match job.run(now()).unwrap() {
            ReportRun::Sent {
                delivered,
                pending,
                ..
            } => assert_eq!((delivered, pending), (1, 1)),
            other => panic!("unexpected outcome {other:?}"),
        }

        dispatcher.down.lock().clear();
        match job.run(now() + chrono::Duration::hours(1)).unwrap() {
            ReportRun::Sent {
                delivered,
                pending,
                ..
            } => assert_eq!((delivered, pending), (1, 0)),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            job.run(now() + chrono::Duration::hours(2)).unwrap(),
            ReportRun::AlreadySent(day())
        );
        assert_eq!(
            *dispatcher.accepted.lock(),
            vec!["ops@example.com".to_string(), "cfo@example.com".to_string()]
        );
    }

    #[test]
    fn new_day_resends_to_everyone() {
        let dispatcher = RecordingDispatcher::new();
        let recipients = ["ops@example.com", "cfo@example.com"];
        let job = job(&dispatcher, &MemoryRunLock::new(), &recipients);

        job.run(now()).unwrap();
        match job.run(now() + chrono::Duration::days(1)).unwrap() {
            ReportRun::Sent {
                report,
                delivered,
                ..
            } => {
                assert_eq!(report.day, day() + chrono::Duration::days(1));
                assert_eq!(delivered, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(dispatcher.len(), 4);
    }
}
