//! Periodic threshold alarms over CDR traffic metrics.
//!
//! `cdr-alarms` evaluates user-defined alarms against the metrics computed by
//! `cdr-metrics` and tells the right people when a threshold is crossed.
//!
//! # Features
//!
//! - **Comparison modes**: absolute thresholds and day-over-day or
//!   week-over-week changes, absolute or in percent
//! - **Scheduling**: daily, weekly and monthly alarms driven by one fixed tick
//! - **Run locks**: overlapping ticks never send duplicate notifications
//! - **Reports**: every evaluation leaves an append-only [`AlarmReport`]
//! - **Daily report**: the previous day's traffic summary for the operators
//! - **Prefix notices**: throttled blacklist/whitelist match notices
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cdr_alarms::{
//!     AlarmRecord, AlarmRunner, AlarmScheduler, MemoryAlarmStore, MemoryRunLock,
//!     RecordingDispatcher, ReportStatus, SchedulerConfig,
//! };
//! use cdr_metrics::{CdrMetricSource, DailyAnalytic, MemoryCdrStore};
//! use chrono::{TimeZone, Utc};
//!
//! // Two days of pre-aggregated call durations: 100s, then 130s.
//! let cdrs = MemoryCdrStore::new();
//! for (day, avg) in [(1, 100), (2, 130)] {
//!     cdrs.push_analytic(DailyAnalytic {
//!         date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
//!         call_count: 1,
//!         total_duration_secs: avg,
//!     });
//! }
//!
//! // ALOC increased by more than 20%.
//! let alarms = MemoryAlarmStore::new();
//! alarms.insert_alarm(AlarmRecord {
//!     id: "aloc-up".into(),
//!     name: "ALOC up".into(),
//!     metric: 1,
//!     period: 1,
//!     comparison_base: 1,
//!     comparison_mode: 6,
//!     threshold: 20.0,
//!     active: true,
//!     recipients: vec!["noc@example.com".into()],
//! }).unwrap();
//!
//! let dispatcher = RecordingDispatcher::new();
//! let runner = AlarmRunner::new(
//!     Arc::new(CdrMetricSource::new(Arc::new(cdrs))),
//!     Arc::new(alarms.clone()),
//!     Arc::new(dispatcher.clone()),
//! );
//! let lock = Arc::new(MemoryRunLock::new());
//! let scheduler = AlarmScheduler::new(runner, lock, SchedulerConfig::default());
//!
//! let summary = scheduler.tick(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()).unwrap();
//! assert_eq!(summary.fired, 1);
//! assert_eq!(alarms.reports("aloc-up")[0].status, ReportStatus::AlarmSent);
//! assert_eq!(dispatcher.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channels;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod lock;
pub mod prefix;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;
pub mod window;

// Re-export main types at crate root
pub use channels::{AlarmEvent, LogDispatcher, Notice, NotificationDispatcher, RecordingDispatcher};
pub use config::EngineConfig;
pub use engine::{Engine, EngineTick};
pub use error::{AlarmError, Result};
pub use evaluator::{Decision, evaluate, percent_difference};
pub use lock::{DEFAULT_LOCK_TTL, LockGuard, LockToken, MemoryRunLock, RunLock};
pub use prefix::{PrefixList, PrefixNotifier, PrefixRules};
pub use report::{DailyReport, DailyReportJob, ReportConfig, ReportRun};
pub use runner::{AlarmRunner, RunOutcome};
pub use scheduler::{AlarmScheduler, SchedulerConfig, TickSummary, is_due};
pub use service::{ServiceHandle, start_engine_task};
pub use store::{AlarmStore, MemoryAlarmStore};
pub use types::{
    Alarm, AlarmBuilder, AlarmRecord, AlarmReport, ComparisonBase, ComparisonMode, Period,
    ReportStatus,
};
pub use window::{WindowCalculator, WindowPair};
