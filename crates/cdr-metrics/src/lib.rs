//! CDR traffic metrics computed over calendar-day windows.
#![forbid(unsafe_code)]
//!
//! `cdr-metrics` is the data-source side of the alarm engine. It defines the
//! query contract of the CDR store ([`CdrStore`]) and computes the two traffic
//! metrics alarms can watch:
//!
//! - **ALOC**: average length of call, from the pre-aggregated daily analytics
//! - **ASR**: answer-seizure ratio, from raw CDR counts
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cdr_metrics::{
//!     CdrMetricSource, CdrRecord, HangupCause, MemoryCdrStore, MetricSource, MetricType,
//!     TimeWindow,
//! };
//! use chrono::{NaiveDate, TimeZone, Utc};
//!
//! let store = MemoryCdrStore::new();
//! store.add_hangup_cause(HangupCause { id: 1, code: 16, name: "NORMAL_CLEARING".into() });
//! store.push_record(CdrRecord {
//!     start: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
//!     duration_secs: 42,
//!     hangup_cause_id: 1,
//!     destination: "34650".into(),
//! });
//!
//! let source = CdrMetricSource::new(Arc::new(store));
//! let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let window = TimeWindow::full_day(day);
//! let sample = source.compute(MetricType::AnswerSeizureRatio, &window).unwrap();
//! assert!((sample.value - 1.0).abs() < f64::EPSILON);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod source;
pub mod storage;
pub mod types;

// Re-export main types at crate root
pub use error::{MetricsError, Result};
pub use source::{CdrMetricSource, MetricSource};
pub use storage::{CdrStore, MemoryCdrStore};
pub use types::{
    AggregateRow, CallSummary, CdrRecord, DailyAnalytic, HangupCause, MetricSample, MetricType,
    NORMAL_CLEARING, TimeWindow,
};
