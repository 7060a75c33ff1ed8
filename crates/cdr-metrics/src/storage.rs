//! CDR store contract and an in-memory implementation.
//!
//! The engine never talks to a database directly. It issues the three query
//! shapes of [`CdrStore`]: an aggregation over the pre-bucketed daily
//! analytics, counts over raw CDRs, and the hangup cause lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::types::{AggregateRow, CallSummary, CdrRecord, DailyAnalytic, HangupCause, TimeWindow};

/// Read-only query surface of the CDR data store.
///
/// Implementations own their connection lifecycle and any query timeout.
pub trait CdrStore: Send + Sync + std::fmt::Debug {
    /// Average call duration per day bucket whose `metadata.date` lies in `window`.
    ///
    /// Returns an empty vector when no bucket matches.
    fn aggregate_duration(&self, window: &TimeWindow) -> Result<Vec<AggregateRow>>;

    /// Counts raw CDRs started within `window`, optionally only those with
    /// the given hangup cause id.
    fn count_calls(&self, window: &TimeWindow, hangup_cause_id: Option<u32>) -> Result<u64>;

    /// Resolves a Q.850 cause code to the store's hangup cause id.
    fn hangup_cause_id(&self, code: u16) -> Result<Option<u32>>;

    /// Totals over raw CDRs started within `window`.
    fn summarize(&self, window: &TimeWindow) -> Result<CallSummary>;
}

#[derive(Debug, Default)]
struct Collections {
    cdrs: Vec<CdrRecord>,
    daily: Vec<DailyAnalytic>,
    causes: Vec<HangupCause>,
}

/// Thread-safe in-memory [`CdrStore`].
///
/// Cloning shares the underlying collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryCdrStore {
    data: Arc<RwLock<Collections>>,
}

impl MemoryCdrStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw call record.
    pub fn push_record(&self, record: CdrRecord) {
        self.data.write().cdrs.push(record);
    }

    /// Adds many raw call records.
    pub fn extend_records(&self, records: impl IntoIterator<Item = CdrRecord>) {
        self.data.write().cdrs.extend(records);
    }

    /// Adds a daily analytics bucket.
    pub fn push_analytic(&self, analytic: DailyAnalytic) {
        self.data.write().daily.push(analytic);
    }

    /// Adds many daily analytics buckets.
    pub fn extend_analytics(&self, analytics: impl IntoIterator<Item = DailyAnalytic>) {
        self.data.write().daily.extend(analytics);
    }

    /// Registers a hangup cause in the lookup table.
    pub fn add_hangup_cause(&self, cause: HangupCause) {
        self.data.write().causes.push(cause);
    }

    /// Returns the number of raw records held.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.data.read().cdrs.len()
    }
}

impl CdrStore for MemoryCdrStore {
    fn aggregate_duration(&self, window: &TimeWindow) -> Result<Vec<AggregateRow>> {
        let data = self.data.read();

        let mut buckets: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
        for analytic in data.daily.iter().filter(|a| window.contains(a.date)) {
            let entry = buckets.entry(analytic.date.date_naive()).or_default();
            entry.0 += analytic.call_count;
            entry.1 += analytic.total_duration_secs;
        }
        drop(data);

        let rows: Vec<AggregateRow> = buckets
            .into_iter()
            .filter(|(_, (calls, _))| *calls > 0)
            .map(|(date, (calls, duration))| AggregateRow {
                date,
                call_count: calls,
                duration_avg: duration as f64 / calls as f64,
            })
            .collect();

        debug!(window = %window, rows = rows.len(), "aggregated call duration");
        Ok(rows)
    }

    fn count_calls(&self, window: &TimeWindow, hangup_cause_id: Option<u32>) -> Result<u64> {
        let data = self.data.read();
        let count = data
            .cdrs
            .iter()
            .filter(|r| window.contains(r.start))
            .filter(|r| hangup_cause_id.is_none_or(|id| r.hangup_cause_id == id))
            .count();
        Ok(count as u64)
    }

    fn hangup_cause_id(&self, code: u16) -> Result<Option<u32>> {
        let data = self.data.read();
        Ok(data.causes.iter().find(|c| c.code == code).map(|c| c.id))
    }

    fn summarize(&self, window: &TimeWindow) -> Result<CallSummary> {
        let data = self.data.read();
        let mut summary = CallSummary::default();
        for record in data.cdrs.iter().filter(|r| window.contains(r.start)) {
            summary.total_calls += 1;
            summary.total_duration_secs += record.duration_secs;
            *summary.by_hangup_cause.entry(record.hangup_cause_id).or_default() += 1;
        }
        Ok(summary)
    }
}
