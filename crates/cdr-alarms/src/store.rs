//! Alarm persistence contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{AlarmError, Result};
use crate::types::{AlarmRecord, AlarmReport};

/// The narrow read/write surface the engine needs from alarm persistence.
pub trait AlarmStore: Send + Sync + std::fmt::Debug {
    /// All alarm definitions with `active = true`.
    fn active_alarms(&self) -> Result<Vec<AlarmRecord>>;

    /// The most recent report of an alarm, by `run_at`.
    fn latest_report(&self, alarm_id: &str) -> Result<Option<AlarmReport>>;

    /// Appends a report. Reports are never updated or removed.
    fn append_report(&self, report: AlarmReport) -> Result<()>;
}

/// Thread-safe in-memory [`AlarmStore`].
///
/// Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlarmStore {
    alarms: Arc<RwLock<Vec<AlarmRecord>>>,
    reports: Arc<RwLock<HashMap<String, Vec<AlarmReport>>>>,
}

impl MemoryAlarmStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alarm definition.
    ///
    /// # Errors
    ///
    /// Returns `AlarmError::Storage` if an alarm with the same ID already exists.
    pub fn insert_alarm(&self, record: AlarmRecord) -> Result<()> {
        let mut alarms = self.alarms.write();
        if alarms.iter().any(|a| a.id == record.id) {
            return Err(AlarmError::storage(format!(
                "alarm with ID '{}' already exists",
                record.id
            )));
        }
        debug!(alarm_id = %record.id, alarm_name = %record.name, "stored alarm");
        alarms.push(record);
        Ok(())
    }

    /// Returns every report of an alarm, oldest first.
    #[must_use]
    pub fn reports(&self, alarm_id: &str) -> Vec<AlarmReport> {
        self.reports.read().get(alarm_id).cloned().unwrap_or_default()
    }

    /// Returns the total number of reports across all alarms.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.reports.read().values().map(Vec::len).sum()
    }

    /// Returns the number of alarm definitions.
    #[must_use]
    pub fn alarm_count(&self) -> usize {
        self.alarms.read().len()
    }
}

impl AlarmStore for MemoryAlarmStore {
    fn active_alarms(&self) -> Result<Vec<AlarmRecord>> {
        Ok(self
            .alarms
            .read()
            .iter()
            .filter(|a| a.active)
            .cloned()
            .collect())
    }

    fn latest_report(&self, alarm_id: &str) -> Result<Option<AlarmReport>> {
        Ok(self
            .reports
            .read()
            .get(alarm_id)
            .and_then(|reports| reports.iter().max_by_key(|r| r.run_at))
            .cloned())
    }

    fn append_report(&self, report: AlarmReport) -> Result<()> {
        self.reports
            .write()
            .entry(report.alarm_id.clone())
            .or_default()
            .push(report);
        Ok(())
    }
}
