//! JSON dataset loading.
//!
//! The daemon reads its alarm definitions, past reports and CDR data from one
//! JSON document and serves them from the in-memory stores.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cdr_alarms::{AlarmRecord, AlarmReport, AlarmStore, EngineConfig, MemoryAlarmStore};
use cdr_metrics::{CdrRecord, DailyAnalytic, HangupCause, MemoryCdrStore};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Contents of a dataset file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    /// Engine settings.
    pub config: EngineConfig,
    /// Alarm definitions.
    pub alarms: Vec<AlarmRecord>,
    /// Earlier alarm reports, for due checks.
    pub reports: Vec<AlarmReport>,
    /// Raw call records.
    pub cdrs: Vec<CdrRecord>,
    /// Pre-aggregated daily call statistics.
    pub daily_analytics: Vec<DailyAnalytic>,
    /// The hangup cause catalogue.
    pub hangup_causes: Vec<HangupCause>,
}

/// Stores populated from a dataset.
#[derive(Debug)]
pub struct LoadedData {
    /// Engine settings.
    pub config: EngineConfig,
    /// CDR data.
    pub cdrs: MemoryCdrStore,
    /// Alarm definitions and reports.
    pub alarms: MemoryAlarmStore,
}

impl Dataset {
    /// Reads and parses a dataset file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse dataset {}", path.display()))
    }

    /// Moves the dataset into in-memory stores.
    pub fn into_stores(self) -> Result<LoadedData> {
        let cdrs = MemoryCdrStore::new();
        for cause in self.hangup_causes {
            cdrs.add_hangup_cause(cause);
        }
        cdrs.extend_records(self.cdrs);
        cdrs.extend_analytics(self.daily_analytics);

        let alarms = MemoryAlarmStore::new();
        for record in self.alarms {
            let id = record.id.clone();
            alarms
                .insert_alarm(record)
                .with_context(|| format!("invalid alarm '{id}'"))?;
        }
        for report in self.reports {
            alarms.append_report(report)?;
        }

        info!(
            alarms = alarms.alarm_count(),
            reports = alarms.report_count(),
            cdrs = cdrs.record_count(),
            "dataset loaded"
        );

        Ok(LoadedData {
            config: self.config,
            cdrs,
            alarms,
        })
    }
}
