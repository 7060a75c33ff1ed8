//! Engine configuration.

use std::time::Duration;

use cdr_metrics::NORMAL_CLEARING;
use serde::{Deserialize, Serialize};

use crate::lock::DEFAULT_LOCK_TTL;
use crate::prefix::{DEFAULT_NOTICE_DELAY, PrefixRules};
use crate::report::ReportConfig;
use crate::scheduler::{DEFAULT_TICK_INTERVAL, SchedulerConfig};

/// Configuration for the whole alarm engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recipients added to every fired alarm and prefix notice.
    pub admin_recipients: Vec<String>,
    /// Recipients of the daily report.
    pub report_recipients: Vec<String>,
    /// Minimum gap between prefix notices of the same kind, in seconds.
    pub notice_delay_secs: u64,
    /// Run lock expiry, in seconds.
    pub lock_ttl_secs: u64,
    /// Time between ticks, in seconds.
    pub tick_interval_secs: u64,
    /// Q.850 code counted as an answered call.
    pub answered_cause: u16,
    /// Blacklist and whitelist prefixes.
    pub prefixes: PrefixRules,
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            admin_recipients: Vec::new(),
            report_recipients: Vec::new(),
            notice_delay_secs: DEFAULT_NOTICE_DELAY.as_secs(),
            lock_ttl_secs: DEFAULT_LOCK_TTL.as_secs(),
            tick_interval_secs: DEFAULT_TICK_INTERVAL.as_secs(),
            answered_cause: NORMAL_CLEARING,
            prefixes: PrefixRules {
                blacklist: Vec::new(),
                whitelist: Vec::new(),
            },
        }
    }

    /// Set the administrator recipients.
    #[must_use]
    pub fn with_admin_recipients(mut self, recipients: Vec<String>) -> Self {
        self.admin_recipients = recipients;
        self
    }

    /// Set the daily report recipients.
    #[must_use]
    pub fn with_report_recipients(mut self, recipients: Vec<String>) -> Self {
        self.report_recipients = recipients;
        self
    }

    /// Set the prefix notice delay.
    #[must_use]
    pub const fn with_notice_delay(mut self, delay: Duration) -> Self {
        self.notice_delay_secs = delay.as_secs();
        self
    }

    /// Set the run lock expiry.
    #[must_use]
    pub const fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the tick interval.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_secs = interval.as_secs();
        self
    }

    /// Set the prefix rules.
    #[must_use]
    pub fn with_prefixes(mut self, prefixes: PrefixRules) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// The prefix notice delay.
    #[must_use]
    pub const fn notice_delay(&self) -> Duration {
        Duration::from_secs(self.notice_delay_secs)
    }

    /// The run lock expiry.
    #[must_use]
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// The tick interval.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Scheduler settings derived from this configuration.
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_lock_ttl(self.lock_ttl())
            .with_tick_interval(self.tick_interval())
    }

    /// Daily report settings derived from this configuration.
    #[must_use]
    pub fn report_config(&self) -> ReportConfig {
        ReportConfig::default()
            .with_recipients(self.report_recipients.clone())
            .with_lock_ttl(self.lock_ttl())
            .with_answered_cause(self.answered_cause)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.notice_delay(), Duration::from_secs(900));
        assert_eq!(config.lock_ttl(), Duration::from_secs(1800));
        assert_eq!(config.tick_interval(), Duration::from_secs(86_400));
        assert_eq!(config.answered_cause, 16);
        assert!(config.prefixes.is_empty());
    }

    #[test]
    fn builders() {
        let config = EngineConfig::new()
            .with_admin_recipients(vec!["admin@example.com".to_string()])
            .with_report_recipients(vec!["ops@example.com".to_string()])
            .with_notice_delay(Duration::from_secs(60))
            .with_lock_ttl(Duration::from_secs(120))
            .with_tick_interval(Duration::from_secs(3600));

        assert_eq!(config.admin_recipients.len(), 1);
        assert_eq!(config.notice_delay_secs, 60);

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.lock_key, "chk_alarm");
        assert_eq!(scheduler.lock_ttl, Duration::from_secs(120));
        assert_eq!(scheduler.tick_interval, Duration::from_secs(3600));

        let report = config.report_config();
        assert_eq!(report.lock_key, "send_cdr_report");
        assert_eq!(report.recipients, vec!["ops@example.com".to_string()]);
        assert_eq!(report.lock_ttl, Duration::from_secs(120));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"admin_recipients":["root@example.com"],"prefixes":{"blacklist":["0900"]}}"#,
        )
        .unwrap();
        assert_eq!(config.admin_recipients, vec!["root@example.com".to_string()]);
        assert_eq!(config.prefixes.blacklist, vec!["0900".to_string()]);
        assert!(config.prefixes.whitelist.is_empty());
        assert_eq!(config.lock_ttl_secs, 1800);
    }
}
