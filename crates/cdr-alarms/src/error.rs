//! Error types for the cdr-alarms crate.

use cdr_metrics::MetricsError;
use thiserror::Error;

/// Errors that can occur while scheduling and evaluating alarms.
#[derive(Debug, Error)]
pub enum AlarmError {
    /// The alarm definition cannot be evaluated as stored.
    #[error("configuration error: {reason}")]
    Configuration {
        /// What is wrong with the definition.
        reason: String,
    },

    /// The metric has no value for the window.
    #[error("data unavailable: {reason}")]
    DataUnavailable {
        /// Why no value could be produced.
        reason: String,
    },

    /// The metric source failed; retried on the next tick.
    #[error("source error: {reason}")]
    Source {
        /// The reason the query failed.
        reason: String,
    },

    /// Reading or writing alarm persistence failed.
    #[error("storage error: {reason}")]
    Storage {
        /// The reason the storage operation failed.
        reason: String,
    },

    /// Notification delivery failed.
    #[error("notification failed: {reason}")]
    NotificationFailed {
        /// The reason the notification failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AlarmError {
    /// Shorthand for a [`AlarmError::Configuration`].
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`AlarmError::Storage`].
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    /// A short, stable name for the error class, used as a log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::Source { .. } => "source",
            Self::Storage { .. } => "storage",
            Self::NotificationFailed { .. } => "notification",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<MetricsError> for AlarmError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::DataUnavailable { .. } => Self::DataUnavailable {
                reason: err.to_string(),
            },
            MetricsError::SourceError { reason } => Self::Source { reason },
            MetricsError::UnknownMetric { .. } => Self::Configuration {
                reason: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for AlarmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for alarm operations.
pub type Result<T> = std::result::Result<T, AlarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_configuration() {
        let err = AlarmError::configuration("unknown comparison mode 9");
        assert_eq!(err.to_string(), "configuration error: unknown comparison mode 9");
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn error_display_storage() {
        let err = AlarmError::storage("disk full");
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn from_metrics_data_unavailable() {
        let err: AlarmError = MetricsError::unavailable("asr", "no call attempts").into();
        assert!(matches!(err, AlarmError::DataUnavailable { .. }));
        assert_eq!(
            err.to_string(),
            "data unavailable: data unavailable for asr: no call attempts"
        );
    }

    #[test]
    fn from_metrics_source_error() {
        let err: AlarmError = MetricsError::source("connection refused").into();
        assert!(matches!(err, AlarmError::Source { ref reason } if reason == "connection refused"));
        assert_eq!(err.kind(), "source");
    }

    #[test]
    fn from_metrics_unknown_metric() {
        let err: AlarmError = MetricsError::UnknownMetric { code: 4 }.into();
        assert!(matches!(err, AlarmError::Configuration { .. }));
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("invalid json");
        assert!(json_err.is_err());
        let alarm_err: AlarmError = json_err.unwrap_err().into();
        assert!(matches!(alarm_err, AlarmError::Serialization(_)));
    }
}
