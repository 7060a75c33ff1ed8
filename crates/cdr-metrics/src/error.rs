//! Error types for the cdr-metrics crate.

use thiserror::Error;

/// Errors that can occur while computing CDR metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The store produced nothing that the metric can be computed from.
    #[error("data unavailable for {metric}: {reason}")]
    DataUnavailable {
        /// The metric being computed.
        metric: String,
        /// Why no value could be produced.
        reason: String,
    },

    /// The underlying store failed to answer a query.
    #[error("source error: {reason}")]
    SourceError {
        /// The reason the query failed.
        reason: String,
    },

    /// A metric code could not be decoded.
    #[error("unknown metric type: {code}")]
    UnknownMetric {
        /// The offending code.
        code: u8,
    },
}

impl MetricsError {
    /// Shorthand for a [`MetricsError::DataUnavailable`].
    pub fn unavailable(metric: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`MetricsError::SourceError`].
    pub fn source(reason: impl Into<String>) -> Self {
        Self::SourceError {
            reason: reason.into(),
        }
    }
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_data_unavailable() {
        let err = MetricsError::unavailable("asr", "no calls in window");
        assert_eq!(err.to_string(), "data unavailable for asr: no calls in window");
    }

    #[test]
    fn error_display_source_error() {
        let err = MetricsError::source("connection reset");
        assert_eq!(err.to_string(), "source error: connection reset");
    }

    #[test]
    fn error_display_unknown_metric() {
        let err = MetricsError::UnknownMetric { code: 9 };
        assert_eq!(err.to_string(), "unknown metric type: 9");
    }
}
