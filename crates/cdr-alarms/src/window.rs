//! Previous/current window computation.
//!
//! The current window is always yesterday: the day being evaluated must be
//! complete. The previous window is one day or one week before it, depending
//! on the alarm's [`ComparisonBase`].

use cdr_metrics::TimeWindow;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ComparisonBase;

/// The two windows an alarm compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPair {
    /// The historical window.
    pub previous: TimeWindow,
    /// The most recent complete day.
    pub current: TimeWindow,
}

/// Computes the windows an alarm is evaluated over.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowCalculator;

impl WindowCalculator {
    /// Creates a calculator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Windows for an evaluation running at `now`: current is the day before `now`.
    #[must_use]
    pub fn for_evaluation(&self, base: ComparisonBase, now: DateTime<Utc>) -> WindowPair {
        let yesterday = now.date_naive() - Duration::days(1);
        self.for_reference_day(base, yesterday)
    }

    /// Windows whose current day is `day`.
    #[must_use]
    pub fn for_reference_day(&self, base: ComparisonBase, day: NaiveDate) -> WindowPair {
        let previous_day = day - Duration::days(base.offset_days());
        WindowPair {
            previous: TimeWindow::full_day(previous_day),
            current: TimeWindow::full_day(day),
        }
    }
}
