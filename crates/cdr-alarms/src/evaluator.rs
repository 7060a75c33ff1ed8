//! Threshold evaluation.
//!
//! Every [`ComparisonMode`] is one row of [`ComparisonMode::rule`]: which
//! quantity is measured and on which side of the threshold it fires.
//!
//! | mode                        | measure                 | fires when            |
//! |-----------------------------|-------------------------|-----------------------|
//! | `LessThan`                  | current                 | `threshold < current` |
//! | `GreaterThan`               | current                 | `threshold > current` |
//! | `DecreaseByMoreThan`        | `abs(current - previous)` | `diff < threshold`  |
//! | `IncreaseByMoreThan`        | `abs(current - previous)` | `diff > threshold`  |
//! | `PercentDecreaseByMoreThan` | percentage difference   | `pct < threshold`     |
//! | `PercentIncreaseByMoreThan` | percentage difference   | `pct > threshold`     |
//!
//! The decrease rows fire on a *small* difference. This is the long-standing
//! behaviour of stored alarms and is kept as is.

use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, Result};
use crate::types::ComparisonMode;

/// Result of comparing a sample against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The threshold was crossed.
    Fired,
    /// The threshold was not crossed.
    NotFired,
}

impl Decision {
    /// Returns true for [`Decision::Fired`].
    #[must_use]
    pub const fn is_fired(&self) -> bool {
        matches!(self, Self::Fired)
    }

    const fn from_bool(fired: bool) -> Self {
        if fired { Self::Fired } else { Self::NotFired }
    }
}

/// The quantity a mode compares against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// The current sample itself.
    Current,
    /// `abs(current - previous)`.
    AbsoluteDifference,
    /// `abs(current - previous) / ((current + previous) / 2) * 100`.
    PercentDifference,
}

/// Which side of the threshold the measure must be on to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiresWhen {
    /// `measure > threshold`.
    Above,
    /// `measure < threshold`.
    Below,
}

impl ComparisonMode {
    /// The firing rule of this mode.
    #[must_use]
    pub const fn rule(&self) -> (Measure, FiresWhen) {
        match self {
            Self::LessThan => (Measure::Current, FiresWhen::Above),
            Self::GreaterThan => (Measure::Current, FiresWhen::Below),
            Self::DecreaseByMoreThan => (Measure::AbsoluteDifference, FiresWhen::Below),
            Self::IncreaseByMoreThan => (Measure::AbsoluteDifference, FiresWhen::Above),
            Self::PercentDecreaseByMoreThan => (Measure::PercentDifference, FiresWhen::Below),
            Self::PercentIncreaseByMoreThan => (Measure::PercentDifference, FiresWhen::Above),
        }
    }
}

/// Percentage difference of two samples relative to their mean.
///
/// Returns `None` when the mean is zero.
#[must_use]
pub fn percent_difference(current: f64, previous: f64) -> Option<f64> {
    let mean = (current + previous) / 2.0;
    if mean.abs() < f64::EPSILON {
        return None;
    }
    Some((current - previous).abs() / mean * 100.0)
}

/// Compares samples against `threshold` using `mode`.
///
/// # Errors
///
/// - `AlarmError::Configuration` if `mode` needs a previous sample and none is given
/// - `AlarmError::DataUnavailable` if the percentage difference has a zero mean
pub fn evaluate(
    mode: ComparisonMode,
    threshold: f64,
    current: f64,
    previous: Option<f64>,
) -> Result<Decision> {
    let (measure, fires_when) = mode.rule();

    let value = match measure {
        Measure::Current => current,
        Measure::AbsoluteDifference => (current - require_previous(mode, previous)?).abs(),
        Measure::PercentDifference => {
            let previous = require_previous(mode, previous)?;
            percent_difference(current, previous).ok_or_else(|| AlarmError::DataUnavailable {
                reason: format!(
                    "percentage difference undefined for current={current} previous={previous}"
                ),
            })?
        }
    };

    let fired = match fires_when {
        FiresWhen::Above => value > threshold,
        FiresWhen::Below => value < threshold,
    };

    Ok(Decision::from_bool(fired))
}

fn require_previous(mode: ComparisonMode, previous: Option<f64>) -> Result<f64> {
    previous.ok_or_else(|| {
        AlarmError::configuration(format!("comparison mode {mode} needs a previous sample"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fired(mode: ComparisonMode, threshold: f64, current: f64, previous: Option<f64>) -> bool {
        evaluate(mode, threshold, current, previous).unwrap().is_fired()
    }

    mod table_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(0.8, 0.9, true ; "threshold below current")]
        #[test_case(0.9, 0.8, false ; "threshold above current")]
        #[test_case(0.8, 0.8, false ; "equal")]
        fn less_than(threshold: f64, current: f64, expected: bool) {
            assert_eq!(fired(ComparisonMode::LessThan, threshold, current, None), expected);
        }

        #[test_case(0.8, 0.9, false ; "threshold below current")]
        #[test_case(0.9, 0.8, true ; "threshold above current")]
        #[test_case(0.8, 0.8, false ; "equal")]
        fn greater_than(threshold: f64, current: f64, expected: bool) {
            assert_eq!(fired(ComparisonMode::GreaterThan, threshold, current, None), expected);
        }

        #[test_case(10.0, 100.0, 95.0, true ; "small drop fires")]
        #[test_case(10.0, 100.0, 50.0, false ; "large drop does not fire")]
        #[test_case(10.0, 100.0, 105.0, true ; "small rise fires")]
        fn decrease_by_more_than(threshold: f64, previous: f64, current: f64, expected: bool) {
            assert_eq!(
                fired(ComparisonMode::DecreaseByMoreThan, threshold, current, Some(previous)),
                expected
            );
        }

        #[test_case(10.0, 100.0, 150.0, true ; "large rise fires")]
        #[test_case(10.0, 100.0, 50.0, true ; "large drop fires")]
        #[test_case(10.0, 100.0, 105.0, false ; "small change does not fire")]
        fn increase_by_more_than(threshold: f64, previous: f64, current: f64, expected: bool) {
            assert_eq!(
                fired(ComparisonMode::IncreaseByMoreThan, threshold, current, Some(previous)),
                expected
            );
        }

        #[test_case(100.0, 130.0, true ; "twenty six percent")]
        #[test_case(100.0, 110.0, false ; "nine and a half percent")]
        fn percent_increase(previous: f64, current: f64, expected: bool) {
            assert_eq!(
                fired(ComparisonMode::PercentIncreaseByMoreThan, 20.0, current, Some(previous)),
                expected
            );
        }

        #[test_case(100.0, 130.0, false ; "twenty six percent")]
        #[test_case(100.0, 110.0, true ; "nine and a half percent")]
        fn percent_decrease(previous: f64, current: f64, expected: bool) {
            assert_eq!(
                fired(ComparisonMode::PercentDecreaseByMoreThan, 20.0, current, Some(previous)),
                expected
            );
        }
    }

    #[test]
    fn percent_difference_values() {
        let pct = percent_difference(130.0, 100.0).unwrap();
        assert!((pct - 26.086_956_521_739_13).abs() < 1e-9);
        let pct = percent_difference(110.0, 100.0).unwrap();
        assert!((pct - 9.523_809_523_809_524).abs() < 1e-9);
        assert!(percent_difference(0.0, 0.0).is_none());
    }

    #[test]
    fn zero_mean_is_data_unavailable() {
        let err =
            evaluate(ComparisonMode::PercentIncreaseByMoreThan, 5.0, 0.0, Some(0.0)).unwrap_err();
        assert!(matches!(err, AlarmError::DataUnavailable { .. }));
    }

    #[test]
    fn dual_modes_require_previous() {
        for mode in ComparisonMode::ALL.iter().filter(|m| m.needs_previous()) {
            let err = evaluate(*mode, 1.0, 1.0, None).unwrap_err();
            assert!(matches!(err, AlarmError::Configuration { .. }), "{mode}");
        }
    }

    #[test]
    fn single_modes_ignore_previous() {
        assert!(fired(ComparisonMode::LessThan, 1.0, 2.0, Some(1_000.0)));
        assert!(fired(ComparisonMode::GreaterThan, 3.0, 2.0, Some(-1_000.0)));
    }

    proptest! {
        #[test]
        fn less_than_iff_threshold_below(t in -1e6f64..1e6, c in -1e6f64..1e6) {
            prop_assert_eq!(fired(ComparisonMode::LessThan, t, c, None), t < c);
        }

        #[test]
        fn greater_than_iff_threshold_above(t in -1e6f64..1e6, c in -1e6f64..1e6) {
            prop_assert_eq!(fired(ComparisonMode::GreaterThan, t, c, None), t > c);
        }

        #[test]
        fn absolute_modes(t in 0f64..1e6, c in -1e6f64..1e6, p in -1e6f64..1e6) {
            let diff = (c - p).abs();
            prop_assert_eq!(fired(ComparisonMode::DecreaseByMoreThan, t, c, Some(p)), diff < t);
            prop_assert_eq!(fired(ComparisonMode::IncreaseByMoreThan, t, c, Some(p)), diff > t);
        }

        #[test]
        fn percent_modes(t in 0f64..200.0, c in 0.001f64..1e6, p in 0.001f64..1e6) {
            let pct = (c - p).abs() / ((c + p) / 2.0) * 100.0;
            prop_assert_eq!(
                fired(ComparisonMode::PercentDecreaseByMoreThan, t, c, Some(p)),
                pct < t
            );
            prop_assert_eq!(
                fired(ComparisonMode::PercentIncreaseByMoreThan, t, c, Some(p)),
                pct > t
            );
        }
    }
}
