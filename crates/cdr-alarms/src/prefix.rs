//! Blacklist and whitelist prefix notices.
//!
//! When a dialled destination matches a configured prefix list the
//! administrators are told about it. Notices of the same list kind are
//! throttled: after one is sent, the next is held back until `notice_delay`
//! has passed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channels::{Notice, NotificationDispatcher};

/// Default minimum gap between two notices of the same list kind.
pub const DEFAULT_NOTICE_DELAY: Duration = Duration::from_secs(15 * 60);

/// The prefix list a destination matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixList {
    /// Destinations that should not be dialled.
    Blacklist,
    /// Destinations that are explicitly allowed.
    Whitelist,
}

impl PrefixList {
    /// Returns the list kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blacklist => "blacklist",
            Self::Whitelist => "whitelist",
        }
    }
}

impl fmt::Display for PrefixList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configured blacklist and whitelist prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRules {
    /// Blacklisted destination prefixes.
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Whitelisted destination prefixes.
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl PrefixRules {
    /// Returns the list `destination` matches. The blacklist is checked first.
    #[must_use]
    pub fn classify(&self, destination: &str) -> Option<PrefixList> {
        let matches = |prefixes: &[String]| {
            prefixes
                .iter()
                .any(|p| !p.is_empty() && destination.starts_with(p.as_str()))
        };

        if matches(&self.blacklist) {
            Some(PrefixList::Blacklist)
        } else if matches(&self.whitelist) {
            Some(PrefixList::Whitelist)
        } else {
            None
        }
    }

    /// Returns true if no prefixes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blacklist.is_empty() && self.whitelist.is_empty()
    }
}

/// Sends throttled prefix-match notices to the administrators.
#[derive(Debug)]
pub struct PrefixNotifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
    rules: PrefixRules,
    recipients: Vec<String>,
    notice_delay: chrono::Duration,
    last_sent: Mutex<HashMap<PrefixList, DateTime<Utc>>>,
}

impl PrefixNotifier {
    /// Creates a notifier delivering to `recipients`.
    #[must_use]
    pub fn new(
        dispatcher: Arc<dyn NotificationDispatcher>,
        rules: PrefixRules,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            dispatcher,
            rules,
            recipients,
            notice_delay: to_chrono(DEFAULT_NOTICE_DELAY),
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the minimum gap between notices of the same kind.
    #[must_use]
    pub fn with_notice_delay(mut self, delay: Duration) -> Self {
        self.notice_delay = to_chrono(delay);
        self
    }

    /// Classifies `destination` and notifies if it matched a list.
    ///
    /// Returns the matched list and whether a notice went out.
    pub fn observe(&self, destination: &str, now: DateTime<Utc>) -> Option<(PrefixList, bool)> {
        let list = self.rules.classify(destination)?;
        Some((list, self.notify(list, destination, now)))
    }

    /// Sends a notice for `list` unless one went out less than the notice delay ago.
    ///
    /// Returns true if the notice was handed to the dispatcher.
    pub fn notify(&self, list: PrefixList, destination: &str, now: DateTime<Utc>) -> bool {
        let mut last_sent = self.last_sent.lock();

        if let Some(previous) = last_sent.get(&list) {
            let elapsed = now.signed_duration_since(*previous);
            if elapsed < self.notice_delay {
                debug!(
                    list = %list,
                    destination,
                    elapsed_secs = elapsed.num_seconds(),
                    "prefix notice throttled"
                );
                return false;
            }
        }

        let notice = Notice::PrefixMatched {
            list,
            destination: destination.to_string(),
        };
        match self.dispatcher.notify(&notice, &self.recipients) {
            Ok(()) => {
                info!(list = %list, destination, "prefix notice sent");
                last_sent.insert(list, now);
                true
            }
            Err(e) => {
                warn!(
                    list = %list,
                    dispatcher = self.dispatcher.name(),
                    error = %e,
                    "failed to send prefix notice"
                );
                false
            }
        }
    }
}

fn to_chrono(delay: Duration) -> chrono::Duration {
    chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::RecordingDispatcher;
    use chrono::TimeZone;
    use test_case::test_case;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 23, 55, 0).unwrap()
    }

    fn rules() -> PrefixRules {
        PrefixRules {
            blacklist: vec!["0900".to_string(), "44".to_string()],
            whitelist: vec!["4420".to_string(), "33".to_string()],
        }
    }

    fn notifier(dispatcher: &RecordingDispatcher) -> PrefixNotifier {
        PrefixNotifier::new(
            Arc::new(dispatcher.clone()),
            rules(),
            vec!["admin@example.com".to_string()],
        )
    }

    #[test_case("0900123456", Some(PrefixList::Blacklist) ; "blacklisted")]
    #[test_case("4420123456", Some(PrefixList::Blacklist) ; "blacklist wins")]
    #[test_case("33123456", Some(PrefixList::Whitelist) ; "whitelisted")]
    #[test_case("1555123", None ; "no match")]
    fn classify(destination: &str, expected: Option<PrefixList>) {
        assert_eq!(rules().classify(destination), expected);
    }

    #[test]
    fn empty_prefix_matches_nothing() {
        let rules = PrefixRules {
            blacklist: vec![String::new()],
            whitelist: Vec::new(),
        };
        assert!(rules.classify("123").is_none());
        assert!(PrefixRules::default().is_empty());
    }

    #[test]
    fn first_notice_is_always_sent() {
        let dispatcher = RecordingDispatcher::new();
        let notifier = notifier(&dispatcher);
        assert!(notifier.notify(PrefixList::Blacklist, "0900", t0()));
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(dispatcher.sent()[0].1, vec!["admin@example.com".to_string()]);
    }

    #[test]
    fn repeat_within_delay_is_throttled() {
        let dispatcher = RecordingDispatcher::new();
        let notifier = notifier(&dispatcher);
        assert!(notifier.notify(PrefixList::Blacklist, "0900", t0()));
        let soon = t0() + chrono::Duration::minutes(14);
        assert!(!notifier.notify(PrefixList::Blacklist, "0900", soon));
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn repeat_after_delay_is_sent_across_midnight() {
        let dispatcher = RecordingDispatcher::new();
        let notifier = notifier(&dispatcher);
        assert!(notifier.notify(PrefixList::Blacklist, "0900", t0()));
        let later = t0() + chrono::Duration::minutes(15);
        assert!(notifier.notify(PrefixList::Blacklist, "0900", later));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn kinds_are_throttled_separately() {
        let dispatcher = RecordingDispatcher::new();
        let notifier = notifier(&dispatcher);
        assert!(notifier.notify(PrefixList::Blacklist, "0900", t0()));
        assert!(notifier.notify(PrefixList::Whitelist, "33", t0()));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn custom_delay() {
        let dispatcher = RecordingDispatcher::new();
        let notifier = notifier(&dispatcher).with_notice_delay(Duration::from_secs(60));
        assert!(notifier.notify(PrefixList::Whitelist, "33", t0()));
        assert!(notifier.notify(
            PrefixList::Whitelist,
            "33",
            t0() + chrono::Duration::seconds(60)
        ));
    }

    #[test]
    fn failed_dispatch_does_not_start_throttle() {
        let failing = RecordingDispatcher::failing();
        let notifier = PrefixNotifier::new(Arc::new(failing), rules(), Vec::new());
        assert!(!notifier.notify(PrefixList::Blacklist, "0900", t0()));
        assert!(notifier.last_sent.lock().is_empty());
    }

    #[test]
    fn observe_classifies_then_notifies() {
        let dispatcher = RecordingDispatcher::new();
        let notifier = notifier(&dispatcher);
        assert_eq!(
            notifier.observe("0900555", t0()),
            Some((PrefixList::Blacklist, true))
        );
        assert_eq!(
            notifier.observe("0900556", t0()),
            Some((PrefixList::Blacklist, false))
        );
        assert!(notifier.observe("1555", t0()).is_none());
        match &dispatcher.sent()[0].0 {
            Notice::PrefixMatched { destination, .. } => assert_eq!(destination, "0900555"),
            other => panic!("unexpected notice {other:?}"),
        }
    }
}
