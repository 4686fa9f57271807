//! Out-of-order key event suppression
//!
//! Remote-shell and network input injection can deliver a key-down after its
//! paired key-up. Executing that late key-down would leave the key "held" on
//! the device, so it is dropped instead.

use parking_lot::Mutex;

/// Tracks one (down, up) command pair
///
/// The pending list is reset whenever an unrelated command id is observed.
#[derive(Debug)]
pub struct OutOfOrderCommandDetector {
    down: String,
    up: String,
    pending: Mutex<Vec<String>>,
}

impl OutOfOrderCommandDetector {
    pub fn new(down: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            down: down.into(),
            up: up.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn down(&self) -> &str {
        &self.down
    }

    pub fn up(&self) -> &str {
        &self.up
    }

    /// Observe a command id and report whether it must be dropped
    ///
    /// Only a `down` arriving after an unmatched `up` is suppressed.
    pub fn should_ignore(&self, command_id: &str) -> bool {
        let mut pending = self.pending.lock();

        if command_id == self.up {
            match pending.iter().rposition(|id| *id == self.down) {
                Some(index) => {
                    pending.remove(index);
                }
                None => pending.push(self.up.clone()),
            }
            false
        } else if command_id == self.down {
            match pending.iter().rposition(|id| *id == self.up) {
                Some(index) => {
                    pending.remove(index);
                    tracing::debug!(
                        "Suppressing {} that arrived after its {}",
                        self.down,
                        self.up
                    );
                    true
                }
                None => {
                    pending.push(self.down.clone());
                    false
                }
            }
        } else {
            pending.clear();
            false
        }
    }

    /// Number of ids currently waiting for their partner
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// A set of independent detectors, e.g. one per D-pad direction
#[derive(Debug, Default)]
pub struct OutOfOrderFilter {
    detectors: Vec<OutOfOrderCommandDetector>,
}

impl OutOfOrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, down: impl Into<String>, up: impl Into<String>) -> Self {
        self.detectors
            .push(OutOfOrderCommandDetector::new(down, up));
        self
    }

    /// Feed the id to every detector; true if any of them suppresses it
    pub fn should_ignore(&self, command_id: &str) -> bool {
        self.detectors
            .iter()
            .fold(false, |ignore, detector| {
                detector.should_ignore(command_id) || ignore
            })
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn detector() -> OutOfOrderCommandDetector {
        OutOfOrderCommandDetector::new("Down", "Up")
    }

    #[test]
    fn test_up_then_down_suppresses_down() {
        let detector = detector();
        assert!(!detector.should_ignore("Up"));
        assert!(detector.should_ignore("Down"));
        assert_eq!(detector.pending_len(), 0);
    }

    #[test]
    fn test_down_then_up_is_never_suppressed() {
        let detector = detector();
        assert!(!detector.should_ignore("Down"));
        assert!(!detector.should_ignore("Up"));
        assert_eq!(detector.pending_len(), 0);
    }

    #[test]
    fn test_unrelated_id_clears_pending() {
        let detector = detector();
        assert!(!detector.should_ignore("Up"));
        assert!(!detector.should_ignore("Home"));
        assert_eq!(detector.pending_len(), 0);
        assert!(!detector.should_ignore("Down"));
    }

    #[test]
    fn test_only_one_down_suppressed_per_stray_up() {
        let detector = detector();
        assert!(!detector.should_ignore("Up"));
        assert!(detector.should_ignore("Down"));
        assert!(!detector.should_ignore("Down"));
    }

    #[test]
    fn test_filter_pairs_are_independent() {
        let filter = OutOfOrderFilter::new()
            .with_pair("LeftDown", "LeftUp")
            .with_pair("RightDown", "RightUp");
        assert_eq!(filter.len(), 2);

        assert!(!filter.should_ignore("LeftUp"));
        assert!(filter.should_ignore("LeftDown"));

        assert!(!filter.should_ignore("RightDown"));
        assert!(!filter.should_ignore("RightUp"));
    }

    #[test]
    fn test_filter_resets_other_pairs_on_unrelated_id() {
        let filter = OutOfOrderFilter::new()
            .with_pair("LeftDown", "LeftUp")
            .with_pair("RightDown", "RightUp");

        assert!(!filter.should_ignore("LeftUp"));
        // RightDown is unrelated to the Left pair and clears its stray LeftUp
        assert!(!filter.should_ignore("RightDown"));
        assert!(!filter.should_ignore("LeftDown"));
    }

    fn event_strategy() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("Down"), Just("Up"), Just("Select")]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// A down directly after an unrelated id is never suppressed
        #[test]
        fn prop_down_after_unrelated_is_kept(events in prop::collection::vec(event_strategy(), 0..40)) {
            let detector = detector();
            for event in &events {
                detector.should_ignore(event);
            }
            detector.should_ignore("Select");
            prop_assert!(!detector.should_ignore("Down"));
        }

        /// Only downs are ever suppressed, and never more than the ups seen
        #[test]
        fn prop_suppression_bounded_by_ups(events in prop::collection::vec(event_strategy(), 0..60)) {
            let detector = detector();
            let mut suppressed = 0usize;
            let mut ups = 0usize;
            for event in &events {
                if *event == "Up" {
                    ups += 1;
                }
                if detector.should_ignore(event) {
                    prop_assert_eq!(*event, "Down");
                    suppressed += 1;
                }
            }
            prop_assert!(suppressed <= ups);
        }

        /// Well-ordered press/release pairs are never suppressed
        #[test]
        fn prop_ordered_pairs_pass(count in 0usize..30) {
            let detector = detector();
            for _ in 0..count {
                prop_assert!(!detector.should_ignore("Down"));
                prop_assert!(!detector.should_ignore("Up"));
            }
            prop_assert_eq!(detector.pending_len(), 0);
        }
    }
}
