//! Convergence policy

use std::time::Duration;

use device_manager::config::serde_millis_opt;
use serde::{Deserialize, Serialize};

/// Bounds for one convergence poll
///
/// A poll stops issuing change commands once either bound is reached. With
/// neither bound set it polls until the state converges or it is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergencePolicy {
    /// Maximum number of change commands
    pub max_attempts: Option<u32>,

    /// Wall-clock cap measured from the first query
    #[serde(
        rename = "max_duration_ms",
        with = "serde_millis_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_duration: Option<Duration>,
}

impl ConvergencePolicy {
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            max_duration: None,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            max_duration: None,
        }
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Whether another change attempt is disallowed
    pub fn is_exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.max_duration.is_some_and(|max| elapsed >= max)
    }

    /// Power state of a device
    pub fn power() -> Self {
        Self::bounded(20)
    }

    /// AVR input selection; required for audio and video, so only time bounds it
    pub fn input() -> Self {
        Self::unbounded().with_max_duration(Duration::from_secs(60))
    }

    /// Level and mode settings
    pub fn settings() -> Self {
        Self::bounded(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConvergencePolicy::bounded(3), 2, 0, false)]
    #[case(ConvergencePolicy::bounded(3), 3, 0, true)]
    #[case(ConvergencePolicy::bounded(0), 0, 0, true)]
    #[case(ConvergencePolicy::unbounded(), 10_000, 3_600, false)]
    #[case(ConvergencePolicy::input(), 500, 59, false)]
    #[case(ConvergencePolicy::input(), 1, 60, true)]
    fn test_exhaustion(
        #[case] policy: ConvergencePolicy,
        #[case] attempts: u32,
        #[case] elapsed_secs: u64,
        #[case] exhausted: bool,
    ) {
        assert_eq!(
            policy.is_exhausted(attempts, Duration::from_secs(elapsed_secs)),
            exhausted
        );
    }

    #[test]
    fn test_policy_json() {
        let policy: ConvergencePolicy =
            serde_json::from_str(r#"{ "max_attempts": null, "max_duration_ms": 10000 }"#).unwrap();
        assert_eq!(
            policy,
            ConvergencePolicy::unbounded().with_max_duration(Duration::from_secs(10))
        );

        let json = serde_json::to_string(&ConvergencePolicy::bounded(5)).unwrap();
        assert_eq!(json, r#"{"max_attempts":5}"#);
    }
}
