//! Transient-failure bookkeeping across wake cycles.
//!
//! Failed cycles retry on a shortened interval a bounded number of times,
//! then fall back to the normal cadence so a sustained outage cannot drain
//! the battery with rapid wake-ups. Hibernation is never decided here; that
//! belongs to the battery guard alone.

use crate::config::RefreshConfig;
use crate::state::PersistentState;

/// How a failing cycle goes back to sleep.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryPlan {
    /// Retries remain: sleep this many minutes, error screen suppressed.
    RetrySoon { minutes: u16 },
    /// Bound exhausted: render the error and follow the normal schedule.
    FollowSchedule,
}

impl RetryPlan {
    /// The error screen is drawn only once shortened retries are used up.
    pub const fn renders_error_screen(self) -> bool {
        matches!(self, Self::FollowSchedule)
    }
}

/// Account for a cycle that could not complete a full render. Increments the
/// persisted counter while retries remain; the caller persists `state`.
pub fn record_failure(state: &mut PersistentState, config: &RefreshConfig) -> RetryPlan {
    if state.consecutive_errors >= u32::from(config.max_error_retries) {
        return RetryPlan::FollowSchedule;
    }

    state.consecutive_errors = state.consecutive_errors.saturating_add(1);
    let minutes = (config.sleep_duration_minutes / config.error_sleep_divisor).max(1);
    RetryPlan::RetrySoon {
        minutes: u16::from(minutes),
    }
}

/// A cycle reached a full successful render; the counter resets to zero in
/// one step and the caller persists it right away. Returns whether the
/// counter was nonzero, i.e. this success ended an outage.
pub fn record_success(state: &mut PersistentState) -> bool {
    let had_errors = state.consecutive_errors != 0;
    state.consecutive_errors = 0;
    had_errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_retries: u8, divisor: u8) -> RefreshConfig {
        RefreshConfig {
            max_error_retries: max_retries,
            error_sleep_divisor: divisor,
            ..RefreshConfig::default()
        }
    }

    #[test]
    fn counter_saturates_at_the_retry_bound() {
        let cfg = config(3, 3);
        let mut state = PersistentState::default();
        let mut counts = [0u32; 5];
        let mut shortened = [false; 5];

        for i in 0..5 {
            let plan = record_failure(&mut state, &cfg);
            counts[i] = state.consecutive_errors;
            shortened[i] = matches!(plan, RetryPlan::RetrySoon { .. });
        }

        assert_eq!(counts, [1, 2, 3, 3, 3]);
        assert_eq!(shortened, [true, true, true, false, false]);
    }

    #[test]
    fn shortened_interval_divides_the_normal_one() {
        let cfg = config(3, 3);
        let mut state = PersistentState::default();
        assert_eq!(
            record_failure(&mut state, &cfg),
            RetryPlan::RetrySoon { minutes: 10 }
        );
    }

    #[test]
    fn shortened_interval_never_reaches_zero() {
        let cfg = RefreshConfig {
            sleep_duration_minutes: 5,
            error_sleep_divisor: 10,
            ..RefreshConfig::default()
        };
        let mut state = PersistentState::default();
        assert_eq!(
            record_failure(&mut state, &cfg),
            RetryPlan::RetrySoon { minutes: 1 }
        );
    }

    #[test]
    fn success_resets_counter_in_one_step() {
        let mut state = PersistentState {
            low_battery_latched: false,
            consecutive_errors: 3,
        };
        assert!(record_success(&mut state));
        assert_eq!(state.consecutive_errors, 0);
        // Already clean: nothing to persist.
        assert!(!record_success(&mut state));
    }

    #[test]
    fn error_screen_only_after_bound_exhausted() {
        let cfg = config(2, 3);
        let mut state = PersistentState::default();
        assert!(!record_failure(&mut state, &cfg).renders_error_screen());
        assert!(!record_failure(&mut state, &cfg).renders_error_screen());
        assert!(record_failure(&mut state, &cfg).renders_error_screen());
    }
}
