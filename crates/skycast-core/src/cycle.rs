//! Cycle-level failure policy: the error taxonomy and how a cycle, failed or
//! not, decides its sleep duration.

use core::fmt::Write as _;

use heapless::String;

use crate::clock::LocalTime;
use crate::config::RefreshConfig;
use crate::recovery::{self, RetryPlan};
use crate::schedule;
use crate::state::PersistentState;

/// Icons the panel knows how to draw on the error/warning screen.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PanelIcon {
    WifiOff,
    TimeUnavailable,
    CloudDown,
    BatteryAlert,
}

/// Everything that can end a cycle before a full render. None of these are
/// fatal: each resolves to a sleep-and-retry decision, never a crash loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CycleError {
    SsidNotFound,
    WifiConnect,
    TimeSync,
    OneCallApi { status: u16 },
    AirPollutionApi { status: u16 },
}

impl CycleError {
    pub const fn icon(self) -> PanelIcon {
        match self {
            Self::SsidNotFound | Self::WifiConnect => PanelIcon::WifiOff,
            Self::TimeSync => PanelIcon::TimeUnavailable,
            Self::OneCallApi { .. } | Self::AirPollutionApi { .. } => PanelIcon::CloudDown,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::SsidNotFound => "SSID Not Available",
            Self::WifiConnect => "WiFi Connection",
            Self::TimeSync => "Failed To Fetch",
            Self::OneCallApi { .. } => "One Call API",
            Self::AirPollutionApi { .. } => "Air Pollution API",
        }
    }

    /// Second line of the error screen; empty for errors whose title says it
    /// all.
    pub fn detail(self) -> String<48> {
        let mut out = String::new();
        match self {
            Self::SsidNotFound => {}
            Self::WifiConnect => {
                let _ = out.push_str("Failed");
            }
            Self::TimeSync => {
                let _ = out.push_str("The Time");
            }
            Self::OneCallApi { status } | Self::AirPollutionApi { status } => {
                let _ = write!(out, "{}: {}", status, http_phrase(status));
            }
        }
        out
    }
}

fn http_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

/// Sleep decision for a cycle that failed: the shortened retry interval while
/// retries remain, the normal schedule once they are exhausted.
pub fn failure_sleep_seconds(
    plan: RetryPlan,
    now: LocalTime,
    config: &RefreshConfig,
) -> u64 {
    match plan {
        RetryPlan::RetrySoon { minutes } => u64::from(minutes) * 60,
        RetryPlan::FollowSchedule => schedule::seconds_until_wake(now, config),
    }
}

/// Account for the failure and decide the sleep in one step.
pub fn plan_after_failure(
    state: &mut PersistentState,
    now: LocalTime,
    config: &RefreshConfig,
) -> (RetryPlan, u64) {
    let plan = recovery::record_failure(state, config);
    let seconds = failure_sleep_seconds(plan, now, config);
    (plan, seconds)
}

/// Reset the error counter after a full render and schedule the next wake.
/// The bool reports whether this success ended a run of failures.
pub fn plan_after_success(
    state: &mut PersistentState,
    now: LocalTime,
    config: &RefreshConfig,
) -> (bool, u64) {
    let changed = recovery::record_success(state);
    (changed, schedule::seconds_until_wake(now, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_storm_switches_to_schedule_exactly_at_the_bound() {
        let cfg = RefreshConfig::default();
        let mut state = PersistentState::default();
        let now = LocalTime::new(14, 37, 5);
        let aligned = schedule::seconds_until_wake(now, &cfg);

        // Three shortened retries, then the normal schedule.
        for _ in 0..3 {
            let (plan, seconds) = plan_after_failure(&mut state, now, &cfg);
            assert_eq!(plan, RetryPlan::RetrySoon { minutes: 10 });
            assert_eq!(seconds, 600);
        }
        let (plan, seconds) = plan_after_failure(&mut state, now, &cfg);
        assert_eq!(plan, RetryPlan::FollowSchedule);
        assert_eq!(seconds, aligned);
        assert_eq!(state.consecutive_errors, 3);
    }

    #[test]
    fn success_after_failures_resets_and_realigns() {
        let cfg = RefreshConfig::default();
        let mut state = PersistentState {
            low_battery_latched: false,
            consecutive_errors: 2,
        };
        let now = LocalTime::new(9, 5, 0);
        let (changed, seconds) = plan_after_success(&mut state, now, &cfg);
        assert!(changed);
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(seconds, schedule::seconds_until_wake(now, &cfg));
    }

    #[test]
    fn api_errors_carry_the_status_line() {
        let err = CycleError::OneCallApi { status: 401 };
        assert_eq!(err.title(), "One Call API");
        assert_eq!(err.detail().as_str(), "401: Unauthorized");
        assert_eq!(err.icon(), PanelIcon::CloudDown);
    }

    #[test]
    fn wifi_errors_map_to_the_wifi_icon() {
        assert_eq!(CycleError::SsidNotFound.icon(), PanelIcon::WifiOff);
        assert_eq!(CycleError::WifiConnect.detail().as_str(), "Failed");
        assert_eq!(CycleError::TimeSync.detail().as_str(), "The Time");
    }
}
