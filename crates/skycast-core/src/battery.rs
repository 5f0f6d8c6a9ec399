//! Battery tiers and the one-shot low-battery warning latch.
//!
//! Evaluated first thing every wake cycle; anything other than
//! [`BatteryAction::Normal`] short-circuits the rest of the cycle.

use crate::config::RefreshConfig;
use crate::state::PersistentState;

/// What the cycle does about the measured battery voltage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatteryAction {
    /// Healthy; carry on with the refresh.
    Normal,
    /// First cycle in a degraded band: show the warning once, then sleep.
    WarnThenSleep { minutes: u16 },
    /// Still degraded, warning already shown; sleep without touching the
    /// panel.
    SleepSilently { minutes: u16 },
    /// Critically low. No wake timer is armed; only a manual reset resumes
    /// operation. `warn` is set when the latch transition happens on this
    /// same cycle, so the warning is rendered before the lights go out.
    Hibernate { warn: bool },
}

/// Classify `volts` against the configured thresholds, updating the warning
/// latch in `state`. The caller persists `state` afterwards.
pub fn assess(
    volts: f32,
    state: &mut PersistentState,
    config: &RefreshConfig,
) -> BatteryAction {
    if volts > config.low_battery_volts {
        // Recovered: re-arm the one-shot warning.
        state.low_battery_latched = false;
        return BatteryAction::Normal;
    }

    let warn = !state.low_battery_latched;
    state.low_battery_latched = true;

    if volts <= config.critical_battery_volts {
        BatteryAction::Hibernate { warn }
    } else if volts <= config.very_low_battery_volts {
        if warn {
            BatteryAction::WarnThenSleep {
                minutes: config.very_low_battery_sleep_minutes,
            }
        } else {
            BatteryAction::SleepSilently {
                minutes: config.very_low_battery_sleep_minutes,
            }
        }
    } else if warn {
        BatteryAction::WarnThenSleep {
            minutes: config.low_battery_sleep_minutes,
        }
    } else {
        BatteryAction::SleepSilently {
            minutes: config.low_battery_sleep_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RefreshConfig {
        RefreshConfig::default()
    }

    #[test]
    fn healthy_voltage_is_normal_and_clears_latch() {
        let mut state = PersistentState {
            low_battery_latched: true,
            consecutive_errors: 0,
        };
        assert_eq!(assess(3.90, &mut state, &config()), BatteryAction::Normal);
        assert!(!state.low_battery_latched);
    }

    #[test]
    fn warning_fires_only_on_first_degraded_cycle() {
        let mut state = PersistentState::default();
        assert_eq!(
            assess(3.25, &mut state, &config()),
            BatteryAction::WarnThenSleep { minutes: 60 }
        );
        assert!(state.low_battery_latched);
        // Same voltage again: same sleep, no second warning.
        assert_eq!(
            assess(3.25, &mut state, &config()),
            BatteryAction::SleepSilently { minutes: 60 }
        );
    }

    #[test]
    fn recovery_sequence_low_low_normal() {
        let mut state = PersistentState::default();
        let first = assess(3.25, &mut state, &config());
        let latched_after_first = state.low_battery_latched;
        let second = assess(3.25, &mut state, &config());
        let latched_after_second = state.low_battery_latched;
        let third = assess(3.60, &mut state, &config());

        assert!(matches!(first, BatteryAction::WarnThenSleep { .. }));
        assert!(matches!(second, BatteryAction::SleepSilently { .. }));
        assert_eq!(third, BatteryAction::Normal);
        assert!(latched_after_first);
        assert!(latched_after_second);
        assert!(!state.low_battery_latched);
    }

    #[test]
    fn very_low_band_uses_longer_interval() {
        let mut state = PersistentState {
            low_battery_latched: true,
            consecutive_errors: 0,
        };
        assert_eq!(
            assess(3.15, &mut state, &config()),
            BatteryAction::SleepSilently { minutes: 120 }
        );
    }

    #[test]
    fn critical_voltage_hibernates_warning_once() {
        let mut state = PersistentState::default();
        assert_eq!(
            assess(3.05, &mut state, &config()),
            BatteryAction::Hibernate { warn: true }
        );
        assert_eq!(
            assess(3.05, &mut state, &config()),
            BatteryAction::Hibernate { warn: false }
        );
    }

    #[test]
    fn threshold_boundaries_are_inclusive_on_the_low_side() {
        let mut state = PersistentState {
            low_battery_latched: true,
            consecutive_errors: 0,
        };
        let cfg = config();
        // Exactly at the low threshold is degraded.
        assert!(matches!(
            assess(cfg.low_battery_volts, &mut state, &cfg),
            BatteryAction::SleepSilently { minutes: 60 }
        ));
        // Exactly at the critical threshold hibernates.
        assert!(matches!(
            assess(cfg.critical_battery_volts, &mut state, &cfg),
            BatteryAction::Hibernate { .. }
        ));
    }
}
