//! Wake scheduling: how long to deep-sleep so the next wake lands on a clean
//! boundary.
//!
//! Outside the quiet window, wake-ups align to the next multiple of the
//! configured interval past the hour. Inside it, the cadence collapses to a
//! single wake at `wake_hour:00:00`. The quiet-window comparison treats the
//! last two minutes of an hour as already belonging to the next one, since
//! cycle execution time eats into the alignment window; the boundary
//! arithmetic itself keeps the unrounded minute and second.

use crate::clock::LocalTime;
use crate::config::RefreshConfig;

/// Minute at which the hour is rounded up for the quiet-window comparison.
const HOUR_ROLLOVER_MINUTE: u8 = 58;
/// Gaps at or below this fold into the next full interval; waking for a few
/// seconds of work and sleeping again is not worth the panel refresh.
const MIN_WAKE_GAP_SECS: u64 = 120;
/// Pad for boards whose RTC runs fast and would otherwise wake just before
/// the boundary.
const RTC_DRIFT_PAD_SECS: u64 = 10;

/// Seconds to deep-sleep from `now` until the next aligned wake.
/// Always strictly positive.
pub fn seconds_until_wake(now: LocalTime, config: &RefreshConfig) -> u64 {
    let mut hour = i32::from(now.hour);
    let mut extra_hours: i64 = 0;

    if now.minute >= HOUR_ROLLOVER_MINUTE {
        hour = (hour + 1) % 24;
        extra_hours += 1;
    }

    let bed = i32::from(config.bed_hour);
    let wake = i32::from(config.wake_hour);

    if bed < wake && hour >= bed && hour < wake {
        // 0              B   v  W  24
        // |--------------zzzzZzz---|
        extra_hours += i64::from(wake - hour);
    } else if bed > wake && hour < wake {
        // 0 v W               B    24
        // |zZz----------------zzzzz|
        extra_hours += i64::from(wake - hour);
    } else if bed > wake && hour >= bed {
        // 0   W               B  v 24
        // |zzz----------------zzzZz|
        extra_hours += i64::from(wake - (hour - 24));
    } else {
        // Window disabled (bed == wake) or we are outside it.
        extra_hours = 0;
    }

    let interval = u64::from(config.sleep_duration_minutes);
    let minute = u64::from(now.minute);
    let second = u64::from(now.second);

    let mut duration = if extra_hours == 0 {
        // Align to the next multiple of the interval past the hour.
        interval * 60 - ((minute % interval) * 60 + second)
    } else {
        // Align to the top of the hour `extra_hours` ahead.
        extra_hours as u64 * 3600 - (minute * 60 + second)
    };

    if duration <= MIN_WAKE_GAP_SECS {
        duration += interval * 60;
    }

    duration + RTC_DRIFT_PAD_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval: u8, bed: u8, wake: u8) -> RefreshConfig {
        RefreshConfig {
            sleep_duration_minutes: interval,
            bed_hour: bed,
            wake_hour: wake,
            ..RefreshConfig::default()
        }
    }

    /// Wall-clock seconds-of-day where the sleep lands, before the drift pad.
    fn landing_seconds(now: LocalTime, cfg: &RefreshConfig) -> u64 {
        let raw = seconds_until_wake(now, cfg) - RTC_DRIFT_PAD_SECS;
        (u64::from(now.seconds_of_day()) + raw) % 86_400
    }

    fn in_quiet_window(hour: u8, bed: u8, wake: u8) -> bool {
        if bed == wake {
            return false;
        }
        if bed < wake {
            hour >= bed && hour < wake
        } else {
            hour >= bed || hour < wake
        }
    }

    #[test]
    fn aligns_to_interval_when_window_disabled() {
        // 14:37:05 with a 30 min interval: 30*60 - (7*60 + 5) = 1375 s.
        let d = seconds_until_wake(LocalTime::new(14, 37, 5), &config(30, 0, 0));
        assert_eq!(d, 1375 + RTC_DRIFT_PAD_SECS);
    }

    #[test]
    fn near_hour_rollover_lands_on_window_end() {
        // 23:59:10 rounds into hour 0, which is inside [0, 6). The wake must
        // land exactly on 06:00:00.
        let now = LocalTime::new(23, 59, 10);
        let cfg = config(30, 0, 6);
        assert_eq!(landing_seconds(now, &cfg), 6 * 3600);
    }

    #[test]
    fn tiny_gap_folds_into_next_interval() {
        // 14:59:10 leaves a 50 s gap to 15:00; that folds into 15:30.
        let now = LocalTime::new(14, 59, 10);
        let cfg = config(30, 0, 0);
        assert_eq!(
            seconds_until_wake(now, &cfg),
            50 + 30 * 60 + RTC_DRIFT_PAD_SECS
        );
        assert_eq!(landing_seconds(now, &cfg), (15 * 60 + 30) * 60);
    }

    #[test]
    fn duration_is_always_positive_and_beyond_min_gap() {
        let cfg = config(15, 22, 7);
        for hour in 0..24u8 {
            for minute in 0..60u8 {
                for second in [0u8, 1, 29, 59] {
                    let d = seconds_until_wake(LocalTime::new(hour, minute, second), &cfg);
                    assert!(
                        d > MIN_WAKE_GAP_SECS,
                        "{hour:02}:{minute:02}:{second:02} -> {d}"
                    );
                }
            }
        }
    }

    #[test]
    fn aligned_wakes_land_on_interval_multiples() {
        for interval in [5u8, 10, 15, 30] {
            let cfg = config(interval, 0, 0);
            for hour in 0..24u8 {
                for minute in 0..60u8 {
                    let landing = landing_seconds(LocalTime::new(hour, minute, 7), &cfg);
                    assert_eq!(
                        landing % (u64::from(interval) * 60),
                        0,
                        "interval={interval} at {hour:02}:{minute:02}:07"
                    );
                }
            }
        }
    }

    /// Every (bed, wake) pair, sampled at a mid-hour time in every hour:
    /// inside the window the wake lands exactly on `wake_hour:00:00`,
    /// outside it the wake lands on an interval multiple.
    #[test]
    fn quiet_window_table_covers_all_hour_pairs() {
        for bed in 0..24u8 {
            for wake in 0..24u8 {
                let cfg = config(30, bed, wake);
                for hour in 0..24u8 {
                    // Minute 20 keeps clear of the rollover band so the
                    // window classification matches the raw hour.
                    let now = LocalTime::new(hour, 20, 0);
                    let landing = landing_seconds(now, &cfg);
                    if in_quiet_window(hour, bed, wake) {
                        assert_eq!(
                            landing,
                            u64::from(wake) * 3600,
                            "bed={bed} wake={wake} hour={hour}"
                        );
                    } else {
                        assert_eq!(
                            landing % 1800,
                            0,
                            "bed={bed} wake={wake} hour={hour}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn rollover_minute_inside_window_still_lands_on_window_end() {
        // 10:58:30 counts as hour 11 for the window test, inside [10, 12).
        let now = LocalTime::new(10, 58, 30);
        let cfg = config(30, 10, 12);
        assert_eq!(landing_seconds(now, &cfg), 12 * 3600);
    }

    #[test]
    fn rollover_out_of_window_falls_back_to_alignment() {
        // 05:58:30 counts as hour 6, just past a [0, 6) window; the gap to
        // 06:00 is 90 s, which folds into 06:30.
        let now = LocalTime::new(5, 58, 30);
        let cfg = config(30, 0, 6);
        assert_eq!(landing_seconds(now, &cfg), 6 * 3600 + 1800);
    }

    #[test]
    fn wrapped_window_before_midnight_counts_hours_into_next_day() {
        // 23:10:00 with bed 22, wake 6: 6 - (23 - 24) = 7 hours out, minus
        // the 10 minutes already elapsed.
        let now = LocalTime::new(23, 10, 0);
        let cfg = config(30, 22, 6);
        assert_eq!(
            seconds_until_wake(now, &cfg),
            7 * 3600 - 600 + RTC_DRIFT_PAD_SECS
        );
        assert_eq!(landing_seconds(now, &cfg), 6 * 3600);
    }
}
