//! Pure helpers for the status bar along the bottom of the panel.

use core::fmt::Write as _;

use heapless::String;

pub const WEEKDAY_SHORT: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const BATTERY_EMPTY_VOLTS: f32 = 3.0;
const BATTERY_FULL_VOLTS: f32 = 4.2;

/// Rough charge estimate from voltage, clamped linear over the LiPo range.
pub fn battery_percent(volts: f32) -> u8 {
    let span = BATTERY_FULL_VOLTS - BATTERY_EMPTY_VOLTS;
    let fraction = (volts - BATTERY_EMPTY_VOLTS) / span;
    (fraction.clamp(0.0, 1.0) * 100.0) as u8
}

/// Signal bars for the Wi-Fi indicator, 0..=4.
pub fn rssi_bars(rssi_dbm: i8) -> u8 {
    match rssi_dbm {
        -55..=0 => 4,
        -66..=-56 => 3,
        -77..=-67 => 2,
        -88..=-78 => 1,
        _ => 0,
    }
}

/// "HH:MM" refresh-time stamp.
pub fn format_clock(hour: u8, minute: u8) -> String<8> {
    let mut out = String::new();
    let _ = write!(out, "{:02}:{:02}", hour, minute);
    out
}

/// "HH:MM" from minutes after midnight, for sunrise/sunset.
pub fn format_minutes_of_day(minutes: u16) -> String<8> {
    format_clock((minutes / 60 % 24) as u8, (minutes % 60) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_percent_clamps_to_the_lipo_range() {
        assert_eq!(battery_percent(4.2), 100);
        assert_eq!(battery_percent(4.5), 100);
        assert_eq!(battery_percent(3.0), 0);
        assert_eq!(battery_percent(2.7), 0);
        assert_eq!(battery_percent(3.6), 50);
    }

    #[test]
    fn rssi_bands_cover_the_usable_range() {
        assert_eq!(rssi_bars(-40), 4);
        assert_eq!(rssi_bars(-60), 3);
        assert_eq!(rssi_bars(-70), 2);
        assert_eq!(rssi_bars(-80), 1);
        assert_eq!(rssi_bars(-95), 0);
    }

    #[test]
    fn clock_stamp_is_zero_padded() {
        assert_eq!(format_clock(6, 5).as_str(), "06:05");
        assert_eq!(format_minutes_of_day(14 * 60 + 37).as_str(), "14:37");
    }
}
