//! Wall-clock abstraction.

/// Local wall-clock time of day.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LocalTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl LocalTime {
    pub const fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    /// Seconds since local midnight.
    pub const fn seconds_of_day(self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }

    /// Time of day for an epoch-seconds value already shifted into local time.
    pub const fn from_epoch_seconds(local_epoch_secs: i64) -> Self {
        let of_day = local_epoch_secs.rem_euclid(86_400) as u32;
        Self {
            hour: (of_day / 3600) as u8,
            minute: (of_day / 60 % 60) as u8,
            second: (of_day % 60) as u8,
        }
    }
}

/// Wall-clock source. The board implementation is only usable after SNTP has
/// latched an epoch; reads before that fail and the cycle proceeds on stale
/// time rather than aborting.
pub trait Clock {
    type Error;

    fn now(&mut self) -> Result<LocalTime, Self::Error>;
}

/// No-hardware clock pinned to one instant, for tests and bring-up.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub LocalTime);

impl Clock for FixedClock {
    type Error = core::convert::Infallible;

    fn now(&mut self) -> Result<LocalTime, Self::Error> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_conversion_wraps_midnight() {
        // 1970-01-02 00:00:30 local.
        let t = LocalTime::from_epoch_seconds(86_400 + 30);
        assert_eq!(t, LocalTime::new(0, 0, 30));
    }

    #[test]
    fn epoch_conversion_handles_negative_offsets() {
        // 30 s before epoch midnight is 23:59:30 the previous day.
        let t = LocalTime::from_epoch_seconds(-30);
        assert_eq!(t, LocalTime::new(23, 59, 30));
    }

    #[test]
    fn seconds_of_day_matches_components() {
        assert_eq!(LocalTime::new(14, 37, 5).seconds_of_day(), 52_625);
    }

    #[test]
    fn fixed_clock_serves_the_pinned_time() {
        let mut clock = FixedClock(LocalTime::new(6, 30, 0));
        assert_eq!(clock.now(), Ok(LocalTime::new(6, 30, 0)));
    }
}
