//! Wall clock latched from SNTP against the monotonic timer.

use esp_hal::time::Instant;
use skycast_core::clock::{Clock, LocalTime};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClockError {
    NotSynced,
}

#[derive(Clone, Copy, Debug)]
struct SyncPoint {
    epoch_seconds: i64,
    at: Instant,
}

/// Serves local time of day once an SNTP result has been latched. Reads
/// before the first sync fail with [`ClockError::NotSynced`]; the cycle then
/// schedules from stale time instead of aborting.
#[derive(Clone, Copy, Debug)]
pub struct SyncedClock {
    utc_offset_seconds: i32,
    sync: Option<SyncPoint>,
}

impl SyncedClock {
    pub const fn new(utc_offset_seconds: i32) -> Self {
        Self {
            utc_offset_seconds,
            sync: None,
        }
    }

    /// Latch a fresh unix-epoch reading against the monotonic timer.
    pub fn set_epoch(&mut self, epoch_seconds: i64) {
        self.sync = Some(SyncPoint {
            epoch_seconds,
            at: Instant::now(),
        });
    }

    pub const fn is_synced(&self) -> bool {
        self.sync.is_some()
    }
}

impl Clock for SyncedClock {
    type Error = ClockError;

    fn now(&mut self) -> Result<LocalTime, Self::Error> {
        let sync = self.sync.ok_or(ClockError::NotSynced)?;
        let elapsed = sync.at.elapsed().as_secs() as i64;
        let local = sync.epoch_seconds + i64::from(self.utc_offset_seconds) + elapsed;
        Ok(LocalTime::from_epoch_seconds(local))
    }
}
