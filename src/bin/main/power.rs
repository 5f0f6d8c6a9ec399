use core::time::Duration;

use esp_hal::peripherals::LPWR;
use esp_hal::rtc_cntl::{Rtc, sleep::TimerWakeupSource};
use log::info;

/// Arm the RTC timer and enter deep sleep. Wi-Fi must already be down.
pub(super) fn sleep_for(lpwr: LPWR<'_>, seconds: u64) -> ! {
    let wakeup = TimerWakeupSource::new(Duration::from_secs(seconds));
    let mut rtc = Rtc::new(lpwr);
    info!("deep-sleep for {}s", seconds);
    rtc.sleep_deep(&[&wakeup]);
}

/// Deep sleep with no wake source armed. Only the reset button brings the
/// device back.
pub(super) fn hibernate(lpwr: LPWR<'_>) -> ! {
    let mut rtc = Rtc::new(lpwr);
    info!("hibernating without a wake timer; manual reset required");
    rtc.sleep_deep(&[]);
}
