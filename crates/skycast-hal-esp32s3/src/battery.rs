//! Battery voltage measurement through the board's divider.

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, GPIO4};
use log::debug;

/// The pack divides the cell through 1M + 1M, so the ADC sees half the cell
/// voltage; the extra factor matches the FireBeetle-style reference boards
/// this layout was calibrated on.
const DIVIDER_SCALE: f32 = 3.5 / 2.0;
const ADC_FULL_SCALE_MV: u32 = 3300;
const ADC_MAX_COUNT: u32 = 4095;
const SAMPLE_BURST: u32 = 8;
const ADC_READ_ATTEMPTS: u32 = 1000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatteryError {
    AdcTimeout,
}

pub struct BatteryMonitor<'d> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<GPIO4<'d>, ADC1<'d>>,
}

impl<'d> BatteryMonitor<'d> {
    pub fn new(adc1: ADC1<'d>, gpio: GPIO4<'d>) -> Self {
        let mut adc_config = AdcConfig::new();
        let pin = adc_config.enable_pin(gpio, Attenuation::_11dB);
        let adc = Adc::new(adc1, adc_config);
        Self { adc, pin }
    }

    /// Cell voltage in volts, averaged over a short burst.
    pub fn read_volts(&mut self) -> Result<f32, BatteryError> {
        let mut sum = 0u32;
        for _ in 0..SAMPLE_BURST {
            sum += u32::from(self.read_raw()?);
        }
        let raw = sum / SAMPLE_BURST;
        let measured_mv = raw * ADC_FULL_SCALE_MV / ADC_MAX_COUNT;
        let volts = measured_mv as f32 / 1000.0 * DIVIDER_SCALE;
        debug!("battery adc raw={} measured_mv={} volts={}", raw, measured_mv, volts);
        Ok(volts)
    }

    fn read_raw(&mut self) -> Result<u16, BatteryError> {
        for _ in 0..ADC_READ_ATTEMPTS {
            if let Ok(raw) = self.adc.read_oneshot(&mut self.pin) {
                return Ok(raw);
            }
        }
        Err(BatteryError::AdcTimeout)
    }
}
