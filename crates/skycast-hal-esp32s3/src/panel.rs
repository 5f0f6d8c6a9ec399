//! 7.5" Waveshare panel: full-refresh weather layout and the notice screen.
//!
//! Layout fidelity is intentionally modest; the panel is a status surface,
//! not a dashboard. Everything draws into the `Display7in5` framebuffer and
//! goes out in one full refresh.

use core::fmt::Write as _;

use embedded_graphics::{
    mono_font::{MonoTextStyle, iso_8859_1::{FONT_6X10, FONT_9X15, FONT_10X20}},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Triangle},
    text::{Alignment, Text},
};
use embedded_hal::{delay::DelayNs, digital::{InputPin, OutputPin}, spi::SpiDevice};
use epd_waveshare::{
    color::Color,
    epd7in5_v2::{Display7in5, Epd7in5},
    prelude::WaveshareDisplay,
};
use heapless::String;
use skycast_core::cycle::PanelIcon;

pub use epd_waveshare::epd7in5_v2::Display7in5 as PanelFrame;
use skycast_core::status;
use skycast_core::weather::{AirQuality, OneCall};

pub const PANEL_WIDTH: i32 = 800;
pub const PANEL_HEIGHT: i32 = 480;

const MARGIN: i32 = 12;
const TREND_TOP: i32 = 300;
const TREND_BOTTOM: i32 = 420;
const STATUS_BASELINE: i32 = 470;
const DAILY_COLUMN_WIDTH: i32 = 96;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PanelError {
    Bus,
}

/// Everything one weather refresh draws.
pub struct WeatherView<'a> {
    pub one_call: &'a OneCall,
    pub air: AirQuality,
    pub city: &'a str,
    pub refresh_stamp: &'a str,
    pub rssi_dbm: i8,
    pub battery_volts: f32,
    /// Degraded-but-not-fatal note for the status bar, empty when clean.
    pub status_note: &'a str,
}

pub struct Panel<SPI, BUSY, DC, RST, DELAY> {
    epd: Epd7in5<SPI, BUSY, DC, RST, DELAY>,
    spi: SPI,
    frame: &'static mut Display7in5,
}

impl<SPI, BUSY, DC, RST, DELAY> Panel<SPI, BUSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    pub fn new(
        mut spi: SPI,
        busy: BUSY,
        dc: DC,
        rst: RST,
        frame: &'static mut Display7in5,
        delay: &mut DELAY,
    ) -> Result<Self, PanelError> {
        let epd = Epd7in5::new(&mut spi, busy, dc, rst, delay, None)
            .map_err(|_| PanelError::Bus)?;
        Ok(Self { epd, spi, frame })
    }

    pub fn render_weather(
        &mut self,
        view: &WeatherView<'_>,
        delay: &mut DELAY,
    ) -> Result<(), PanelError> {
        let _ = self.frame.clear(Color::White);

        let heading = MonoTextStyle::new(&FONT_10X20, Color::Black);
        let body = MonoTextStyle::new(&FONT_9X15, Color::Black);
        let small = MonoTextStyle::new(&FONT_6X10, Color::Black);

        // Header: city left, refresh stamp right.
        let _ = Text::new(view.city, Point::new(MARGIN, 28), heading).draw(self.frame);
        let _ = Text::with_alignment(
            view.refresh_stamp,
            Point::new(PANEL_WIDTH - MARGIN, 28),
            body,
            Alignment::Right,
        )
        .draw(self.frame);
        let _ = Line::new(Point::new(MARGIN, 40), Point::new(PANEL_WIDTH - MARGIN, 40))
            .into_styled(PrimitiveStyle::with_stroke(Color::Black, 1))
            .draw(self.frame);

        let current = &view.one_call.current;

        let mut line: String<64> = String::new();
        let _ = write!(line, "{:.1}°C", current.temp_c);
        let _ = Text::new(&line, Point::new(MARGIN, 84), heading).draw(self.frame);

        line.clear();
        let _ = write!(
            line,
            "Feels like {:.1}°C   {}",
            current.feels_like_c,
            view.one_call.description.as_str()
        );
        let _ = Text::new(&line, Point::new(MARGIN, 112), body).draw(self.frame);

        line.clear();
        let _ = write!(
            line,
            "Humidity {}%   Wind {:.1} m/s @ {}°   {} hPa",
            current.humidity_pct, current.wind_ms, current.wind_deg, current.pressure_hpa
        );
        let _ = Text::new(&line, Point::new(MARGIN, 136), body).draw(self.frame);

        line.clear();
        let _ = write!(
            line,
            "Sunrise {}   Sunset {}   Air {}",
            status::format_minutes_of_day(current.sunrise_minutes),
            status::format_minutes_of_day(current.sunset_minutes),
            view.air.label()
        );
        let _ = Text::new(&line, Point::new(MARGIN, 160), body).draw(self.frame);

        // Daily strip.
        for (i, day) in view.one_call.daily.iter().enumerate() {
            let x = MARGIN + i as i32 * DAILY_COLUMN_WIDTH;
            let weekday = status::WEEKDAY_SHORT[usize::from(day.weekday) % 7];
            let _ = Text::new(weekday, Point::new(x, 200), body).draw(self.frame);
            let _ = Text::new(day.icon.label(), Point::new(x, 220), small).draw(self.frame);

            line.clear();
            let _ = write!(line, "{:.0}/{:.0}", day.high_c, day.low_c);
            let _ = Text::new(&line, Point::new(x, 240), body).draw(self.frame);

            line.clear();
            let _ = write!(line, "{}%", day.pop_pct);
            let _ = Text::new(&line, Point::new(x, 258), small).draw(self.frame);
        }

        self.draw_trend(view);
        self.draw_status_bar(view);

        self.flush(delay)
    }

    /// Error/warning screen: warning glyph, title, detail.
    pub fn render_notice(
        &mut self,
        icon: PanelIcon,
        title: &str,
        detail: &str,
        delay: &mut DELAY,
    ) -> Result<(), PanelError> {
        let _ = self.frame.clear(Color::White);

        let center_x = PANEL_WIDTH / 2;
        let glyph_baseline = 200;

        let _ = Triangle::new(
            Point::new(center_x, glyph_baseline - 90),
            Point::new(center_x - 80, glyph_baseline),
            Point::new(center_x + 80, glyph_baseline),
        )
        .into_styled(PrimitiveStyle::with_stroke(Color::Black, 4))
        .draw(self.frame);
        let exclaim = MonoTextStyle::new(&FONT_10X20, Color::Black);
        let _ = Text::with_alignment(
            "!",
            Point::new(center_x, glyph_baseline - 20),
            exclaim,
            Alignment::Center,
        )
        .draw(self.frame);

        let label = MonoTextStyle::new(&FONT_6X10, Color::Black);
        let _ = Text::with_alignment(
            icon_caption(icon),
            Point::new(center_x, glyph_baseline + 24),
            label,
            Alignment::Center,
        )
        .draw(self.frame);

        let heading = MonoTextStyle::new(&FONT_10X20, Color::Black);
        let _ = Text::with_alignment(
            title,
            Point::new(center_x, glyph_baseline + 70),
            heading,
            Alignment::Center,
        )
        .draw(self.frame);
        if !detail.is_empty() {
            let body = MonoTextStyle::new(&FONT_9X15, Color::Black);
            let _ = Text::with_alignment(
                detail,
                Point::new(center_x, glyph_baseline + 100),
                body,
                Alignment::Center,
            )
            .draw(self.frame);
        }

        self.flush(delay)
    }

    /// Put the panel controller into deep sleep; the image persists.
    pub fn power_off(&mut self, delay: &mut DELAY) -> Result<(), PanelError> {
        self.epd
            .sleep(&mut self.spi, delay)
            .map_err(|_| PanelError::Bus)
    }

    fn flush(&mut self, delay: &mut DELAY) -> Result<(), PanelError> {
        self.epd
            .update_frame(&mut self.spi, self.frame.buffer(), delay)
            .map_err(|_| PanelError::Bus)?;
        self.epd
            .display_frame(&mut self.spi, delay)
            .map_err(|_| PanelError::Bus)
    }

    /// Hourly temperature polyline over the trend band.
    fn draw_trend(&mut self, view: &WeatherView<'_>) {
        let hourly = &view.one_call.hourly;
        if hourly.len() < 2 {
            return;
        }

        let mut min_temp = f32::INFINITY;
        let mut max_temp = f32::NEG_INFINITY;
        for point in hourly.iter() {
            if point.temp_c.is_nan() {
                return;
            }
            min_temp = min_temp.min(point.temp_c);
            max_temp = max_temp.max(point.temp_c);
        }
        // Flat forecasts still get a visible line mid-band.
        let span = (max_temp - min_temp).max(1.0);

        let plot_left = MARGIN + 36;
        let plot_right = PANEL_WIDTH - MARGIN;
        let step = (plot_right - plot_left) / (hourly.len() as i32 - 1);

        let y_of = |temp: f32| {
            let fraction = (temp - min_temp) / span;
            TREND_BOTTOM - (fraction * (TREND_BOTTOM - TREND_TOP) as f32) as i32
        };

        let axis = PrimitiveStyle::with_stroke(Color::Black, 1);
        let _ = Line::new(
            Point::new(plot_left, TREND_BOTTOM),
            Point::new(plot_right, TREND_BOTTOM),
        )
        .into_styled(axis)
        .draw(self.frame);

        let small = MonoTextStyle::new(&FONT_6X10, Color::Black);
        let mut label: String<8> = String::new();
        let _ = write!(label, "{:.0}", max_temp);
        let _ = Text::new(&label, Point::new(MARGIN, TREND_TOP + 8), small).draw(self.frame);
        label.clear();
        let _ = write!(label, "{:.0}", min_temp);
        let _ = Text::new(&label, Point::new(MARGIN, TREND_BOTTOM), small).draw(self.frame);

        let stroke = PrimitiveStyle::with_stroke(Color::Black, 2);
        for (i, pair) in hourly.windows(2).enumerate() {
            let x0 = plot_left + i as i32 * step;
            let x1 = plot_left + (i as i32 + 1) * step;
            let _ = Line::new(
                Point::new(x0, y_of(pair[0].temp_c)),
                Point::new(x1, y_of(pair[1].temp_c)),
            )
            .into_styled(stroke)
            .draw(self.frame);
        }

        // Hour ticks every fourth point.
        for (i, point) in hourly.iter().enumerate().step_by(4) {
            let x = plot_left + i as i32 * step;
            label.clear();
            let _ = write!(label, "{:02}", point.hour_of_day);
            let _ = Text::new(&label, Point::new(x, TREND_BOTTOM + 14), small).draw(self.frame);
        }
    }

    fn draw_status_bar(&mut self, view: &WeatherView<'_>) {
        let small = MonoTextStyle::new(&FONT_6X10, Color::Black);

        let _ = Line::new(
            Point::new(MARGIN, STATUS_BASELINE - 14),
            Point::new(PANEL_WIDTH - MARGIN, STATUS_BASELINE - 14),
        )
        .into_styled(PrimitiveStyle::with_stroke(Color::Black, 1))
        .draw(self.frame);

        if !view.status_note.is_empty() {
            let _ = Text::new(view.status_note, Point::new(MARGIN, STATUS_BASELINE), small)
                .draw(self.frame);
        }

        let mut right: String<64> = String::new();
        let _ = write!(
            right,
            "Refreshed {}   WiFi {}/4   Batt {}%",
            view.refresh_stamp,
            status::rssi_bars(view.rssi_dbm),
            status::battery_percent(view.battery_volts)
        );
        let _ = Text::with_alignment(
            &right,
            Point::new(PANEL_WIDTH - MARGIN, STATUS_BASELINE),
            small,
            Alignment::Right,
        )
        .draw(self.frame);
    }
}

const fn icon_caption(icon: PanelIcon) -> &'static str {
    match icon {
        PanelIcon::WifiOff => "NETWORK",
        PanelIcon::TimeUnavailable => "TIME SYNC",
        PanelIcon::CloudDown => "WEATHER API",
        PanelIcon::BatteryAlert => "BATTERY",
    }
}

/// A battery warning is a notice, not a cycle error; give it its own entry
/// point so callers don't invent titles.
pub fn low_battery_notice() -> (PanelIcon, &'static str, &'static str) {
    (PanelIcon::BatteryAlert, "Low Battery", "")
}
