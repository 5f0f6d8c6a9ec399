//! OpenWeatherMap response parsing and the bounded model the panel renders.
//!
//! The raw serde structs are deliberately lenient (everything optional, as
//! the API omits fields freely); conversion into the heapless display model
//! truncates to what one panel refresh can show.

use alloc::string::String as AllocString;
use alloc::vec::Vec as AllocVec;

use heapless::{String, Vec};
use serde::Deserialize;

pub const DAILY_FORECAST_DAYS: usize = 8;
pub const HOURLY_TREND_HOURS: usize = 24;
pub const DESCRIPTION_BYTES: usize = 48;

/// Panel icon identifiers mapped from OpenWeatherMap condition codes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WeatherIcon {
    Clear,
    FewClouds,
    #[default]
    ScatteredClouds,
    BrokenClouds,
    Overcast,
    ShowerRain,
    Rain,
    Drizzle,
    Thunderstorm,
    Snow,
    Atmosphere,
    Fog,
}

impl WeatherIcon {
    /// Short text label used where the layout has no room for the icon.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::FewClouds => "Few Clouds",
            Self::ScatteredClouds => "Scattered",
            Self::BrokenClouds => "Cloudy",
            Self::Overcast => "Overcast",
            Self::ShowerRain => "Showers",
            Self::Rain => "Rain",
            Self::Drizzle => "Drizzle",
            Self::Thunderstorm => "Storm",
            Self::Snow => "Snow",
            Self::Atmosphere => "Haze",
            Self::Fog => "Fog",
        }
    }
}

pub fn icon_for_condition(owm_id: u16) -> WeatherIcon {
    match owm_id {
        200..=299 => WeatherIcon::Thunderstorm,
        300..=399 => WeatherIcon::Drizzle,
        500..=504 => WeatherIcon::Rain,
        511 => WeatherIcon::Snow,
        520..=599 => WeatherIcon::ShowerRain,
        600..=699 => WeatherIcon::Snow,
        701..=762 => WeatherIcon::Atmosphere,
        771..=799 => WeatherIcon::Fog,
        800 => WeatherIcon::Clear,
        801 => WeatherIcon::FewClouds,
        802 => WeatherIcon::ScatteredClouds,
        803 => WeatherIcon::BrokenClouds,
        804 => WeatherIcon::Overcast,
        _ => WeatherIcon::ScatteredClouds,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurrentConditions {
    pub temp_c: f32,
    pub feels_like_c: f32,
    pub humidity_pct: u8,
    pub pressure_hpa: u16,
    pub wind_ms: f32,
    pub wind_deg: u16,
    pub icon: WeatherIcon,
    /// Minutes after local midnight.
    pub sunrise_minutes: u16,
    pub sunset_minutes: u16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DailyForecast {
    /// 0 = Sunday.
    pub weekday: u8,
    pub high_c: f32,
    pub low_c: f32,
    pub icon: WeatherIcon,
    /// Probability of precipitation, 0..=100.
    pub pop_pct: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrendPoint {
    pub hour_of_day: u8,
    pub temp_c: f32,
    pub pop_pct: u8,
}

/// One Call response reduced to what the panel shows.
#[derive(Clone, Debug, PartialEq)]
pub struct OneCall {
    pub current: CurrentConditions,
    pub description: String<DESCRIPTION_BYTES>,
    pub daily: Vec<DailyForecast, DAILY_FORECAST_DAYS>,
    pub hourly: Vec<TrendPoint, HOURLY_TREND_HOURS>,
}

/// OpenWeatherMap's 1..=5 air quality index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AirQuality {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl AirQuality {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    Json,
    MissingCurrent,
    MissingAqi,
}

// Raw wire shapes. Field names follow the API.

#[derive(Deserialize)]
struct OneCallRaw {
    timezone_offset: Option<i64>,
    current: Option<CurrentRaw>,
    #[serde(default)]
    hourly: AllocVec<HourlyRaw>,
    #[serde(default)]
    daily: AllocVec<DailyRaw>,
}

#[derive(Deserialize)]
struct CurrentRaw {
    sunrise: Option<i64>,
    sunset: Option<i64>,
    temp: Option<f32>,
    feels_like: Option<f32>,
    pressure: Option<u16>,
    humidity: Option<u8>,
    wind_speed: Option<f32>,
    wind_deg: Option<u16>,
    #[serde(default)]
    weather: AllocVec<ConditionRaw>,
}

#[derive(Deserialize)]
struct ConditionRaw {
    id: Option<u16>,
    description: Option<AllocString>,
}

#[derive(Deserialize)]
struct HourlyRaw {
    dt: Option<i64>,
    temp: Option<f32>,
    pop: Option<f32>,
}

#[derive(Deserialize)]
struct DailyRaw {
    dt: Option<i64>,
    temp: Option<DailyTempRaw>,
    pop: Option<f32>,
    #[serde(default)]
    weather: AllocVec<ConditionRaw>,
}

#[derive(Deserialize)]
struct DailyTempRaw {
    min: Option<f32>,
    max: Option<f32>,
}

#[derive(Deserialize)]
struct AirPollutionRaw {
    #[serde(default)]
    list: AllocVec<AirPollutionEntryRaw>,
}

#[derive(Deserialize)]
struct AirPollutionEntryRaw {
    main: Option<AirPollutionMainRaw>,
}

#[derive(Deserialize)]
struct AirPollutionMainRaw {
    aqi: Option<u8>,
}

pub fn parse_one_call(body: &[u8]) -> Result<OneCall, ParseError> {
    let raw: OneCallRaw = serde_json::from_slice(body).map_err(|_| ParseError::Json)?;
    let tz = raw.timezone_offset.unwrap_or(0);
    let current_raw = raw.current.ok_or(ParseError::MissingCurrent)?;

    let (condition_id, description_raw) = current_raw
        .weather
        .first()
        .map(|w| (w.id.unwrap_or(0), w.description.as_deref().unwrap_or("")))
        .unwrap_or((0, ""));

    let mut description: String<DESCRIPTION_BYTES> = String::new();
    for ch in description_raw.chars() {
        if description.push(ch).is_err() {
            break;
        }
    }

    let current = CurrentConditions {
        temp_c: current_raw.temp.unwrap_or(f32::NAN),
        feels_like_c: current_raw
            .feels_like
            .or(current_raw.temp)
            .unwrap_or(f32::NAN),
        humidity_pct: current_raw.humidity.unwrap_or(0).min(100),
        pressure_hpa: current_raw.pressure.unwrap_or(0),
        wind_ms: current_raw.wind_speed.unwrap_or(0.0),
        wind_deg: current_raw.wind_deg.unwrap_or(0) % 360,
        icon: icon_for_condition(condition_id),
        sunrise_minutes: minutes_of_local_day(current_raw.sunrise, tz),
        sunset_minutes: minutes_of_local_day(current_raw.sunset, tz),
    };

    let mut daily: Vec<DailyForecast, DAILY_FORECAST_DAYS> = Vec::new();
    for day in raw.daily.iter().take(DAILY_FORECAST_DAYS) {
        let id = day
            .weather
            .first()
            .and_then(|w| w.id)
            .unwrap_or(0);
        let temp = day.temp.as_ref();
        let _ = daily.push(DailyForecast {
            weekday: weekday_of(day.dt.unwrap_or(0), tz),
            high_c: temp.and_then(|t| t.max).unwrap_or(f32::NAN),
            low_c: temp.and_then(|t| t.min).unwrap_or(f32::NAN),
            icon: icon_for_condition(id),
            pop_pct: pop_percent(day.pop),
        });
    }

    let mut hourly: Vec<TrendPoint, HOURLY_TREND_HOURS> = Vec::new();
    for hour in raw.hourly.iter().take(HOURLY_TREND_HOURS) {
        let _ = hourly.push(TrendPoint {
            hour_of_day: hour_of_local_day(hour.dt.unwrap_or(0), tz),
            temp_c: hour.temp.unwrap_or(f32::NAN),
            pop_pct: pop_percent(hour.pop),
        });
    }

    Ok(OneCall {
        current,
        description,
        daily,
        hourly,
    })
}

pub fn parse_air_quality(body: &[u8]) -> Result<AirQuality, ParseError> {
    let raw: AirPollutionRaw = serde_json::from_slice(body).map_err(|_| ParseError::Json)?;
    let aqi = raw
        .list
        .first()
        .and_then(|entry| entry.main.as_ref())
        .and_then(|main| main.aqi)
        .ok_or(ParseError::MissingAqi)?;

    Ok(match aqi {
        0 | 1 => AirQuality::Good,
        2 => AirQuality::Fair,
        3 => AirQuality::Moderate,
        4 => AirQuality::Poor,
        _ => AirQuality::VeryPoor,
    })
}

fn pop_percent(pop: Option<f32>) -> u8 {
    (pop.unwrap_or(0.0).clamp(0.0, 1.0) * 100.0) as u8
}

fn minutes_of_local_day(epoch: Option<i64>, tz_offset: i64) -> u16 {
    let local = epoch.unwrap_or(0) + tz_offset;
    (local.rem_euclid(86_400) / 60) as u16
}

fn hour_of_local_day(epoch: i64, tz_offset: i64) -> u8 {
    ((epoch + tz_offset).rem_euclid(86_400) / 3600) as u8
}

/// 0 = Sunday. The unix epoch fell on a Thursday.
fn weekday_of(epoch: i64, tz_offset: i64) -> u8 {
    ((epoch + tz_offset).div_euclid(86_400) + 4).rem_euclid(7) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_CALL_FIXTURE: &[u8] = br#"{
        "timezone_offset": 3600,
        "current": {
            "dt": 1700000000,
            "sunrise": 1699998000, "sunset": 1700031600,
            "temp": 7.4, "feels_like": 4.9,
            "pressure": 1012, "humidity": 81,
            "wind_speed": 5.2, "wind_deg": 230,
            "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds"}]
        },
        "hourly": [
            {"dt": 1700000000, "temp": 7.4, "pop": 0.0},
            {"dt": 1700003600, "temp": 7.9, "pop": 0.35}
        ],
        "daily": [
            {"dt": 1700046000, "temp": {"min": 3.1, "max": 9.8}, "pop": 0.6,
             "weather": [{"id": 500, "description": "light rain"}]}
        ]
    }"#;

    #[test]
    fn parses_one_call_fixture() {
        let one_call = parse_one_call(ONE_CALL_FIXTURE).unwrap();
        assert_eq!(one_call.current.humidity_pct, 81);
        assert_eq!(one_call.current.icon, WeatherIcon::BrokenClouds);
        assert_eq!(one_call.description.as_str(), "broken clouds");
        assert_eq!(one_call.daily.len(), 1);
        assert_eq!(one_call.daily[0].icon, WeatherIcon::Rain);
        assert_eq!(one_call.daily[0].pop_pct, 60);
        assert_eq!(one_call.hourly.len(), 2);
        assert_eq!(one_call.hourly[1].pop_pct, 35);
    }

    #[test]
    fn missing_current_block_is_an_error() {
        assert_eq!(
            parse_one_call(br#"{"daily": []}"#),
            Err(ParseError::MissingCurrent)
        );
    }

    #[test]
    fn malformed_json_is_reported_not_panicked() {
        assert_eq!(parse_one_call(b"{not json"), Err(ParseError::Json));
    }

    #[test]
    fn daily_and_hourly_are_truncated_to_model_bounds() {
        use alloc::format;
        use alloc::string::String;

        let mut body = String::from(
            r#"{"timezone_offset": 0, "current": {"temp": 1.0, "weather": []}, "hourly": ["#,
        );
        for i in 0..48 {
            if i > 0 {
                body.push(',');
            }
            body.push_str(&format!(r#"{{"dt": {}, "temp": 1.0}}"#, i * 3600));
        }
        body.push_str("]}");

        let one_call = parse_one_call(body.as_bytes()).unwrap();
        assert_eq!(one_call.hourly.len(), HOURLY_TREND_HOURS);
    }

    #[test]
    fn air_quality_maps_the_owm_index() {
        let body = br#"{"list": [{"main": {"aqi": 2}, "components": {"pm2_5": 4.1}}]}"#;
        assert_eq!(parse_air_quality(body), Ok(AirQuality::Fair));
        assert_eq!(
            parse_air_quality(br#"{"list": []}"#),
            Err(ParseError::MissingAqi)
        );
    }

    #[test]
    fn condition_code_bands_map_to_icons() {
        assert_eq!(icon_for_condition(212), WeatherIcon::Thunderstorm);
        assert_eq!(icon_for_condition(511), WeatherIcon::Snow);
        assert_eq!(icon_for_condition(521), WeatherIcon::ShowerRain);
        assert_eq!(icon_for_condition(741), WeatherIcon::Atmosphere);
        assert_eq!(icon_for_condition(781), WeatherIcon::Fog);
        assert_eq!(icon_for_condition(800), WeatherIcon::Clear);
        assert_eq!(icon_for_condition(804), WeatherIcon::Overcast);
    }

    #[test]
    fn weekday_accounts_for_timezone_shift() {
        // 1970-01-01 23:30 UTC was a Thursday (4); +1h local tips into Friday.
        let epoch = 23 * 3600 + 1800;
        assert_eq!(weekday_of(epoch, 0), 4);
        assert_eq!(weekday_of(epoch, 3600), 5);
    }
}
