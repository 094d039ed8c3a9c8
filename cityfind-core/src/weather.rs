//! Forecast retrieval from an Open-Meteo compatible endpoint.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};
use tracing::{debug, warn};

use crate::{
    config::Config,
    date_range::DateRange,
    error::ForecastError,
    model::{DailyPoint, Forecast, ForecastSeries, HourlyPoint, WeatherSnapshot},
};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const HOURLY_VARS: &str = "temperature_2m,weathercode";
const DAILY_VARS: &str = "weathercode,temperature_2m_max,temperature_2m_min";
const CURRENT_VARS: &str = "relative_humidity_2m";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        range: DateRange,
    ) -> Result<Forecast, ForecastError>;
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self { http, base_url: base_url.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.weather.base_url.as_str())
    }
}

#[async_trait]
impl ForecastSource for WeatherClient {
    async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        range: DateRange,
    ) -> Result<Forecast, ForecastError> {
        debug!(latitude, longitude, %range, "Fetching forecast");

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("current", CURRENT_VARS.to_string()),
                ("hourly", HOURLY_VARS.to_string()),
                ("daily", DAILY_VARS.to_string()),
                ("start_date", range.start().to_string()),
                ("end_date", range.end().to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            warn!(%status, "Forecast request failed");
            return Err(ForecastError::Http { status: status.as_u16() });
        }

        let body = res.text().await?;
        let parsed: OmResponse =
            serde_json::from_str(&body).map_err(|e| ForecastError::Parse(e.to_string()))?;

        Forecast::try_from(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature: f64,
    windspeed: f64,
    weathercode: i32,
    time: String,
}

/// Extra current variables; older endpoints omit the block.
#[derive(Debug, Default, Deserialize)]
struct OmCurrentExtra {
    relative_humidity_2m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    weathercode: Vec<Option<i32>>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<NaiveDate>,
    #[serde(default)]
    weathercode: Vec<Option<i32>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current_weather: OmCurrent,
    #[serde(default)]
    current: OmCurrentExtra,
    hourly: OmHourly,
    daily: OmDaily,
}

fn parse_time(raw: &str) -> Result<NaiveDateTime, ForecastError> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| ForecastError::Parse(format!("invalid timestamp '{raw}': {e}")))
}

fn check_len(
    series: &'static str,
    field: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), ForecastError> {
    if expected != actual {
        return Err(ForecastError::MismatchedSeries { series, field, expected, actual });
    }
    Ok(())
}

impl TryFrom<OmResponse> for Forecast {
    type Error = ForecastError;

    fn try_from(raw: OmResponse) -> Result<Self, Self::Error> {
        let current = WeatherSnapshot {
            time: parse_time(&raw.current_weather.time)?,
            temperature_c: raw.current_weather.temperature,
            wind_speed_kmh: raw.current_weather.windspeed,
            weather_code: raw.current_weather.weathercode,
            humidity_pct: raw.current.relative_humidity_2m,
        };

        let h = raw.hourly;
        check_len("hourly", "temperature_2m", h.time.len(), h.temperature_2m.len())?;
        check_len("hourly", "weathercode", h.time.len(), h.weathercode.len())?;

        let hourly = h
            .time
            .iter()
            .zip(h.temperature_2m)
            .zip(h.weathercode)
            .map(|((time, temperature_c), weather_code)| {
                Ok(HourlyPoint { time: parse_time(time)?, temperature_c, weather_code })
            })
            .collect::<Result<Vec<_>, ForecastError>>()?;

        let d = raw.daily;
        check_len("daily", "weathercode", d.time.len(), d.weathercode.len())?;
        check_len("daily", "temperature_2m_max", d.time.len(), d.temperature_2m_max.len())?;
        check_len("daily", "temperature_2m_min", d.time.len(), d.temperature_2m_min.len())?;

        let daily = d
            .time
            .into_iter()
            .zip(d.weathercode)
            .zip(d.temperature_2m_max.into_iter().zip(d.temperature_2m_min))
            .map(|((date, weather_code), (temperature_max_c, temperature_min_c))| DailyPoint {
                date,
                temperature_max_c,
                temperature_min_c,
                weather_code,
            })
            .collect();

        Ok(Forecast { current, series: ForecastSeries { hourly, daily } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: serde_json::Value) -> Result<Forecast, ForecastError> {
        let raw: OmResponse = serde_json::from_value(body).expect("test body matches wire shape");
        Forecast::try_from(raw)
    }

    fn current() -> serde_json::Value {
        json!({ "temperature": 11.2, "windspeed": 14.8, "weathercode": 3, "time": "2024-01-01T12:00" })
    }

    #[test]
    fn parallel_arrays_become_points() {
        let forecast = response(json!({
            "current_weather": current(),
            "hourly": {
                "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
                "temperature_2m": [5.0, null],
                "weathercode": [1, 2]
            },
            "daily": {
                "time": ["2024-01-01"],
                "weathercode": [61],
                "temperature_2m_max": [9.5],
                "temperature_2m_min": [2.1]
            }
        }))
        .expect("aligned series parse");

        assert_eq!(forecast.current.weather_code, 3);
        assert_eq!(forecast.current.time.to_string(), "2024-01-01 12:00:00");
        assert_eq!(forecast.current.humidity_pct, None);

        let hourly = &forecast.series.hourly;
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].temperature_c, Some(5.0));
        assert_eq!(hourly[1].temperature_c, None);
        assert_eq!(hourly[1].weather_code, Some(2));

        let day = &forecast.series.daily[0];
        assert_eq!(day.temperature_max_c, Some(9.5));
        assert_eq!(day.temperature_min_c, Some(2.1));
        assert_eq!(day.weather_code, Some(61));
    }

    #[test]
    fn misaligned_hourly_series_is_rejected() {
        let err = response(json!({
            "current_weather": current(),
            "hourly": {
                "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
                "temperature_2m": [5.0],
                "weathercode": [1, 2]
            },
            "daily": { "time": [], "weathercode": [], "temperature_2m_max": [], "temperature_2m_min": [] }
        }))
        .unwrap_err();

        assert!(matches!(
            err,
            ForecastError::MismatchedSeries { series: "hourly", field: "temperature_2m", expected: 2, actual: 1 }
        ));
    }

    #[test]
    fn misaligned_daily_series_is_rejected() {
        let err = response(json!({
            "current_weather": current(),
            "hourly": { "time": [], "temperature_2m": [], "weathercode": [] },
            "daily": {
                "time": ["2024-01-01", "2024-01-02"],
                "weathercode": [1, 2],
                "temperature_2m_max": [1.0, 2.0],
                "temperature_2m_min": [0.0]
            }
        }))
        .unwrap_err();

        assert!(err.to_string().contains("temperature_2m_min"));
    }

    #[test]
    fn bad_timestamp_is_a_parse_error() {
        let err = response(json!({
            "current_weather": { "temperature": 1.0, "windspeed": 1.0, "weathercode": 0, "time": "yesterday" },
            "hourly": { "time": [], "temperature_2m": [], "weathercode": [] },
            "daily": { "time": [], "weathercode": [], "temperature_2m_max": [], "temperature_2m_min": [] }
        }))
        .unwrap_err();

        assert!(matches!(err, ForecastError::Parse(_)));
    }
}
