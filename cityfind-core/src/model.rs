use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, str::FromStr};

/// Identifier assigned to a city by the geocoding service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(pub u64);

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CityId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(CityId)
    }
}

/// A city record as returned by the geocoding service.
///
/// Field names follow the service's camelCase JSON so the cached form is the
/// same document the service sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub population: Option<u64>,
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.country)
    }
}

/// Current conditions at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub time: NaiveDateTime,
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    pub weather_code: i32,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub time: NaiveDateTime,
    pub temperature_c: Option<f64>,
    pub weather_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub temperature_max_c: Option<f64>,
    pub temperature_min_c: Option<f64>,
    pub weather_code: Option<i32>,
}

/// Hourly and daily samples produced from one weather response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

/// Everything a single weather fetch yields. Replaced wholesale on refetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub current: WeatherSnapshot,
    pub series: ForecastSeries,
}

/// Entry of the most-populous-cities summary.
#[derive(Debug, Clone, PartialEq)]
pub struct PopularCity {
    pub name: String,
    pub population_millions: f64,
}

impl PopularCity {
    pub fn new(name: impl Into<String>, population_millions: f64) -> Self {
        Self { name: name.into(), population_millions }
    }
}
