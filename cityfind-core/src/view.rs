//! Text rendering of search results, the current-weather summary and the
//! daily forecast strip.

use chrono::NaiveDate;
use std::fmt;

use crate::{
    chart::daily_in_range,
    date_range::DateRange,
    model::{City, DailyPoint, ForecastSeries, PopularCity, WeatherSnapshot},
};

pub fn search_entries(cities: &[City]) -> Vec<String> {
    cities.iter().map(City::to_string).collect()
}

fn temp(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}°C"))
}

/// Header card for the weather view.
pub fn current_summary(city: &City, current: &WeatherSnapshot) -> Vec<String> {
    let population = city
        .population
        .map_or_else(|| "N/A".to_string(), group_thousands);

    let mut lines = vec![city.to_string()];
    if !city.region.is_empty() {
        lines.push(city.region.clone());
    }
    lines.push(format!("{:.1}°C", current.temperature_c));
    lines.push(format!("Wind: {} km/h", current.wind_speed_kmh));
    lines.push(format!("Time: {}", current.time.format("%H:%M")));
    lines.push(format!(
        "Population: {population} | Lat: {} | Lon: {}",
        city.latitude, city.longitude
    ));
    lines
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// One card of the daily strip.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCard {
    pub date: NaiveDate,
    pub max_c: Option<f64>,
    pub min_c: Option<f64>,
}

impl From<&DailyPoint> for DayCard {
    fn from(d: &DailyPoint) -> Self {
        Self { date: d.date, max_c: d.temperature_max_c, min_c: d.temperature_min_c }
    }
}

impl fmt::Display for DayCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}  ↑ {}  ↓ {}",
            self.date.format("%a"),
            self.date,
            temp(self.max_c),
            temp(self.min_c)
        )
    }
}

pub fn daily_strip(series: &ForecastSeries, range: &DateRange) -> Vec<DayCard> {
    daily_in_range(series, range).iter().map(DayCard::from).collect()
}

/// Horizontal bars scaled to the most populous entry.
pub fn population_bars(cities: &[PopularCity], width: usize) -> Vec<String> {
    let max = cities.iter().map(|c| c.population_millions).fold(0.0_f64, f64::max);
    let name_width = cities.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);

    cities
        .iter()
        .map(|c| {
            let len = if max > 0.0 {
                ((c.population_millions / max) * width as f64).round() as usize
            } else {
                0
            };
            format!(
                "{:<name_width$} {:>5.1}M {}",
                c.name,
                c.population_millions,
                "▇".repeat(len)
            )
        })
        .collect()
}
