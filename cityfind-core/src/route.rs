use std::fmt;

use crate::model::{City, CityId};

const WEATHER_CHARTS: &str = "weather-charts";

/// Navigation targets between the search view and the weather view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    WeatherCharts(CityId),
}

impl Route {
    pub fn for_city(city: &City) -> Self {
        Route::WeatherCharts(city.id)
    }

    /// Parse a path such as `/weather-charts/42`. Unknown paths yield `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Some(Route::Home),
            [WEATHER_CHARTS, id] => id.parse().ok().map(Route::WeatherCharts),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => f.write_str("/"),
            Route::WeatherCharts(id) => write!(f, "/{WEATHER_CHARTS}/{id}"),
        }
    }
}
