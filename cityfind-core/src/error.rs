//! Error kinds surfaced by the search and weather pipeline.
//!
//! Every error is caught at the boundary that displays it; `user_message`
//! gives the text shown inline.

use thiserror::Error;

use crate::model::CityId;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Type at least {min} letters to search.")]
    QueryTooShort { min: usize },

    #[error("Error {status}: {text}")]
    Http { status: u16, text: String },

    #[error("No cities found with that name")]
    NotFound,

    #[error("Failed to fetch city {id}: HTTP {status}")]
    CityUnavailable { id: CityId, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse geocoding response: {0}")]
    Parse(String),
}

impl GeoError {
    pub fn user_message(&self) -> String {
        match self {
            Self::CityUnavailable { .. } => "Failed to fetch city data".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Parse(_) => "Unexpected response from the city service".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Failed to fetch weather data (HTTP {status})")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse weather response: {0}")]
    Parse(String),

    #[error("{series} series is misaligned: {field} has {actual} entries, expected {expected}")]
    MismatchedSeries {
        series: &'static str,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl ForecastError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            _ => "Failed to fetch weather data".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failure of a full city + forecast load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    City(#[from] GeoError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Load task ended without a result")]
    Aborted,
}

impl LoadError {
    pub fn user_message(&self) -> String {
        match self {
            Self::City(e) => e.user_message(),
            Self::Forecast(e) => e.user_message(),
            Self::Cache(_) => "Local cache error".to_string(),
            Self::Aborted => "Failed to load weather view".to_string(),
        }
    }
}
