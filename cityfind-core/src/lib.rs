//! Core library for the `cityfind` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Geocoding and forecast clients
//! - Debounced search, city cache and date-range state
//! - Chart data, view formatting and load orchestration
//!
//! It is used by `cityfind-cli`, but has no terminal dependencies of its own.

pub mod cache;
pub mod chart;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod date_range;
pub mod debounce;
pub mod error;
pub mod geocode;
pub mod model;
pub mod route;
pub mod search;
pub mod view;
pub mod weather;

pub use cache::{CityCache, FileStore, KeyValueStore, MemoryStore};
pub use chart::{ChartRenderer, ChartSurface, LineChart, TextSurface};
pub use config::Config;
pub use controller::{LoadHandle, WeatherController, WeatherView};
pub use date_range::{DateRange, RangeEvent};
pub use debounce::Debouncer;
pub use error::{CacheError, ForecastError, GeoError, LoadError};
pub use geocode::{CityLookup, GeoClient};
pub use model::{City, CityId, Forecast, ForecastSeries, WeatherSnapshot};
pub use route::Route;
pub use search::{CitySearch, SearchEvent, SearchState};
pub use weather::{ForecastSource, WeatherClient};
