//! Landing dashboard: the most populous cities plus weather for a fixed place.

use chrono::NaiveDate;
use tracing::warn;

use crate::{
    date_range::DateRange,
    error::ForecastError,
    geocode::GeoClient,
    model::{Forecast, PopularCity},
    weather::ForecastSource,
};

pub const POPULAR_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLocation {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

pub const SANTIAGO: FixedLocation =
    FixedLocation { name: "Santiago, Chile", latitude: -33.45, longitude: -70.66 };

#[derive(Debug)]
pub struct Dashboard {
    pub popular: Vec<PopularCity>,
    pub location: FixedLocation,
    pub local: Result<Forecast, ForecastError>,
}

/// The next three days of daily points for the widget.
pub fn widget_range(today: NaiveDate) -> DateRange {
    let end = today.succ_opt().and_then(|d| d.succ_opt()).unwrap_or(today);
    DateRange::new(today, end).unwrap_or_else(|_| DateRange::week_from(today))
}

/// Both halves are fetched concurrently; a weather failure does not hide the
/// population chart.
pub async fn load_dashboard(
    geo: Option<&GeoClient>,
    forecasts: &dyn ForecastSource,
    location: FixedLocation,
    today: NaiveDate,
) -> Dashboard {
    let popular = async {
        match geo {
            Some(geo) => geo.popular_cities(POPULAR_LIMIT).await,
            None => crate::geocode::default_popular_cities(),
        }
    };
    let local = forecasts.forecast(location.latitude, location.longitude, widget_range(today));

    let (popular, local) = tokio::join!(popular, local);
    if let Err(e) = &local {
        warn!(location = location.name, "Dashboard weather unavailable: {e}");
    }

    Dashboard { popular, location, local }
}
