//! City search against the GeoDB cities REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::GeoError,
    model::{City, CityId, PopularCity},
};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Shown when the popular-cities request cannot be served.
pub fn default_popular_cities() -> Vec<PopularCity> {
    vec![
        PopularCity::new("Tokyo", 37.4),
        PopularCity::new("New Delhi", 31.0),
        PopularCity::new("Shanghai", 27.1),
        PopularCity::new("São Paulo", 22.2),
        PopularCity::new("Mexico City", 21.9),
    ]
}

#[async_trait]
pub trait CityLookup: Send + Sync + Debug {
    /// Cities whose name starts with `query`.
    async fn search(&self, query: &str) -> Result<Vec<City>, GeoError>;

    async fn city_by_id(&self, id: CityId) -> Result<City, GeoError>;
}

/// Trims the raw input and enforces the minimum length, counted in chars.
pub fn validate_query(raw: &str, min_len: usize) -> Result<&str, GeoError> {
    let query = raw.trim();
    if query.chars().count() < min_len {
        return Err(GeoError::QueryTooShort { min: min_len });
    }
    Ok(query)
}

#[derive(Debug, Deserialize)]
struct CityList {
    data: Option<Vec<City>>,
}

#[derive(Debug, Deserialize)]
struct CityDetail {
    data: City,
}

#[derive(Debug, Deserialize)]
struct RankedCity {
    name: String,
    population: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RankedList {
    data: Vec<RankedCity>,
}

#[derive(Debug, Clone)]
pub struct GeoClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_host: String,
    min_population: u64,
    min_query_len: usize,
}

impl GeoClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let defaults = crate::config::GeoConfig::default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_host: defaults.api_host,
            min_population: defaults.min_population,
            min_query_len: crate::config::SearchConfig::default().min_query_len,
        }
    }

    /// Build a client from the loaded configuration. Fails without an API key.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.geo_api_key()?;
        Ok(Self::new(config.geo.base_url.as_str(), api_key)
            .with_api_host(config.geo.api_host.as_str())
            .with_min_population(config.geo.min_population)
            .with_min_query_len(config.search.min_query_len))
    }

    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = host.into();
        self
    }

    pub fn with_min_population(mut self, min_population: u64) -> Self {
        self.min_population = min_population;
        self
    }

    pub fn with_min_query_len(mut self, min_query_len: usize) -> Self {
        self.min_query_len = min_query_len;
        self
    }

    pub fn min_query_len(&self) -> usize {
        self.min_query_len
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
    }

    /// The most populous cities, falling back to a built-in list on any failure.
    pub async fn popular_cities(&self, limit: usize) -> Vec<PopularCity> {
        match self.fetch_popular(limit).await {
            Ok(cities) if !cities.is_empty() => cities,
            Ok(_) => {
                warn!("Popular cities response was empty, using defaults");
                default_popular_cities()
            }
            Err(e) => {
                warn!("Failed to fetch popular cities, using defaults: {e}");
                default_popular_cities()
            }
        }
    }

    async fn fetch_popular(&self, limit: usize) -> Result<Vec<PopularCity>, GeoError> {
        let res = self
            .get("/v1/geo/cities")
            .query(&[("limit", limit.to_string().as_str()), ("sort", "-population")])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(http_error(status));
        }

        let parsed: RankedList =
            serde_json::from_str(&body).map_err(|e| GeoError::Parse(e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .take(limit)
            .map(|c| {
                let millions = c.population.unwrap_or(0) as f64 / 1_000_000.0;
                PopularCity::new(c.name, millions)
            })
            .collect())
    }
}

fn http_error(status: StatusCode) -> GeoError {
    GeoError::Http {
        status: status.as_u16(),
        text: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
    }
}

#[async_trait]
impl CityLookup for GeoClient {
    async fn search(&self, query: &str) -> Result<Vec<City>, GeoError> {
        let query = validate_query(query, self.min_query_len)?;
        debug!(query, "Searching cities");

        let res = self
            .get("/v1/geo/cities")
            .query(&[
                ("namePrefix", query),
                ("minPopulation", self.min_population.to_string().as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            warn!(%status, "City search failed: {}", truncate_body(&body));
            return Err(http_error(status));
        }

        let parsed: CityList =
            serde_json::from_str(&body).map_err(|e| GeoError::Parse(e.to_string()))?;

        match parsed.data {
            Some(cities) if !cities.is_empty() => {
                info!(query, count = cities.len(), "City search returned results");
                Ok(cities)
            }
            _ => Err(GeoError::NotFound),
        }
    }

    async fn city_by_id(&self, id: CityId) -> Result<City, GeoError> {
        debug!(%id, "Fetching city by id");

        let res = self.get(&format!("/v1/geo/cities/{id}")).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            warn!(%id, %status, "City lookup failed: {}", truncate_body(&body));
            return Err(GeoError::CityUnavailable { id, status: status.as_u16() });
        }

        let parsed: CityDetail =
            serde_json::from_str(&body).map_err(|e| GeoError::Parse(e.to_string()))?;

        Ok(parsed.data)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
