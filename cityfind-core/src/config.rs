use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

pub const DEFAULT_GEO_BASE_URL: &str = "https://wft-geo-db.p.rapidapi.com";
pub const DEFAULT_GEO_API_HOST: &str = "wft-geo-db.p.rapidapi.com";
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

pub const ENV_GEO_API_KEY: &str = "CITYFIND_GEO_API_KEY";
pub const ENV_GEO_API_HOST: &str = "CITYFIND_GEO_API_HOST";
pub const ENV_WEATHER_URL: &str = "CITYFIND_WEATHER_URL";

/// Geocoding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub api_key: Option<String>,
    pub api_host: String,
    pub base_url: String,
    /// Cities below this population are filtered out server-side.
    pub min_population: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_host: DEFAULT_GEO_API_HOST.to_string(),
            base_url: DEFAULT_GEO_BASE_URL.to_string(),
            min_population: 50_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_WEATHER_URL.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub min_query_len: usize,
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { min_query_len: 3, debounce_ms: 800 }
    }
}

impl SearchConfig {
    pub fn debounce_quiet(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [geo]
/// api_key = "..."
///
/// [search]
/// debounce_ms = 800
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub geo: GeoConfig,
    pub weather: WeatherConfig,
    pub search: SearchConfig,
    /// Overrides the location of the city cache file.
    pub cache_file: Option<PathBuf>,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "cityfind", "cityfind")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path of the city cache, honouring `cache_file` when set.
    pub fn cache_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_file {
            return Ok(path.clone());
        }
        Ok(Self::project_dirs()?.cache_dir().join("cities.json"))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`; empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_GEO_API_KEY) {
            self.geo.api_key = Some(key);
        }
        if let Some(host) = get(ENV_GEO_API_HOST) {
            self.geo.api_host = host;
        }
        if let Some(url) = get(ENV_WEATHER_URL) {
            self.weather.base_url = url;
        }
    }

    /// Returns the geocoding API key or a hint on how to set one.
    pub fn geo_api_key(&self) -> Result<&str> {
        self.geo.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No geocoding API key configured.\n\
                 Hint: run `cityfind configure` or set {ENV_GEO_API_KEY}."
            )
        })
    }

    pub fn set_geo_api_key(&mut self, api_key: String) {
        self.geo.api_key = Some(api_key);
    }
}
