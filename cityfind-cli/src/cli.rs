use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use cityfind_core::{
    CityCache, CityId, CitySearch, Config, DateRange, Debouncer, FileStore, GeoClient,
    RangeEvent, Route, SearchEvent, SearchState, WeatherClient, WeatherController,
    dashboard::{SANTIAGO, load_dashboard},
};
use inquire::{DateSelect, Password, Select, Text};
use std::{fmt, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityfind", version, about = "City search and weather charts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the geocoding API credentials.
    Configure,

    /// Search cities by name prefix and pick one to chart.
    Search {
        /// Name prefix; prompted for when absent.
        query: Option<String>,

        /// Only list matches, do not prompt for a selection.
        #[arg(long)]
        no_select: bool,
    },

    /// Debounced search over query updates read from stdin, one per line.
    Watch,

    /// Show current weather, temperature chart and daily forecast.
    Show {
        city_id: CityId,

        /// First day of the range (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day of the range; defaults to a week after the start.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Keep the view open and edit the date range.
        #[arg(long, short)]
        interactive: bool,
    },

    /// Navigate to an app path such as /weather-charts/42.
    Open { path: String },

    /// Most populous cities and the weather in Santiago.
    Dashboard,

    /// Manage the local city cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Print the cache location and entry count.
    Info,
    /// Remove every cached city.
    Clear,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load()?;
        config.apply_env();

        match self.command {
            Command::Configure => configure(config),
            Command::Search { query, no_select } => search(&config, query, no_select).await,
            Command::Watch => watch(&config).await,
            Command::Show { city_id, start, end, interactive } => {
                let range = initial_range(start, end)?;
                show(&config, city_id, range, interactive).await
            }
            Command::Open { path } => match Route::parse(&path) {
                Some(Route::WeatherCharts(id)) => {
                    show(&config, id, DateRange::week_from(today()), false).await
                }
                Some(Route::Home) => search(&config, None, false).await,
                None => Err(anyhow!("No page at '{path}'")),
            },
            Command::Dashboard => dashboard(&config).await,
            Command::Cache { action } => cache(&config, action),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn initial_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<DateRange> {
    let start = start.unwrap_or_else(today);
    let week = DateRange::week_from(start);
    Ok(DateRange::new(start, end.unwrap_or(week.end()))?)
}

fn configure(mut config: Config) -> Result<()> {
    let key = Password::new("Geocoding API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let host = Text::new("Geocoding API host:")
        .with_default(&config.geo.api_host)
        .prompt()
        .context("Failed to read API host")?;

    config.set_geo_api_key(key.trim().to_string());
    config.geo.api_host = host.trim().to_string();
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn open_cache(config: &Config) -> Result<CityCache<FileStore>> {
    let path = config.cache_file_path()?;
    let store = FileStore::open(&path)
        .with_context(|| format!("Failed to open city cache: {}", path.display()))?;
    Ok(CityCache::new(store))
}

async fn search(config: &Config, query: Option<String>, no_select: bool) -> Result<()> {
    let geo = GeoClient::from_config(config)?;
    let min_len = geo.min_query_len();
    let search = CitySearch::new(Arc::new(geo), min_len);

    let query = match query {
        Some(q) => q,
        None => Text::new("Search city:").prompt().context("Failed to read query")?,
    };

    let state = SearchState::default().apply(SearchEvent::QueryChanged(query));
    let state = search.submit(state, render::print_search_state).await;

    if no_select || state.results.is_empty() {
        return Ok(());
    }

    let city = Select::new("Pick a city:", state.results).prompt().context("No city selected")?;
    let route = Route::for_city(&city);
    debug!(%route, "Navigating");

    match route {
        Route::WeatherCharts(id) => show(config, id, DateRange::week_from(today()), false).await,
        Route::Home => Ok(()),
    }
}

async fn watch(config: &Config) -> Result<()> {
    let geo = GeoClient::from_config(config)?;
    let search = CitySearch::new(Arc::new(geo), config.search.min_query_len);
    let debouncer = Debouncer::from_config(&config.search);

    let (updates_tx, updates_rx) = mpsc::channel(32);
    let (states_tx, mut states_rx) = mpsc::unbounded_channel();

    let runner = tokio::spawn(async move { search.run_debounced(debouncer, updates_rx, states_tx).await });

    let printer = tokio::spawn(async move {
        while let Some(state) = states_rx.recv().await {
            render::print_search_state(&state);
        }
    });

    println!("Type a city name; results appear after {} ms without input.", debouncer.quiet().as_millis());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if updates_tx.send(line).await.is_err() {
            break;
        }
    }

    drop(updates_tx);
    runner.await.context("Search task failed")?;
    printer.await.context("Output task failed")?;
    Ok(())
}

async fn show(config: &Config, id: CityId, range: DateRange, interactive: bool) -> Result<()> {
    let geo = GeoClient::from_config(config)?;
    let weather = WeatherClient::from_config(config);
    let mut controller = WeatherController::new(Arc::new(geo), Arc::new(weather), open_cache(config)?);
    let mut renderer = render::chart_renderer();

    let mut range = range;
    controller.load(id, range);

    loop {
        match controller.next_view().await {
            Some(Ok(view)) => render::print_weather_view(&view, &mut renderer),
            Some(Err(e)) => {
                debug!("Load failed: {e}");
                println!("{}", e.user_message());
            }
            None => {}
        }

        if !interactive {
            return Ok(());
        }

        let Some(event) = prompt_range_event(range)? else {
            return Ok(());
        };

        let transition = range.apply(event);
        range = transition.range;
        if transition.changed {
            controller.load(id, range);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RangeAction {
    Start,
    End,
    Reset,
    Quit,
}

impl fmt::Display for RangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RangeAction::Start => "Change start date",
            RangeAction::End => "Change end date",
            RangeAction::Reset => "Reset to the next 7 days",
            RangeAction::Quit => "Quit",
        })
    }
}

fn prompt_range_event(range: DateRange) -> Result<Option<RangeEvent>> {
    let actions = vec![RangeAction::Start, RangeAction::End, RangeAction::Reset, RangeAction::Quit];
    let action = Select::new(&format!("Range {range}:"), actions).prompt()?;
    let bounds = range.bounds();

    let event = match action {
        RangeAction::Start => RangeEvent::SetStart(
            DateSelect::new("Start date:")
                .with_default(range.start())
                .with_max_date(bounds.start_max)
                .prompt()?,
        ),
        RangeAction::End => RangeEvent::SetEnd(
            DateSelect::new("End date:")
                .with_default(range.end())
                .with_min_date(bounds.end_min)
                .prompt()?,
        ),
        RangeAction::Reset => RangeEvent::Reset { today: today() },
        RangeAction::Quit => return Ok(None),
    };

    Ok(Some(event))
}

async fn dashboard(config: &Config) -> Result<()> {
    let geo = GeoClient::from_config(config).ok();
    if geo.is_none() {
        debug!("No geocoding key configured, dashboard uses default cities");
    }
    let weather = WeatherClient::from_config(config);

    let dash = load_dashboard(geo.as_ref(), &weather, SANTIAGO, today()).await;
    render::print_dashboard(&dash);
    Ok(())
}

fn cache(config: &Config, action: CacheAction) -> Result<()> {
    let mut cache = open_cache(config)?;
    match action {
        CacheAction::Info => {
            println!("{} ({} cities)", cache.store().path().display(), cache.len());
        }
        CacheAction::Clear => {
            let n = cache.len();
            cache.clear().context("Failed to clear city cache")?;
            println!("Removed {n} cached cities");
        }
    }
    Ok(())
}
