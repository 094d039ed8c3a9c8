//! Orchestrates city resolution and forecast fetching for the weather view.
//!
//! Each call to [`WeatherController::load`] supersedes the previous one: the
//! older load is cancelled and any result it still manages to deliver is
//! discarded, so a slow stale response can never overwrite a newer view.

use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cache::{CityCache, KeyValueStore},
    date_range::DateRange,
    error::LoadError,
    geocode::CityLookup,
    model::{City, CityId, Forecast},
    weather::ForecastSource,
};

/// Everything the weather view renders for one (city, range) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub city: City,
    pub forecast: Forecast,
    pub range: DateRange,
}

/// Resolve `id` through the cache and fetch its forecast for `range`.
pub async fn load_view<S: KeyValueStore>(
    lookup: &dyn CityLookup,
    forecasts: &dyn ForecastSource,
    cache: &Mutex<CityCache<S>>,
    id: CityId,
    range: DateRange,
) -> Result<WeatherView, LoadError> {
    let city = cache.lock().await.get_or_fetch(id, lookup).await?;
    let forecast = forecasts.forecast(city.latitude, city.longitude, range).await?;
    Ok(WeatherView { city, forecast, range })
}

/// Cancels the load it was returned for.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    seq: u64,
    token: CancellationToken,
}

impl LoadHandle {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct Delivery {
    seq: u64,
    outcome: Result<WeatherView, LoadError>,
}

#[derive(Debug)]
pub struct WeatherController<S> {
    lookup: Arc<dyn CityLookup>,
    forecasts: Arc<dyn ForecastSource>,
    cache: Arc<Mutex<CityCache<S>>>,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: mpsc::UnboundedReceiver<Delivery>,
    latest: Option<LoadHandle>,
    task: Option<JoinHandle<()>>,
    next_seq: u64,
}

impl<S: KeyValueStore + 'static> WeatherController<S> {
    pub fn new(
        lookup: Arc<dyn CityLookup>,
        forecasts: Arc<dyn ForecastSource>,
        cache: CityCache<S>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            lookup,
            forecasts,
            cache: Arc::new(Mutex::new(cache)),
            tx,
            rx,
            latest: None,
            task: None,
            next_seq: 0,
        }
    }

    /// Start loading `id` for `range`, cancelling whatever load was running.
    pub fn load(&mut self, id: CityId, range: DateRange) -> LoadHandle {
        if let Some(previous) = self.latest.take() {
            if !previous.is_cancelled() {
                debug!(seq = previous.seq, "Cancelling superseded load");
            }
            previous.cancel();
        }

        self.next_seq += 1;
        let handle = LoadHandle { seq: self.next_seq, token: CancellationToken::new() };
        self.latest = Some(handle.clone());

        let seq = handle.seq;
        let token = handle.token.clone();
        let lookup = Arc::clone(&self.lookup);
        let forecasts = Arc::clone(&self.forecasts);
        let cache = Arc::clone(&self.cache);
        let tx = self.tx.clone();

        info!(seq, %id, %range, "Loading weather view");
        self.task = Some(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(seq, "Load cancelled before completion");
                }
                outcome = load_view(lookup.as_ref(), forecasts.as_ref(), &cache, id, range) => {
                    if !token.is_cancelled() {
                        let _ = tx.send(Delivery { seq, outcome });
                    }
                }
            }
        }));

        handle
    }

    /// Wait for the result of the most recent load. Results of superseded
    /// loads are skipped. Returns `None` when no load is pending.
    pub async fn next_view(&mut self) -> Option<Result<WeatherView, LoadError>> {
        let latest = self.latest.as_ref()?.clone();

        loop {
            tokio::select! {
                biased;

                delivery = self.rx.recv() => {
                    let delivery = delivery?;
                    if delivery.seq == latest.seq {
                        self.latest = None;
                        self.task = None;
                        return Some(delivery.outcome);
                    }
                    debug!(seq = delivery.seq, latest = latest.seq, "Dropping stale weather result");
                }
                _ = latest.token.cancelled() => {
                    self.latest = None;
                    self.task = None;
                    return None;
                }
                joined = join_task(&mut self.task) => {
                    // A delivery sent before the task ended is already queued.
                    self.task = None;
                    if let Ok(delivery) = self.rx.try_recv() {
                        if delivery.seq == latest.seq {
                            self.latest = None;
                            return Some(delivery.outcome);
                        }
                    }
                    if let Err(e) = joined {
                        warn!(seq = latest.seq, "Load task failed: {e}");
                    }
                    self.latest = None;
                    return Some(Err(LoadError::Aborted));
                }
            }
        }
    }

    /// Cached cities, shared with every load.
    pub fn cache(&self) -> Arc<Mutex<CityCache<S>>> {
        Arc::clone(&self.cache)
    }
}

/// Resolves when the task ends; pends forever when there is none.
async fn join_task(task: &mut Option<JoinHandle<()>>) -> Result<(), tokio::task::JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl<S> Drop for WeatherController<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.latest.take() {
            handle.cancel();
        }
    }
}
