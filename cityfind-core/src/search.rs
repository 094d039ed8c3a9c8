//! City search state and the transitions that drive it.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    debounce::Debouncer,
    geocode::{CityLookup, validate_query},
    model::City,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    QueryChanged(String),
    /// Input failed validation; nothing was sent.
    Rejected(String),
    Started,
    Succeeded(Vec<City>),
    Failed(String),
}

/// What the search view displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<City>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SearchState {
    pub fn apply(self, event: SearchEvent) -> Self {
        match event {
            SearchEvent::QueryChanged(query) => Self { query, ..self },
            SearchEvent::Rejected(message) | SearchEvent::Failed(message) => Self {
                results: Vec::new(),
                loading: false,
                error: Some(message),
                ..self
            },
            SearchEvent::Started => Self { loading: true, error: None, ..self },
            SearchEvent::Succeeded(results) => Self { results, loading: false, error: None, ..self },
        }
    }

    /// Whether a manual search may be triggered right now.
    pub fn can_submit(&self, min_len: usize) -> bool {
        !self.loading && self.query.trim().chars().count() >= min_len
    }
}

#[derive(Debug, Clone)]
pub struct CitySearch {
    lookup: Arc<dyn CityLookup>,
    min_query_len: usize,
}

impl CitySearch {
    pub fn new(lookup: Arc<dyn CityLookup>, min_query_len: usize) -> Self {
        Self { lookup, min_query_len }
    }

    /// Run the search for `state.query`. `observe` sees every intermediate
    /// state, including the loading one.
    pub async fn submit<F>(&self, state: SearchState, mut observe: F) -> SearchState
    where
        F: FnMut(&SearchState),
    {
        if let Err(e) = validate_query(&state.query, self.min_query_len) {
            let next = state.apply(SearchEvent::Rejected(e.user_message()));
            observe(&next);
            return next;
        }

        let loading = state.apply(SearchEvent::Started);
        observe(&loading);

        let event = match self.lookup.search(&loading.query).await {
            Ok(cities) => SearchEvent::Succeeded(cities),
            Err(e) => {
                debug!("City search failed: {e}");
                SearchEvent::Failed(e.user_message())
            }
        };

        let next = loading.apply(event);
        observe(&next);
        next
    }

    /// Search for every query the debouncer lets through, publishing each
    /// state on `states`. Returns when `updates` closes or `states` is dropped.
    pub async fn run_debounced(
        &self,
        debouncer: Debouncer,
        updates: mpsc::Receiver<String>,
        states: mpsc::UnboundedSender<SearchState>,
    ) {
        let (mut settled, handle) = debouncer.spawn(updates);
        let mut state = SearchState::default();

        while let Some(query) = settled.recv().await {
            state = state.apply(SearchEvent::QueryChanged(query));
            let mut closed = false;
            state = self
                .submit(state, |s| {
                    closed |= states.send(s.clone()).is_err();
                })
                .await;
            if closed {
                break;
            }
        }

        handle.abort();
    }
}
