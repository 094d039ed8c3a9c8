//! Quiet-period debouncing of query updates.

use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle, time};
use tracing::{debug, trace};

use crate::config::SearchConfig;

/// Emits a query only after no newer update arrived for `quiet`.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    quiet: Duration,
    min_len: usize,
}

impl Debouncer {
    pub fn new(quiet: Duration, min_len: usize) -> Self {
        Self { quiet, min_len }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.debounce_quiet(), config.min_query_len)
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    fn passes_gate(&self, query: &str) -> bool {
        query.chars().count() >= self.min_len
    }

    /// Forward settled queries from `updates` to `settled` until either side
    /// closes. A value still pending when `updates` closes is dropped.
    pub async fn run(self, mut updates: mpsc::Receiver<String>, settled: mpsc::Sender<String>) {
        let mut pending: Option<String> = None;

        loop {
            let Some(query) = pending.take() else {
                match updates.recv().await {
                    Some(next) => pending = Some(next),
                    None => return,
                }
                continue;
            };

            tokio::select! {
                next = updates.recv() => match next {
                    Some(next) => {
                        trace!(superseded = %query, "Debounce timer reset");
                        pending = Some(next);
                    }
                    None => {
                        debug!(dropped = %query, "Input closed with a pending query");
                        return;
                    }
                },
                _ = time::sleep(self.quiet) => {
                    let query = query.trim().to_string();
                    if !self.passes_gate(&query) {
                        debug!(%query, "Settled query below minimum length, skipping");
                        continue;
                    }
                    debug!(%query, "Debounce fired");
                    if settled.send(query).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Spawn [`Debouncer::run`] on the current runtime.
    pub fn spawn(self, updates: mpsc::Receiver<String>) -> (mpsc::Receiver<String>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(self.run(updates, tx));
        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(800);

    async fn type_burst(tx: &mpsc::Sender<String>, keys: &[&str], gap: Duration) {
        for key in keys {
            tx.send(key.to_string()).await.expect("debouncer alive");
            time::sleep(gap).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_emits_only_the_final_query() {
        let (tx, rx) = mpsc::channel(16);
        let (mut settled, handle) = Debouncer::new(QUIET, 3).spawn(rx);

        type_burst(&tx, &["Lon", "Lond", "Londo", "London"], Duration::from_millis(100)).await;

        assert_eq!(settled.recv().await.as_deref(), Some("London"));

        drop(tx);
        assert_eq!(settled.recv().await, None);
        handle.await.expect("debouncer task must not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn separated_bursts_emit_twice() {
        let (tx, rx) = mpsc::channel(16);
        let (mut settled, _handle) = Debouncer::new(QUIET, 3).spawn(rx);

        type_burst(&tx, &["Par", "Pari"], Duration::from_millis(100)).await;
        time::sleep(Duration::from_secs(1)).await;
        type_burst(&tx, &["Paris"], Duration::from_millis(100)).await;

        assert_eq!(settled.recv().await.as_deref(), Some("Pari"));
        assert_eq!(settled.recv().await.as_deref(), Some("Paris"));
    }

    #[tokio::test(start_paused = true)]
    async fn short_settled_query_is_swallowed() {
        let (tx, rx) = mpsc::channel(16);
        let (mut settled, _handle) = Debouncer::new(QUIET, 3).spawn(rx);

        type_burst(&tx, &["Lo"], Duration::from_secs(1)).await;
        type_burst(&tx, &[" Lim "], Duration::from_millis(10)).await;

        assert_eq!(settled.recv().await.as_deref(), Some("Lim"));
    }

    #[tokio::test(start_paused = true)]
    async fn closing_input_drops_pending_query() {
        let (tx, rx) = mpsc::channel(16);
        let (mut settled, handle) = Debouncer::new(QUIET, 3).spawn(rx);

        tx.send("Berlin".to_string()).await.expect("debouncer alive");
        drop(tx);

        assert_eq!(settled.recv().await, None);
        handle.await.expect("debouncer task must not panic");
    }
}
