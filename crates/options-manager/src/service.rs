//! Main service loop: load, evaluate, persist, render on a timer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use calendar_core::{AppConfig, Notifier, PositionStore, QuoteSource};
use chrono::{DateTime, Local, TimeZone};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::monitor;
use crate::types::CycleReport;

/// Owns the seams for one monitoring loop.
#[derive(Clone)]
pub struct MonitorService {
    store: Arc<dyn PositionStore>,
    quotes: Arc<dyn QuoteSource>,
    notifier: Arc<dyn Notifier>,
}

impl MonitorService {
    pub fn new(
        store: Arc<dyn PositionStore>,
        quotes: Arc<dyn QuoteSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            quotes,
            notifier,
        }
    }

    /// Runs one cycle at `now`.
    ///
    /// A persist failure is logged and reported through
    /// [`CycleReport::persisted`]; the next cycle writes again. Positions
    /// edited or removed while the cycle ran are not written back.
    ///
    /// # Errors
    /// Returns an error if positions cannot be loaded.
    pub async fn run_cycle<Tz>(&self, now: &DateTime<Tz>) -> Result<CycleReport>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut positions = self
            .store
            .list()
            .await
            .context("Failed to load positions")?;

        let mut snapshots = Vec::with_capacity(positions.len());
        for position in positions.values_mut() {
            snapshots.push(
                monitor::evaluate_position(
                    position,
                    self.quotes.as_ref(),
                    self.notifier.as_ref(),
                    now,
                )
                .await,
            );
        }

        let persisted = match self.store.update_all(&positions).await {
            Ok(written) => {
                if written < positions.len() {
                    info!(
                        skipped = positions.len() - written,
                        "Positions changed during cycle, their results were not saved"
                    );
                }
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to persist positions, retrying next cycle");
                false
            }
        };

        info!(
            positions = snapshots.len(),
            alerts = snapshots.iter().map(|s| s.alerts_fired).sum::<usize>(),
            persisted,
            "Cycle complete"
        );

        Ok(CycleReport {
            snapshots,
            persisted,
        })
    }

    /// Runs cycles until the task is dropped.
    ///
    /// The poll interval and quote cache TTL follow `config`; a change applies
    /// from the next tick.
    /// `on_cycle` receives every completed cycle with its local evaluation time.
    pub async fn run<F>(&self, mut config: watch::Receiver<AppConfig>, mut on_cycle: F)
    where
        F: FnMut(&CycleReport, &DateTime<Local>),
    {
        let mut period = poll_period(&config.borrow());
        let mut cache_ttl = quote_cache_ttl(&config.borrow());
        self.quotes.set_cache_ttl(cache_ttl);
        info!(
            poll_secs = period.as_secs(),
            cache_ttl_secs = cache_ttl.as_secs(),
            "Calendar monitor started"
        );

        let mut interval = new_interval(Instant::now(), period);
        let mut watching = true;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Local::now();
                    match self.run_cycle(&now).await {
                        Ok(report) => on_cycle(&report, &now),
                        Err(e) => error!(error = %e, "Cycle skipped"),
                    }
                }
                changed = config.changed(), if watching => {
                    if changed.is_err() {
                        warn!("Configuration watcher stopped, keeping current interval");
                        watching = false;
                        continue;
                    }
                    let latest = config.borrow_and_update().clone();
                    let next = poll_period(&latest);
                    let next_ttl = quote_cache_ttl(&latest);
                    if next_ttl != cache_ttl {
                        info!(
                            old_secs = cache_ttl.as_secs(),
                            new_secs = next_ttl.as_secs(),
                            "Quote cache TTL changed"
                        );
                        cache_ttl = next_ttl;
                        self.quotes.set_cache_ttl(cache_ttl);
                    }
                    if next != period {
                        info!(
                            old_secs = period.as_secs(),
                            new_secs = next.as_secs(),
                            "Poll interval changed"
                        );
                        period = next;
                        interval = new_interval(Instant::now() + period, period);
                    }
                }
            }
        }
    }
}

fn poll_period(config: &AppConfig) -> Duration {
    Duration::from_secs(config.monitor.poll_interval_secs.max(1))
}

fn quote_cache_ttl(config: &AppConfig) -> Duration {
    Duration::from_secs(config.quote_cache_ttl_secs())
}

fn new_interval(start: Instant, period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
