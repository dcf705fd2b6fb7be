//! Refresh controller
//!
//! Owns the rate cache and the refresh state machine (`Idle` / `Fetching`).
//! Passes start from a manual request or from a debounced block event; at
//! most one pass is in flight, and triggers arriving meanwhile are dropped.

use crate::{
    client::ChainClient,
    config::RefreshConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    debounce::Debouncer,
    error::{ChainError, WatchError},
    fetcher::RateFetcher,
    metrics::FetchMetrics,
    registry::AssetRegistry,
    store::RateCache,
    types::{
        ComponentHealth, HealthStatus, RateResult, RefreshEvent, RefreshOutcome, RefreshState,
        RefreshTrigger,
    },
    watcher::ChainEventWatcher,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

struct ControllerState {
    in_flight: bool,
    last_update: Option<DateTime<Utc>>,
    auto_refresh: bool,
    latest_block: Option<u64>,
    watching: bool,
    /// Bumped by stop(); a pass only lands if the epoch it started in is still current
    epoch: u64,
    /// A pass from an earlier epoch is still making remote calls
    orphaned: bool,
    cache: RateCache,
}

impl ControllerState {
    fn snapshot(&self) -> RefreshState {
        RefreshState {
            in_flight: self.in_flight,
            last_update: self.last_update,
            auto_refresh_enabled: self.auto_refresh,
            latest_block: self.latest_block,
        }
    }
}

struct Inner {
    registry: AssetRegistry,
    fetcher: RateFetcher,
    config: RefreshConfig,
    state: Mutex<ControllerState>,
    state_tx: watch::Sender<RefreshState>,
    events_tx: broadcast::Sender<RefreshEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ControllerState) {
        self.state_tx.send_replace(state.snapshot());
    }

    fn emit(&self, event: RefreshEvent) {
        // no receivers is fine
        let _ = self.events_tx.send(event);
    }

    /// Idle -> Fetching. Returns the epoch the pass belongs to.
    fn begin_pass(&self, trigger: RefreshTrigger) -> Result<u64, RefreshOutcome> {
        let mut state = self.lock();

        if trigger != RefreshTrigger::Manual {
            if !state.auto_refresh {
                return Err(RefreshOutcome::AutoRefreshDisabled);
            }
            if !state.watching {
                return Err(RefreshOutcome::Discarded);
            }
        }
        // in_flight is cleared by stop(), but the stopped pass may still be running
        if state.in_flight || state.orphaned {
            return Err(RefreshOutcome::AlreadyInFlight);
        }

        state.in_flight = true;
        let epoch = state.epoch;
        self.publish(&state);
        drop(state);

        self.emit(RefreshEvent::RefreshStarted {
            id: Uuid::new_v4(),
            trigger,
            asset_count: self.registry.len(),
            timestamp: Utc::now(),
        });
        Ok(epoch)
    }

    /// Fetching -> Idle, unless stop() happened since the pass began
    fn complete_pass(&self, epoch: u64, results: Vec<RateResult>) -> RefreshOutcome {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let failed = results.len() - succeeded;

        let mut state = self.lock();
        if state.epoch != epoch {
            state.orphaned = false;
            drop(state);
            tracing::debug!(succeeded, failed, "Discarding pass that finished after stop");
            self.emit(RefreshEvent::RefreshDiscarded {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
            });
            return RefreshOutcome::Discarded;
        }

        let now = Utc::now();
        state.cache = RateCache::from_pass(results, now, self.config.stale_threshold_secs);
        state.last_update = Some(now);
        state.in_flight = false;
        self.publish(&state);
        drop(state);

        self.emit(RefreshEvent::RefreshCompleted {
            id: Uuid::new_v4(),
            succeeded,
            failed,
            timestamp: now,
        });
        RefreshOutcome::Completed { succeeded, failed }
    }

    async fn run_pass(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        let epoch = match self.begin_pass(trigger) {
            Ok(epoch) => epoch,
            Err(outcome) => {
                tracing::debug!(?trigger, ?outcome, "Refresh trigger dropped");
                return outcome;
            }
        };

        let start = Instant::now();
        let results = self.fetcher.fetch(self.registry.assets()).await;
        let outcome = self.complete_pass(epoch, results);

        if let RefreshOutcome::Completed { succeeded, failed } = outcome {
            tracing::debug!(
                ?trigger,
                succeeded,
                failed,
                latency_ms = start.elapsed().as_millis() as u64,
                "Refreshed lending rates"
            );
        }
        outcome
    }

    fn on_block(&self, block_number: u64, debouncer: &Debouncer) {
        let auto_refresh = {
            let mut state = self.lock();
            state.latest_block = Some(block_number);
            self.publish(&state);
            state.auto_refresh
        };

        self.emit(RefreshEvent::BlockObserved {
            id: Uuid::new_v4(),
            block_number,
            timestamp: Utc::now(),
        });

        if auto_refresh {
            debouncer.trigger();
        }
    }

    fn on_subscription_error(&self, error: &ChainError) {
        self.emit(RefreshEvent::SubscriptionFailed {
            id: Uuid::new_v4(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Block-driven lending rate refresher
///
/// # Example
/// ```no_run
/// use lending_rate_sdk::{AssetRegistry, ChainClient, RefreshController};
/// use std::sync::Arc;
///
/// # async fn example(client: Arc<dyn ChainClient>) -> Result<(), Box<dyn std::error::Error>> {
/// let controller = RefreshController::new(client, AssetRegistry::aave_v3_mainnet());
/// controller.start().await?;
///
/// controller.manual_refresh().await;
/// for row in controller.cache().rows() {
///     match &row.outcome {
///         Ok(reading) => println!("{}: {}%", row.asset.symbol, reading.rate_percent),
///         Err(failure) => println!("{}: {}", row.asset.symbol, failure.kind),
///     }
/// }
///
/// controller.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct RefreshController {
    inner: Arc<Inner>,
    client: Arc<dyn ChainClient>,
    debouncer: Arc<Debouncer>,
    watcher: tokio::sync::Mutex<ChainEventWatcher>,
}

impl RefreshController {
    /// Creates a controller with default configuration
    pub fn new(client: Arc<dyn ChainClient>, registry: AssetRegistry) -> Self {
        Self::with_config(client, registry, RefreshConfig::default())
    }

    /// Creates a controller with explicit configuration
    pub fn with_config(
        client: Arc<dyn ChainClient>,
        registry: AssetRegistry,
        config: RefreshConfig,
    ) -> Self {
        let fetcher = RateFetcher::new(Arc::clone(&client)).with_timeout(config.request_timeout);

        let state = ControllerState {
            in_flight: false,
            last_update: None,
            auto_refresh: config.auto_refresh,
            latest_block: None,
            watching: false,
            epoch: 0,
            orphaned: false,
            cache: RateCache::empty(config.stale_threshold_secs),
        };
        let (state_tx, _) = watch::channel(state.snapshot());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let debounce_window = config.debounce_window;

        let inner = Arc::new(Inner {
            registry,
            fetcher,
            config,
            state: Mutex::new(state),
            state_tx,
            events_tx,
        });

        let fire = Arc::clone(&inner);
        let debouncer = Arc::new(Debouncer::new(debounce_window, move || {
            let inner = Arc::clone(&fire);
            tokio::spawn(async move {
                inner.run_pass(RefreshTrigger::Block).await;
            });
        }));

        Self {
            inner,
            client,
            debouncer,
            watcher: tokio::sync::Mutex::new(ChainEventWatcher::new()),
        }
    }

    /// Starts watching blocks; each debounced block triggers an auto refresh
    ///
    /// With `refresh_on_start`, also kicks off one pass immediately when auto
    /// refresh is enabled.
    pub async fn start(&self) -> Result<(), WatchError> {
        let mut watcher = self.watcher.lock().await;

        let on_block = {
            let inner = Arc::clone(&self.inner);
            let debouncer = Arc::clone(&self.debouncer);
            move |block_number| inner.on_block(block_number, &debouncer)
        };
        let on_error = {
            let inner = Arc::clone(&self.inner);
            move |error: &ChainError| inner.on_subscription_error(error)
        };

        if let Err(e) = watcher
            .start_with_errors(self.client.as_ref(), on_block, on_error)
            .await
        {
            tracing::warn!(error = %e, "Failed to start block watcher");
            return Err(e);
        }
        drop(watcher);

        self.inner.lock().watching = true;
        tracing::info!(
            assets = self.inner.registry.len(),
            client = self.inner.fetcher.client_name(),
            debounce_ms = self.debouncer.window().as_millis() as u64,
            "Started lending rate refresh"
        );

        if self.inner.config.refresh_on_start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.run_pass(RefreshTrigger::Startup).await;
            });
        }
        Ok(())
    }

    /// Stops watching and cancels any pending debounced refresh
    ///
    /// A pass already in flight is not interrupted, but its results are
    /// discarded when it completes, and no new pass starts until then.
    /// Safe to call repeatedly.
    pub async fn stop(&self) {
        let was_in_flight = {
            let mut state = self.inner.lock();
            let was_in_flight = state.in_flight;
            state.epoch = state.epoch.wrapping_add(1);
            state.orphaned |= was_in_flight;
            state.in_flight = false;
            state.watching = false;
            self.inner.publish(&state);
            was_in_flight
        };
        let mut cancelled = self.debouncer.cancel();

        self.watcher.lock().await.stop().await;
        // a block delivered while the watcher shut down may have re-armed the timer
        cancelled |= self.debouncer.cancel();

        tracing::info!(was_in_flight, cancelled, "Stopped lending rate refresh");
    }

    /// Runs a pass now, bypassing the debouncer
    ///
    /// # Returns
    /// `AlreadyInFlight` if another pass is running, `Discarded` if the
    /// controller was stopped before this pass finished
    pub async fn manual_refresh(&self) -> RefreshOutcome {
        self.inner.run_pass(RefreshTrigger::Manual).await
    }

    /// Enables or disables block-driven refresh
    ///
    /// Enabling does not fetch by itself. Disabling also drops a pending
    /// debounced refresh.
    pub fn set_auto_refresh(&self, enabled: bool) {
        {
            let mut state = self.inner.lock();
            state.auto_refresh = enabled;
            self.inner.publish(&state);
        }
        if !enabled {
            self.debouncer.cancel();
        }
        tracing::info!(enabled, "Auto refresh toggled");
    }

    /// Current refresh state
    pub fn state(&self) -> RefreshState {
        self.inner.lock().snapshot()
    }

    /// Snapshot of the last completed pass
    pub fn cache(&self) -> RateCache {
        self.inner.lock().cache.clone()
    }

    /// Watch channel that receives the refresh state after every change
    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.inner.state_tx.subscribe()
    }

    /// Broadcast channel of refresh events
    pub fn subscribe_events(&self) -> broadcast::Receiver<RefreshEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.inner.config
    }

    /// True while a block subscription is live
    pub async fn is_watching(&self) -> bool {
        self.watcher.lock().await.is_watching()
    }

    /// Latency and success metrics of reserve calls
    pub async fn fetch_metrics(&self) -> FetchMetrics {
        self.inner.fetcher.metrics().await
    }

    /// Perform a health check on the refresh pipeline
    ///
    /// # Returns
    /// ComponentHealth indicating the status of the cached rates and watcher
    pub async fn health_check(&self) -> ComponentHealth {
        let state = self.state();
        let cache = self.cache();
        let watching = self.is_watching().await;

        let fresh = cache
            .successes()
            .filter(|row| cache.get_rate(&row.asset.id).is_ok())
            .count();
        let failed: Vec<String> = cache
            .failures()
            .map(|row| row.asset.symbol.clone())
            .collect();
        let stale = cache.stale_count();

        let mut details = HashMap::new();
        details.insert(
            "tracked_assets".to_string(),
            serde_json::json!(self.inner.registry.len()),
        );
        details.insert("fresh_rates".to_string(), serde_json::json!(fresh));
        details.insert("failed_assets".to_string(), serde_json::json!(failed));
        details.insert("stale_rates".to_string(), serde_json::json!(stale));
        details.insert("last_update".to_string(), serde_json::json!(state.last_update));
        details.insert("latest_block".to_string(), serde_json::json!(state.latest_block));
        details.insert("watching".to_string(), serde_json::json!(watching));
        details.insert(
            "client_name".to_string(),
            serde_json::json!(self.inner.fetcher.client_name()),
        );

        let status = if fresh == 0 {
            HealthStatus::Unhealthy
        } else if !failed.is_empty() || stale > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "All tracked lending rates are fresh".to_string(),
            HealthStatus::Degraded => format!(
                "{} failed and {} stale lending rates",
                failed.len(),
                stale
            ),
            HealthStatus::Unhealthy => "No usable lending rates".to_string(),
        };

        ComponentHealth {
            name: "lending_rate_refresh".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: Utc::now(),
        }
    }
}
