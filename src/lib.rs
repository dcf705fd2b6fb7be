//! # Lending Rate Refresh SDK
//!
//! Keeps a live cache of per-asset variable borrow rates read from an
//! Aave-style lending pool, refreshed on every new block (debounced) and on
//! demand.
//!
//! ## Important: This does NOT talk to a node by itself
//!
//! The RPC transport and the pool ABI belong to the caller. Implement
//! [`ChainClient`] for your connection and hand it to the controller.
//!
//! ## Usage
//!
//! ```no_run
//! use lending_rate_sdk::{AssetRegistry, ChainClient, RefreshConfig, RefreshController};
//! use std::sync::Arc;
//!
//! # async fn example(client: Arc<dyn ChainClient>) -> Result<(), Box<dyn std::error::Error>> {
//! let controller = RefreshController::with_config(
//!     client,
//!     AssetRegistry::aave_v3_mainnet(),
//!     RefreshConfig::from_env(),
//! );
//! controller.start().await?;
//!
//! let mut state = controller.subscribe_state();
//! while state.changed().await.is_ok() {
//!     let snapshot = state.borrow().clone();
//!     if snapshot.in_flight {
//!         continue;
//!     }
//!     for row in controller.cache().rows() {
//!         match row.rate_percent() {
//!             Some(rate) => println!("{}: {}%", row.asset.symbol, rate),
//!             None => println!("{}: unavailable", row.asset.symbol),
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ChainClient::subscribe_blocks
//!     ↓
//! ChainEventWatcher (block numbers, in order)
//!     ↓
//! Debouncer (1000 ms quiet window)
//!     ↓
//! RefreshController ←── manual_refresh()
//!     ↓
//! RateFetcher (one call per asset, concurrent)
//!     ↓
//! RateCache (swapped whole) → watch / broadcast observers
//! ```

pub mod address;
pub mod client;
pub mod config;
pub mod constants;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod registry;
pub mod store;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use address::Address;
pub use client::{BlockStream, ChainClient};
pub use config::RefreshConfig;
pub use controller::RefreshController;
pub use debounce::Debouncer;
pub use error::{ChainError, RateErrorKind, RateLookupError, RegistryError, WatchError};
pub use fetcher::{normalize_rate, RateFetcher};
pub use metrics::FetchMetrics;
pub use registry::AssetRegistry;
pub use store::RateCache;
pub use types::{
    Asset, ComponentHealth, DisplayMeta, HealthStatus, RateFailure, RateReading, RateResult,
    RawReserveData, RefreshEvent, RefreshOutcome, RefreshState, RefreshTrigger,
};
pub use watcher::ChainEventWatcher;
