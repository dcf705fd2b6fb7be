//! Types for the lending rate refresh pipeline

use crate::address::Address;
use crate::error::{ChainError, RateErrorKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display metadata carried alongside an asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayMeta {
    /// Human readable name
    pub name: Option<String>,
    /// Logo URL for the presentation layer
    pub logo_url: Option<String>,
}

/// A trackable lending pool asset
///
/// The id is kept as the configured string so that a malformed address is
/// reported against that asset's row at fetch time instead of failing startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Token contract address
    pub id: String,
    /// Ticker symbol
    pub symbol: String,
    /// Token decimals (0-18)
    pub decimals: u8,
    /// Display metadata
    pub display: DisplayMeta,
}

impl Asset {
    /// Create a new asset without display metadata
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            decimals,
            display: DisplayMeta::default(),
        }
    }

    /// Attach a logo URL
    pub fn with_logo(mut self, logo_url: impl Into<String>) -> Self {
        self.display.logo_url = Some(logo_url.into());
        self
    }

    /// Attach a display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display.name = Some(name.into());
        self
    }

    /// Parse the asset id into a contract address
    pub fn address(&self) -> Result<Address, ChainError> {
        Ok(Address::parse(&self.id)?)
    }

    /// Lowercased id used for uniqueness and lookups
    pub fn key(&self) -> String {
        self.id.to_ascii_lowercase()
    }
}

/// Reserve data as returned by the lending pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReserveData {
    /// Variable borrow rate, ray scaled (10^27)
    pub variable_borrow_rate: u128,
    /// aToken of the reserve; zero when the pool has no such reserve
    pub a_token_address: Address,
}

/// A successfully normalized rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateReading {
    /// Variable borrow rate as a percentage, two decimals
    pub rate_percent: Decimal,
    /// When the reserve data was received
    pub fetched_at: DateTime<Utc>,
}

impl RateReading {
    /// Get the age of the reading
    pub fn age(&self) -> std::time::Duration {
        let duration = Utc::now().signed_duration_since(self.fetched_at);
        std::time::Duration::from_secs(duration.num_seconds().max(0) as u64)
    }

    /// Check if the reading is older than threshold seconds
    pub fn is_stale(&self, threshold_seconds: u64) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age.num_seconds() > threshold_seconds as i64
    }
}

/// A failure recorded against one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateFailure {
    pub kind: RateErrorKind,
    pub message: String,
}

impl From<&ChainError> for RateFailure {
    fn from(err: &ChainError) -> Self {
        Self {
            kind: err.into(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one asset in one fetch pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateResult {
    pub asset: Asset,
    pub outcome: Result<RateReading, RateFailure>,
}

impl RateResult {
    pub fn success(asset: Asset, reading: RateReading) -> Self {
        Self {
            asset,
            outcome: Ok(reading),
        }
    }

    pub fn failure(asset: Asset, failure: RateFailure) -> Self {
        Self {
            asset,
            outcome: Err(failure),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The normalized rate, if the fetch succeeded
    pub fn rate_percent(&self) -> Option<Decimal> {
        self.outcome.as_ref().ok().map(|r| r.rate_percent)
    }

    /// The error kind, if the fetch failed
    pub fn error_kind(&self) -> Option<RateErrorKind> {
        self.outcome.as_ref().err().map(|f| f.kind)
    }
}

/// Refresh state observed by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshState {
    pub in_flight: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub auto_refresh_enabled: bool,
    pub latest_block: Option<u64>,
}

impl RefreshState {
    pub fn new(auto_refresh_enabled: bool) -> Self {
        Self {
            in_flight: false,
            last_update: None,
            auto_refresh_enabled,
            latest_block: None,
        }
    }
}

/// What started a fetch pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    /// Explicit user request
    Manual,
    /// Debounced block notification
    Block,
    /// Initial pass when watching starts
    Startup,
}

/// Result of asking the controller for a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The pass ran and its results replaced the cache
    Completed { succeeded: usize, failed: usize },
    /// Another pass was already in flight; the request was dropped
    AlreadyInFlight,
    /// Auto refresh is disabled; the trigger was dropped
    AutoRefreshDisabled,
    /// The controller was stopped while the pass ran; results were thrown away
    Discarded,
}

/// Refresh events for observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshEvent {
    /// A new block arrived from the watcher
    BlockObserved {
        id: Uuid,
        block_number: u64,
        timestamp: DateTime<Utc>,
    },

    /// A fetch pass began
    RefreshStarted {
        id: Uuid,
        trigger: RefreshTrigger,
        asset_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A fetch pass finished and replaced the cache
    RefreshCompleted {
        id: Uuid,
        succeeded: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// A fetch pass finished after stop and was dropped
    RefreshDiscarded { id: Uuid, timestamp: DateTime<Utc> },

    /// The block subscription reported an error
    SubscriptionFailed {
        id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl RefreshEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            RefreshEvent::BlockObserved { id, .. } => *id,
            RefreshEvent::RefreshStarted { id, .. } => *id,
            RefreshEvent::RefreshCompleted { id, .. } => *id,
            RefreshEvent::RefreshDiscarded { id, .. } => *id,
            RefreshEvent::SubscriptionFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            RefreshEvent::BlockObserved { .. } => "BLOCK_OBSERVED",
            RefreshEvent::RefreshStarted { .. } => "REFRESH_STARTED",
            RefreshEvent::RefreshCompleted { .. } => "REFRESH_COMPLETED",
            RefreshEvent::RefreshDiscarded { .. } => "REFRESH_DISCARDED",
            RefreshEvent::SubscriptionFailed { .. } => "SUBSCRIPTION_FAILED",
        }
    }
}

impl std::fmt::Display for RefreshEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshEvent::BlockObserved { block_number, .. } => {
                write!(f, "Block observed: #{}", block_number)
            }
            RefreshEvent::RefreshStarted {
                trigger,
                asset_count,
                ..
            } => write!(f, "Refresh started ({:?}, {} assets)", trigger, asset_count),
            RefreshEvent::RefreshCompleted {
                succeeded, failed, ..
            } => write!(f, "Refresh completed: {} ok, {} failed", succeeded, failed),
            RefreshEvent::RefreshDiscarded { .. } => write!(f, "Refresh discarded after stop"),
            RefreshEvent::SubscriptionFailed { error_message, .. } => {
                write!(f, "Block subscription failed: {}", error_message)
            }
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Every tracked asset has a fresh rate
    Healthy,
    /// Some rows are failing or stale
    Degraded,
    /// No usable rates
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_key_is_case_insensitive() {
        let a = Asset::new("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", 6);
        let b = Asset::new("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC", 6);
        assert_eq!(a.key(), b.key());
        assert!(a.address().is_ok());
    }

    #[test]
    fn test_invalid_asset_address() {
        let bad = Asset::new("not-an-address", "BAD", 18);
        let err = bad.address().unwrap_err();
        assert_eq!(RateErrorKind::from(&err), RateErrorKind::InvalidAssetAddress);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = RefreshEvent::BlockObserved {
            id: Uuid::new_v4(),
            block_number: 42,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BLOCK_OBSERVED");
        assert_eq!(json["block_number"], 42);
        assert_eq!(event.event_type(), "BLOCK_OBSERVED");
    }
}
