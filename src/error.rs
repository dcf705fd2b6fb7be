//! Error types for the lending rate refresh pipeline

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a `ChainClient`
#[derive(Debug, Error)]
pub enum ChainError {
    /// The asset id is not a usable contract address
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// RPC or transport failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Response did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The lending pool has no reserve for this asset
    #[error("Reserve not found for {0}")]
    ReserveNotFound(String),

    /// Block subscription failed or was dropped
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

/// Kind of failure recorded against a single asset in a fetch pass
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateErrorKind {
    #[error("invalid asset address")]
    InvalidAssetAddress,

    #[error("remote call failure")]
    RemoteCallFailure,

    #[error("malformed response")]
    MalformedResponse,
}

impl From<&ChainError> for RateErrorKind {
    fn from(err: &ChainError) -> Self {
        match err {
            ChainError::InvalidAddress(_) => RateErrorKind::InvalidAssetAddress,
            ChainError::Rpc(_) | ChainError::Subscription(_) | ChainError::Timeout => {
                RateErrorKind::RemoteCallFailure
            }
            ChainError::MalformedResponse(_) | ChainError::ReserveNotFound(_) => {
                RateErrorKind::MalformedResponse
            }
        }
    }
}

/// Errors from parsing a hex contract address
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    #[error("address must have 40 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("address contains non-hex characters: {0}")]
    InvalidHex(String),

    #[error("address fails EIP-55 checksum: {0}")]
    BadChecksum(String),
}

/// Errors building an asset registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Asset registry is empty")]
    Empty,

    #[error("Duplicate asset id: {0}")]
    DuplicateAsset(String),

    #[error("Asset {symbol} has {decimals} decimals (max 18)")]
    InvalidDecimals { symbol: String, decimals: u8 },
}

/// Errors starting a block watcher
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watcher already holds a subscription
    #[error("Watcher already has an active subscription")]
    AlreadyWatching,

    /// The chain client refused the subscription
    #[error("Failed to subscribe to blocks: {0}")]
    Subscribe(#[from] ChainError),
}

/// Errors that can occur when reading a rate from the cache
#[derive(Debug, Error, Clone)]
pub enum RateLookupError {
    /// Rate never fetched, or asset not tracked
    #[error("Rate not available for {asset}")]
    NotAvailable { asset: String },

    /// Rate data is too old (stale)
    #[error("Rate for {asset} is stale (age: {age:?})")]
    Stale { asset: String, age: Duration },

    /// The last pass recorded an error for this asset
    #[error("Last fetch for {asset} failed: {kind}")]
    FetchFailed { asset: String, kind: RateErrorKind },
}

impl RateLookupError {
    /// Creates a NotAvailable error
    pub fn not_available(asset: &str) -> Self {
        Self::NotAvailable {
            asset: asset.to_string(),
        }
    }

    /// Creates a Stale error
    pub fn stale(asset: &str, age: Duration) -> Self {
        Self::Stale {
            asset: asset.to_string(),
            age,
        }
    }

    /// Creates a FetchFailed error
    pub fn fetch_failed(asset: &str, kind: RateErrorKind) -> Self {
        Self::FetchFailed {
            asset: asset.to_string(),
            kind,
        }
    }
}
