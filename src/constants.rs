//! Constants for the lending rate refresh pipeline
//!
//! Compile-time defaults live here. `RefreshConfig` starts from these values
//! and lets callers (or the environment) override the runtime knobs.

/// Quiet window after the most recent block before an auto refresh fires (in milliseconds)
pub const DEBOUNCE_WINDOW_MS: u64 = 1000;

/// Timeout for a single `getReserveData` call (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long before a cached rate is considered stale (in seconds)
pub const STALE_THRESHOLD_SECS: u64 = 300;

/// Fixed-point scale of on-chain rates (ray = 10^27)
pub const RAY_DECIMALS: u32 = 27;

/// Decimal places kept when rendering a rate as a percentage
pub const PERCENT_DECIMALS: u32 = 2;

/// Largest token decimals accepted by the asset registry
pub const MAX_ASSET_DECIMALS: u8 = 18;

/// Capacity of the refresh event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Aave V3 lending pool on Ethereum mainnet
pub const AAVE_V3_POOL_ADDRESS: &str = "0x41393e5e337606dc3821075af65aee84d7688cbd";

/// Environment variable overriding the debounce window (milliseconds)
pub const ENV_DEBOUNCE_MS: &str = "RATE_REFRESH_DEBOUNCE_MS";

/// Environment variable overriding the per-call timeout (seconds)
pub const ENV_TIMEOUT_SECS: &str = "RATE_REFRESH_TIMEOUT_SECS";

/// Environment variable toggling auto refresh ("true"/"false")
pub const ENV_AUTO_REFRESH: &str = "RATE_REFRESH_AUTO";
