//! One fetch pass over the tracked assets

use crate::{
    client::ChainClient,
    constants::{PERCENT_DECIMALS, RAY_DECIMALS, REQUEST_TIMEOUT_SECS},
    error::{ChainError, RateErrorKind},
    metrics::{FetchMetrics, MetricsCollector},
    types::{Asset, RateFailure, RateReading, RateResult},
};
use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Converts a ray-scaled rate into a percentage rounded half-up to two decimals
///
/// `percent = raw / 10^27 * 100`. Integer arithmetic keeps the result exact
/// for the full `u128` range.
pub fn normalize_rate(raw: u128) -> Decimal {
    // raw / 10^27 * 100 expressed in hundredths of a percent is raw / 10^23
    let divisor = 10u128.pow(RAY_DECIMALS - PERCENT_DECIMALS - 2);
    let quotient = raw / divisor;
    let remainder = raw % divisor;
    let hundredths = if remainder >= divisor - remainder {
        quotient + 1
    } else {
        quotient
    };
    Decimal::from_i128_with_scale(hundredths as i128, PERCENT_DECIMALS)
}

/// Fetches reserve rates for a list of assets
///
/// Each asset is requested independently and concurrently. Failures are
/// recorded against the asset's own row; the pass never aborts early and
/// never retries.
pub struct RateFetcher {
    client: Arc<dyn ChainClient>,
    request_timeout: Duration,
    metrics: Arc<MetricsCollector>,
}

impl RateFetcher {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        let metrics = Arc::new(MetricsCollector::new(client.client_name()));
        Self {
            client,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            metrics,
        }
    }

    /// Overrides the per-call timeout
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn client_name(&self) -> &'static str {
        self.client.client_name()
    }

    /// Runs one pass
    ///
    /// # Returns
    /// One result per input asset, in input order
    pub async fn fetch(&self, assets: &[Asset]) -> Vec<RateResult> {
        let results = join_all(assets.iter().map(|asset| self.fetch_one(asset))).await;
        self.metrics.record_pass().await;
        results
    }

    /// Latency and success metrics of reserve calls so far
    pub async fn metrics(&self) -> FetchMetrics {
        self.metrics.get_metrics().await
    }

    async fn fetch_one(&self, asset: &Asset) -> RateResult {
        let start = Instant::now();
        match self.read_rate(asset).await {
            Ok(reading) => {
                self.metrics.record_call(start.elapsed(), true).await;
                tracing::trace!(
                    asset = %asset.symbol,
                    rate_percent = %reading.rate_percent,
                    "Fetched reserve rate"
                );
                RateResult::success(asset.clone(), reading)
            }
            Err(e) => {
                let failure = RateFailure::from(&e);
                // no remote call was made for a bad address
                if failure.kind != RateErrorKind::InvalidAssetAddress {
                    self.metrics.record_call(start.elapsed(), false).await;
                }
                tracing::warn!(
                    asset = %asset.symbol,
                    kind = %failure.kind,
                    error = %e,
                    "Failed to fetch reserve data"
                );
                RateResult::failure(asset.clone(), failure)
            }
        }
    }

    async fn read_rate(&self, asset: &Asset) -> Result<RateReading, ChainError> {
        let address = asset.address()?;

        let reserve = tokio::time::timeout(
            self.request_timeout,
            self.client.get_reserve_data(&address),
        )
        .await
        .map_err(|_| ChainError::Timeout)??;

        if reserve.a_token_address.is_zero() {
            return Err(ChainError::ReserveNotFound(asset.symbol.clone()));
        }

        Ok(RateReading {
            rate_percent: normalize_rate(reserve.variable_borrow_rate),
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockChainClient, MockResponse};
    use crate::registry::AssetRegistry;
    use std::str::FromStr;

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const DAI: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";
    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn stablecoins() -> Vec<Asset> {
        vec![
            Asset::new(USDC, "USDC", 6),
            Asset::new(DAI, "DAI", 18),
            Asset::new(USDT, "USDT", 6),
        ]
    }

    #[test]
    fn test_normalize_rate() {
        assert_eq!(normalize_rate(30_000_000_000_000_000_000_000_000), dec("3.00"));
        assert_eq!(normalize_rate(10_000_000_000_000_000_000_000_000), dec("1.00"));
        assert_eq!(normalize_rate(0), dec("0.00"));
        assert_eq!(normalize_rate(10u128.pow(27)).to_string(), "100.00");
        assert_eq!(normalize_rate(30_000_000_000_000_000_000_000_000).to_string(), "3.00");
    }

    #[test]
    fn test_normalize_rounds_half_up() {
        // 0.015% -> 0.02, 0.0149..% -> 0.01
        assert_eq!(normalize_rate(150_000_000_000_000_000_000_000), dec("0.02"));
        assert_eq!(normalize_rate(149_999_999_999_999_999_999_999), dec("0.01"));
        // 4.2349% and 4.235%
        assert_eq!(normalize_rate(42_349_000_000_000_000_000_000_000), dec("4.23"));
        assert_eq!(normalize_rate(42_350_000_000_000_000_000_000_000), dec("4.24"));
    }

    #[test]
    fn test_normalize_handles_full_range() {
        let max = normalize_rate(u128::MAX);
        assert!(max > dec("1000000000000"));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_every_row_in_order() {
        let client = Arc::new(MockChainClient::new());
        client.set_rate(USDC, 10_000_000_000_000_000_000_000_000);
        client.set_response(DAI, MockResponse::Rpc("connection reset".into()));
        client.set_rate(USDT, 45_678_000_000_000_000_000_000_000);

        let fetcher = RateFetcher::new(client.clone());
        let results = fetcher.fetch(&stablecoins()).await;

        assert_eq!(results.len(), 3);
        let symbols: Vec<_> = results.iter().map(|r| r.asset.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["USDC", "DAI", "USDT"]);

        assert_eq!(results[0].rate_percent(), Some(dec("1.00")));
        assert_eq!(results[1].error_kind(), Some(RateErrorKind::RemoteCallFailure));
        assert_eq!(results[2].rate_percent(), Some(dec("4.57")));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_error_kinds_per_asset() {
        let client = Arc::new(MockChainClient::new());
        client.set_response(USDC, MockResponse::Missing);
        client.set_response(DAI, MockResponse::Malformed("short return data".into()));

        let assets = vec![
            Asset::new(USDC, "USDC", 6),
            Asset::new(DAI, "DAI", 18),
            Asset::new("0xnot-an-address", "BAD", 18),
        ];
        let fetcher = RateFetcher::new(client.clone());
        let results = fetcher.fetch(&assets).await;

        assert_eq!(results[0].error_kind(), Some(RateErrorKind::MalformedResponse));
        assert_eq!(results[1].error_kind(), Some(RateErrorKind::MalformedResponse));
        assert_eq!(results[2].error_kind(), Some(RateErrorKind::InvalidAssetAddress));
        // the bad address never reaches the client
        assert_eq!(client.call_count(), 2);

        let metrics = fetcher.metrics().await;
        assert_eq!(metrics.total_calls, 2);
        assert_eq!(metrics.failed_calls, 2);
        assert_eq!(metrics.passes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out_without_blocking_others() {
        let client = Arc::new(MockChainClient::new());
        client.set_rate(USDC, 20_000_000_000_000_000_000_000_000);
        client.set_response(DAI, MockResponse::Hang);
        client.set_rate(USDT, 20_000_000_000_000_000_000_000_000);

        let fetcher = RateFetcher::new(client).with_timeout(Duration::from_secs(2));
        let results = fetcher.fetch(&stablecoins()).await;

        assert!(results[0].is_ok());
        assert_eq!(results[1].error_kind(), Some(RateErrorKind::RemoteCallFailure));
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_empty_asset_list() {
        let fetcher = RateFetcher::new(Arc::new(MockChainClient::new()));
        assert!(fetcher.fetch(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_default_registry_all_failing_still_full_length() {
        let registry = AssetRegistry::aave_v3_mainnet();
        let fetcher = RateFetcher::new(Arc::new(MockChainClient::new()));
        let results = fetcher.fetch(registry.assets()).await;

        assert_eq!(results.len(), registry.len());
        assert!(results.iter().all(|r| !r.is_ok()));
        for (result, asset) in results.iter().zip(registry.iter()) {
            assert_eq!(&result.asset, asset);
        }
    }
}
