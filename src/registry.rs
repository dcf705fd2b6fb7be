//! Fixed set of assets tracked for the lifetime of the process

use crate::{
    constants::MAX_ASSET_DECIMALS,
    error::RegistryError,
    types::Asset,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Immutable, ordered list of tracked assets
///
/// Cheap to clone. Order is the order rows appear in the rate cache.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: Arc<[Asset]>,
}

impl AssetRegistry {
    /// Builds a registry, rejecting duplicate ids and out-of-range decimals
    pub fn new(assets: Vec<Asset>) -> Result<Self, RegistryError> {
        if assets.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if asset.decimals > MAX_ASSET_DECIMALS {
                return Err(RegistryError::InvalidDecimals {
                    symbol: asset.symbol.clone(),
                    decimals: asset.decimals,
                });
            }
            if !seen.insert(asset.key()) {
                return Err(RegistryError::DuplicateAsset(asset.id.clone()));
            }
        }

        Ok(Self {
            assets: assets.into(),
        })
    }

    /// Aave V3 mainnet markets shown by default
    pub fn aave_v3_mainnet() -> Self {
        let assets = vec![
            Asset::new("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC", 6)
                .with_name("USD Coin")
                .with_logo("https://cryptologos.cc/logos/usd-coin-usdc-logo.png"),
            Asset::new("0x6b175474e89094c44da98b954eedeac495271d0f", "DAI", 18)
                .with_name("Dai Stablecoin")
                .with_logo("https://cryptologos.cc/logos/multi-collateral-dai-dai-logo.png"),
            Asset::new("0xdac17f958d2ee523a2206206994597c13d831ec7", "USDT", 6)
                .with_name("Tether USD")
                .with_logo("https://cryptologos.cc/logos/tether-usdt-logo.png"),
            Asset::new("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", "WETH", 18)
                .with_name("Wrapped Ether")
                .with_logo("https://cryptologos.cc/logos/ethereum-eth-logo.png"),
            Asset::new("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", "WBTC", 8)
                .with_name("Wrapped BTC")
                .with_logo("https://cryptologos.cc/logos/wrapped-bitcoin-wbtc-logo.png"),
            Asset::new("0x7fc66500c84a76ad7e9c93437bfc5ac33e2ddae9", "AAVE", 18)
                .with_name("Aave Token")
                .with_logo("https://cryptologos.cc/logos/aave-aave-logo.png"),
            Asset::new("0x514910771af9ca656af840dff83e8264ecf986ca", "LINK", 18)
                .with_name("ChainLink Token")
                .with_logo("https://cryptologos.cc/logos/chainlink-link-logo.png"),
            Asset::new("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984", "UNI", 18)
                .with_name("Uniswap")
                .with_logo("https://cryptologos.cc/logos/uniswap-uni-logo.png"),
        ];

        Self {
            assets: assets.into(),
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Looks up an asset by id (case-insensitive)
    pub fn get(&self, id: &str) -> Option<&Asset> {
        let key = id.to_ascii_lowercase();
        self.assets.iter().find(|a| a.key() == key)
    }

    /// Looks up an asset by ticker symbol
    pub fn by_symbol(&self, symbol: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::aave_v3_mainnet()
    }
}
