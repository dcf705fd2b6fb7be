//! Chain client abstraction supplied by the caller
//!
//! The pipeline never talks to a node directly. Whatever owns the RPC
//! transport and the pool ABI implements `ChainClient` and is passed in.

use crate::{address::Address, error::ChainError, types::RawReserveData};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of new block numbers
///
/// Dropping the stream ends the subscription.
pub type BlockStream = BoxStream<'static, Result<u64, ChainError>>;

/// Trait for chain clients
///
/// Implementations wrap a node connection and the lending pool contract.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Reads the reserve record for one asset from the lending pool
    ///
    /// # Arguments
    /// * `asset` - Token contract address of the reserve
    ///
    /// # Returns
    /// Raw reserve data or an error if the call fails
    async fn get_reserve_data(&self, asset: &Address) -> Result<RawReserveData, ChainError>;

    /// Subscribes to new block notifications
    ///
    /// Items arrive in block order. Transport hiccups may be surfaced as
    /// `Err` items; the end of the stream means the subscription is gone.
    async fn subscribe_blocks(&self) -> Result<BlockStream, ChainError>;

    /// Returns the name of this client
    fn client_name(&self) -> &'static str {
        "chain"
    }
}
