//! The chain data interface consumed by the wallet.

use async_trait::async_trait;

use satchel_core::address::{Address, Network};
use satchel_core::transaction::Txid;
use satchel_core::types::Utxo;

use crate::broadcast::BroadcastResult;
use crate::error::ChainError;
use crate::types::{HistoryItem, TransactionDetails};

/// Read and broadcast access to chain state for one network.
///
/// [`ChainClient`](crate::ChainClient) implements this against a remote
/// indexer; tests substitute an in-memory chain.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Network this source serves. Fixed for its lifetime.
    fn network(&self) -> Network;

    /// Unspent outputs paying to `address`. Empty when the address is unknown.
    async fn get_spendable_outputs(&self, address: &Address) -> Result<Vec<Utxo>, ChainError>;

    /// Raw hex of a transaction.
    async fn get_raw_transaction(&self, txid: &Txid) -> Result<String, ChainError>;

    /// Submit a signed transaction.
    ///
    /// Already-broadcast and stale-input answers are returned as structured
    /// results, not errors.
    async fn broadcast(&self, raw_hex: &str) -> Result<BroadcastResult, ChainError>;

    /// Current best block height.
    async fn get_chain_height(&self) -> Result<u64, ChainError>;

    /// Transactions touching `address`. Empty when the address is unknown.
    async fn get_history(&self, address: &Address) -> Result<Vec<HistoryItem>, ChainError>;

    /// Decoded details of a transaction.
    async fn get_transaction_details(&self, txid: &Txid) -> Result<TransactionDetails, ChainError>;

    /// Sum of confirmed and unconfirmed outputs for `address`.
    async fn get_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let utxos = self.get_spendable_outputs(address).await?;
        utxos
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.value))
            .ok_or_else(|| ChainError::InvalidResponse("balance overflow".into()))
    }
}
