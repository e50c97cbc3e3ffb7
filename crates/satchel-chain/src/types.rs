//! Indexer response shapes.

use serde::{Deserialize, Serialize};

use satchel_core::transaction::Txid;
use satchel_core::types::Utxo;

/// One element of `GET /address/{a}/unspent`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct WocUnspent {
    pub tx_hash: Txid,
    pub tx_pos: u32,
    pub value: u64,
    #[serde(default)]
    pub height: u64,
}

impl From<WocUnspent> for Utxo {
    fn from(u: WocUnspent) -> Self {
        Utxo {
            txid: u.tx_hash,
            vout: u.tx_pos,
            value: u.value,
            // The indexer reports height 0 for mempool outputs.
            height: (u.height > 0).then_some(u.height),
        }
    }
}

/// `GET /chain/info`; only the height is used.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct WocChainInfo {
    pub blocks: u64,
}

/// One element of `GET /address/{a}/history`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub tx_hash: Txid,
    /// Block height; `None` or `0` while unconfirmed.
    #[serde(default)]
    pub height: Option<u64>,
}

impl HistoryItem {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.height, Some(h) if h > 0)
    }
}

/// Output as reported by `GET /tx/hash/{txid}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailOutput {
    pub n: u32,
    /// Value in BSV as reported by the indexer.
    pub value: f64,
}

/// Subset of `GET /tx/hash/{txid}` used for status display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub txid: Txid,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub blockheight: Option<u64>,
    #[serde(default)]
    pub blocktime: Option<i64>,
    #[serde(default)]
    pub vout: Vec<DetailOutput>,
}

impl TransactionDetails {
    pub fn is_confirmed(&self) -> bool {
        self.confirmations.unwrap_or(0) > 0
    }
}
