//! Chain-facing value types shared by the client and the builder.
//!
//! All monetary values are in satoshis.

use serde::{Deserialize, Serialize};

use crate::transaction::{OutPoint, Txid};

/// A spendable output reported by the indexer.
///
/// Ephemeral: it reflects the indexer's view at query time and is never
/// persisted as truth.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
    /// Block height; `None` while unconfirmed.
    pub height: Option<u64>,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}
