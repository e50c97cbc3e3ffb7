//! Shared fixtures for unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use satchel_chain::{BroadcastResult, ChainError, ChainSource};
use satchel_chain::types::{HistoryItem, TransactionDetails};
use satchel_core::address::{Address, Network};
use satchel_core::transaction::{OutPoint, Transaction, TxIn, TxOut, Txid};
use satchel_core::types::Utxo;

use crate::builder::UtxoWithParent;

/// A transaction paying each of `values` to `to`. `seed` makes the txid
/// unique.
pub(crate) fn funding_parent(to: &Address, values: &[u64], seed: u8) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxIn::unsigned(OutPoint {
            txid: Txid([seed; 32]),
            vout: 0,
        })],
        outputs: values
            .iter()
            .map(|&value| TxOut {
                value,
                script_pubkey: to.script_pubkey(),
            })
            .collect(),
        lock_time: 0,
    }
}

/// One confirmed output per value, each from its own parent.
pub(crate) fn funded_outputs(to: &Address, values: &[u64]) -> Vec<UtxoWithParent> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| with_parent(to, value, i as u8))
        .collect()
}

fn with_parent(to: &Address, value: u64, seed: u8) -> UtxoWithParent {
    let parent = funding_parent(to, &[value], seed);
    UtxoWithParent {
        utxo: Utxo {
            txid: parent.txid(),
            vout: 0,
            value,
            height: Some(100),
        },
        parent_hex: parent.to_hex(),
    }
}

// --- Mock: ChainSource ---

pub(crate) struct MemoryChain {
    network: Network,
    next_seed: AtomicU8,
    utxos: Mutex<HashMap<String, Vec<Utxo>>>,
    raw: Mutex<HashMap<Txid, String>>,
    pub broadcasts: Mutex<Vec<String>>,
    pub broadcast_reply: Mutex<Option<BroadcastResult>>,
}

impl MemoryChain {
    pub(crate) fn new(network: Network) -> Self {
        Self {
            network,
            next_seed: AtomicU8::new(1),
            utxos: Mutex::new(HashMap::new()),
            raw: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
            broadcast_reply: Mutex::new(None),
        }
    }

    /// Credit `to` with one output per value and register the parents.
    pub(crate) fn fund(&self, to: &Address, values: &[u64]) -> Vec<UtxoWithParent> {
        let funded: Vec<UtxoWithParent> = values
            .iter()
            .map(|&value| with_parent(to, value, self.next_seed.fetch_add(1, Ordering::SeqCst)))
            .collect();
        let mut raw = self.raw.lock();
        let mut utxos = self.utxos.lock();
        for f in &funded {
            raw.insert(f.utxo.txid, f.parent_hex.clone());
            utxos.entry(to.to_string()).or_default().push(f.utxo.clone());
        }
        funded
    }
}

#[async_trait]
impl ChainSource for MemoryChain {
    fn network(&self) -> Network {
        self.network
    }

    async fn get_spendable_outputs(&self, address: &Address) -> Result<Vec<Utxo>, ChainError> {
        Ok(self.utxos.lock().get(&address.to_string()).cloned().unwrap_or_default())
    }

    async fn get_raw_transaction(&self, txid: &Txid) -> Result<String, ChainError> {
        self.raw
            .lock()
            .get(txid)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("transaction {txid}")))
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<BroadcastResult, ChainError> {
        self.broadcasts.lock().push(raw_hex.to_string());
        if let Some(reply) = self.broadcast_reply.lock().clone() {
            return Ok(reply);
        }
        let tx = Transaction::from_hex(raw_hex)
            .map_err(|e| ChainError::Validation(e.to_string()))?;
        Ok(BroadcastResult::accepted(tx.txid().to_string()))
    }

    async fn get_chain_height(&self) -> Result<u64, ChainError> {
        Ok(100)
    }

    async fn get_history(&self, _address: &Address) -> Result<Vec<HistoryItem>, ChainError> {
        Ok(Vec::new())
    }

    async fn get_transaction_details(&self, txid: &Txid) -> Result<TransactionDetails, ChainError> {
        Err(ChainError::NotFound(format!("transaction {txid}")))
    }
}
