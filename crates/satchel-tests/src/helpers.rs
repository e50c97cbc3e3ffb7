//! Shared test helpers for scenario and property tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use zeroize::Zeroizing;

use satchel_chain::transport::{HttpResponse, Transport};
use satchel_chain::{ChainClient, ChainConfig, ChainError, RetryPolicy};
use satchel_core::address::{Address, Network};
use satchel_core::transaction::{OutPoint, Transaction, TxIn, TxOut, Txid};
use satchel_core::types::Utxo;
use satchel_wallet::{PaymentContext, UtxoWithParent, WalletStore};

/// Base URL handed to clients built by [`client`].
pub const FAKE_API_BASE: &str = "http://indexer.invalid/v1/bsv";

/// Chain height reported by [`FakeIndexer`].
pub const FAKE_HEIGHT: u64 = 850_000;

pub fn passphrase(p: &str) -> Zeroizing<String> {
    Zeroizing::new(p.to_string())
}

/// A deterministic address nobody holds the key for.
pub fn payee(seed: u8, network: Network) -> Address {
    Address::from_pubkey_hash([seed; 20], network)
}

/// A transaction paying each of `values` to `to`. `seed` makes the txid
/// unique.
pub fn funding_parent(to: &Address, values: &[u64], seed: u8) -> Transaction {
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

/// One output per value, all from a single parent.
pub fn outputs_with_parent(to: &Address, values: &[u64], seed: u8) -> Vec<UtxoWithParent> {
    let parent = funding_parent(to, values, seed);
    let parent_hex = parent.to_hex();
    let txid = parent.txid();
    values
        .iter()
        .enumerate()
        .map(|(vout, &value)| UtxoWithParent {
            utxo: Utxo {
                txid,
                vout: vout as u32,
                value,
                height: Some(FAKE_HEIGHT),
            },
            parent_hex: parent_hex.clone(),
        })
        .collect()
}

/// Retry policy with millisecond delays so failure scenarios stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

/// A chain client for `network` backed by `indexer`.
pub fn client(indexer: &FakeIndexer, network: Network) -> ChainClient<FakeIndexer> {
    let config = ChainConfig {
        api_base: FAKE_API_BASE.to_string(),
        retry: fast_retry(),
        ..ChainConfig::new(network)
    };
    ChainClient::with_transport(indexer.clone(), config)
}

/// A payment context over a fresh store in `dir` and `indexer`.
pub fn context(dir: &std::path::Path, indexer: &FakeIndexer, network: Network) -> PaymentContext {
    let store = Arc::new(WalletStore::open(dir.join("wallets")).expect("open store"));
    PaymentContext::new(store, Arc::new(client(indexer, network)), 0.5).expect("context")
}

#[derive(Default)]
struct IndexerState {
    unspent: HashMap<String, Vec<Value>>,
    raw: HashMap<String, String>,
    get_failures: VecDeque<HttpResponse>,
    broadcast_replies: VecDeque<HttpResponse>,
    requests: Vec<String>,
    broadcasts: Vec<String>,
    next_seed: u8,
}

/// In-memory indexer serving WhatsOnChain-shaped responses.
///
/// Cloning shares state, so a test can keep a handle while a client owns
/// another.
#[derive(Clone, Default)]
pub struct FakeIndexer {
    state: Arc<Mutex<IndexerState>>,
}

impl FakeIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `to` with one output per value from a new parent transaction.
    /// `confirmed = false` reports the outputs at height 0 (mempool).
    pub fn fund(&self, to: &Address, values: &[u64], confirmed: bool) -> Vec<Utxo> {
        let mut state = self.state.lock();
        state.next_seed = state.next_seed.wrapping_add(1);
        let parent = funding_parent(to, values, state.next_seed);
        let txid = parent.txid();
        state.raw.insert(txid.to_string(), parent.to_hex());

        let height = if confirmed { FAKE_HEIGHT } else { 0 };
        let entries = state.unspent.entry(to.to_string()).or_default();
        let mut utxos = Vec::with_capacity(values.len());
        for (vout, &value) in values.iter().enumerate() {
            entries.push(json!({
                "tx_hash": txid.to_string(),
                "tx_pos": vout,
                "value": value,
                "height": height,
            }));
            utxos.push(Utxo {
                txid,
                vout: vout as u32,
                value,
                height: confirmed.then_some(FAKE_HEIGHT),
            });
        }
        utxos
    }

    /// Answer the next `count` GET requests with `status`.
    pub fn fail_next_gets(&self, status: u16, count: usize) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state
                .get_failures
                .push_back(HttpResponse::new(status, "service unavailable"));
        }
    }

    /// Stop serving the raw hex of `txid`, as if the indexer pruned it.
    pub fn forget_transaction(&self, txid: &Txid) {
        self.state.lock().raw.remove(&txid.to_string());
    }

    /// Queue a response for the next broadcast.
    pub fn reply_to_broadcast(&self, status: u16, body: &str) {
        self.state
            .lock()
            .broadcast_replies
            .push_back(HttpResponse::new(status, body));
    }

    /// Raw hex bodies posted so far.
    pub fn broadcasts(&self) -> Vec<String> {
        self.state.lock().broadcasts.clone()
    }

    /// Number of GET requests whose URL ends with `suffix`.
    pub fn gets_ending_with(&self, suffix: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|u| u.ends_with(suffix))
            .count()
    }

    /// Total GET requests served, failures included.
    pub fn get_count(&self) -> usize {
        self.state.lock().requests.len()
    }
}

#[async_trait]
impl Transport for FakeIndexer {
    async fn get(&self, url: &str) -> Result<HttpResponse, ChainError> {
        let mut state = self.state.lock();
        state.requests.push(url.to_string());
        if let Some(failure) = state.get_failures.pop_front() {
            return Ok(failure);
        }

        let segments: Vec<&str> = url.split('/').collect();
        let response = match segments.as_slice() {
            [.., "address", address, "unspent"] => {
                let list = state.unspent.get(*address).cloned().unwrap_or_default();
                HttpResponse::new(200, Value::Array(list).to_string())
            }
            [.., "address", _, "history"] => HttpResponse::new(200, "[]"),
            [.., "tx", txid, "hex"] => match state.raw.get(*txid) {
                Some(hex) => HttpResponse::new(200, hex.clone()),
                None => HttpResponse::new(404, "Not Found"),
            },
            [.., "chain", "info"] => {
                HttpResponse::new(200, json!({ "chain": "main", "blocks": FAKE_HEIGHT }).to_string())
            }
            _ => HttpResponse::new(404, "Not Found"),
        };
        Ok(response)
    }

    async fn post_json(&self, _url: &str, body: &Value) -> Result<HttpResponse, ChainError> {
        let mut state = self.state.lock();
        let hex = body["txhex"].as_str().unwrap_or_default().to_string();
        state.broadcasts.push(hex.clone());
        if let Some(reply) = state.broadcast_replies.pop_front() {
            return Ok(reply);
        }
        let response = match Transaction::from_hex(&hex) {
            Ok(tx) => HttpResponse::new(200, format!("\"{}\"", tx.txid())),
            Err(e) => HttpResponse::new(400, format!("unparseable transaction: {e}")),
        };
        Ok(response)
    }
}
