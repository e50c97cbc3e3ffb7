//! WhatsOnChain-compatible REST client.
//!
//! Endpoints, relative to `{api_base}/{main|test}`:
//! - `GET  /address/{a}/unspent`
//! - `GET  /tx/{txid}/hex`
//! - `POST /tx/raw` with `{"txhex": ...}`
//! - `GET  /address/{a}/history`
//! - `GET  /chain/info`
//! - `GET  /tx/hash/{txid}`
//!
//! Every call runs under the configured [`RetryPolicy`](crate::RetryPolicy).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use satchel_core::address::{Address, Network};
use satchel_core::crypto::sha256d;
use satchel_core::transaction::Txid;
use satchel_core::types::Utxo;

use crate::broadcast::{classify_rejection, BroadcastOutcome, BroadcastResult};
use crate::config::ChainConfig;
use crate::error::ChainError;
use crate::retry::RetryPolicy;
use crate::traits::ChainSource;
use crate::transport::{HttpResponse, ReqwestTransport, Transport};
use crate::types::{HistoryItem, TransactionDetails, WocChainInfo, WocUnspent};

pub struct ChainClient<T = ReqwestTransport> {
    transport: T,
    config: ChainConfig,
    base_url: String,
}

impl ChainClient<ReqwestTransport> {
    /// Client over HTTPS with the configured timeout.
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        let transport = ReqwestTransport::new(config.http_timeout)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> ChainClient<T> {
    pub fn with_transport(transport: T, config: ChainConfig) -> Self {
        let base_url = config.base_url();
        Self {
            transport,
            config,
            base_url,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, op: &str, path: &str) -> Result<HttpResponse, ChainError> {
        let url = self.url(path);
        debug!(op, %url, "indexer GET");
        self.config
            .retry
            .run(op, || self.transport.get(&url))
            .await
    }

    /// Addresses are looked up under the client's network path only.
    fn check_network(&self, address: &Address) -> Result<(), ChainError> {
        if address.network() != self.config.network {
            return Err(ChainError::Validation(format!(
                "address {address} is for {}, client is on {}",
                address.network(),
                self.config.network
            )));
        }
        Ok(())
    }

    fn parse<D: DeserializeOwned>(resp: HttpResponse) -> Result<D, ChainError> {
        if !resp.is_success() {
            return Err(resp.into_error());
        }
        serde_json::from_str(&resp.body).map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Txid of a raw transaction, computed locally.
fn txid_of(raw_hex: &str) -> Option<String> {
    let bytes = hex::decode(raw_hex).ok()?;
    Some(Txid(sha256d(&bytes)).to_string())
}

#[async_trait]
impl<T: Transport> ChainSource for ChainClient<T> {
    fn network(&self) -> Network {
        self.config.network
    }

    async fn get_spendable_outputs(&self, address: &Address) -> Result<Vec<Utxo>, ChainError> {
        self.check_network(address)?;
        let resp = self
            .get("unspent", &format!("/address/{address}/unspent"))
            .await?;
        if resp.status == 404 {
            return Ok(Vec::new());
        }
        let raw: Vec<WocUnspent> = Self::parse(resp)?;
        debug!(%address, count = raw.len(), "fetched spendable outputs");
        Ok(raw.into_iter().map(Utxo::from).collect())
    }

    async fn get_raw_transaction(&self, txid: &Txid) -> Result<String, ChainError> {
        let resp = self.get("raw_tx", &format!("/tx/{txid}/hex")).await?;
        if resp.status == 404 {
            return Err(ChainError::NotFound(format!("transaction {txid}")));
        }
        if !resp.is_success() {
            return Err(resp.into_error());
        }
        let hex = resp.body.trim().trim_matches('"');
        if !is_hex(hex) {
            return Err(ChainError::InvalidResponse(format!(
                "transaction {txid}: body is not hex"
            )));
        }
        Ok(hex.to_string())
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<BroadcastResult, ChainError> {
        let raw_hex = raw_hex.trim();
        if !is_hex(raw_hex) {
            return Err(ChainError::Validation(
                "raw transaction must be non-empty hex".into(),
            ));
        }

        let url = self.url("/tx/raw");
        let body = json!({ "txhex": raw_hex });
        let resp = self
            .config
            .retry
            .run_with(
                "broadcast",
                || self.transport.post_json(&url, &body),
                |r| {
                    !r.is_success()
                        && classify_rejection(&r.body).is_none()
                        && RetryPolicy::is_transient_status(r.status)
                },
            )
            .await?;

        if resp.is_success() {
            let txid = resp.body.trim().trim_matches('"').to_string();
            info!(%txid, "broadcast accepted");
            return Ok(BroadcastResult::accepted(txid));
        }

        match classify_rejection(&resp.body) {
            Some(BroadcastOutcome::AlreadyBroadcast) => {
                info!(status = resp.status, "transaction already broadcast");
                Ok(BroadcastResult::already_broadcast(txid_of(raw_hex)))
            }
            Some(BroadcastOutcome::StaleInputs) => {
                warn!(status = resp.status, "broadcast rejected: stale inputs");
                Ok(BroadcastResult::stale_inputs(
                    resp.body.trim().to_string(),
                ))
            }
            Some(BroadcastOutcome::Accepted) | None => Err(resp.into_error()),
        }
    }

    async fn get_chain_height(&self) -> Result<u64, ChainError> {
        let resp = self.get("chain_info", "/chain/info").await?;
        let info: WocChainInfo = Self::parse(resp)?;
        Ok(info.blocks)
    }

    async fn get_history(&self, address: &Address) -> Result<Vec<HistoryItem>, ChainError> {
        self.check_network(address)?;
        let resp = self
            .get("history", &format!("/address/{address}/history"))
            .await?;
        if resp.status == 404 {
            return Ok(Vec::new());
        }
        Self::parse(resp)
    }

    async fn get_transaction_details(&self, txid: &Txid) -> Result<TransactionDetails, ChainError> {
        let resp = self.get("tx_details", &format!("/tx/hash/{txid}")).await?;
        if resp.status == 404 {
            return Err(ChainError::NotFound(format!("transaction {txid}")));
        }
        Self::parse(resp)
    }
}
