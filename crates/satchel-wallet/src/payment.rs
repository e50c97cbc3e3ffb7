//! The payment pipeline: wallet record in, x402 envelope out.
//!
//! A [`PaymentContext`] bundles the record store, a chain source and the
//! default fee rate for one network. It is built once and shared; it holds
//! no secrets. Passphrases arrive with each call and decrypted keys live
//! only for the duration of that call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroizing;

use satchel_chain::{BroadcastOutcome, BroadcastResult, ChainSource};
use satchel_core::address::{Address, Network};
use satchel_core::crypto::{SigningKey, WifKey};
use satchel_core::transaction::Transaction;
use satchel_proof::Accessibility;

use crate::builder::{TransactionBuilder, fetch_parent_transactions};
use crate::coin_selection::{check_fee_rate, select_outputs};
use crate::encryption;
use crate::error::WalletError;
use crate::history::{HistoryEntry, HistoryStatus};
use crate::store::{WalletRecord, WalletStore, WalletSummary};

/// A validated request to pay `amount` satoshis from a stored wallet.
#[derive(Clone)]
pub struct PaymentRequest {
    wallet_id: String,
    passphrase: Zeroizing<String>,
    destination: Address,
    amount: u64,
    change_address: Option<Address>,
    fee_rate: Option<f64>,
    accessibility: Option<Accessibility>,
}

impl PaymentRequest {
    pub fn new(
        wallet_id: &str,
        passphrase: Zeroizing<String>,
        destination: &str,
        amount: u64,
    ) -> Result<Self, WalletError> {
        if wallet_id.trim().is_empty() {
            return Err(WalletError::Validation("wallet id must not be empty".into()));
        }
        if passphrase.is_empty() {
            return Err(WalletError::Validation("passphrase must not be empty".into()));
        }
        if amount == 0 {
            return Err(WalletError::Validation("amount must be greater than zero".into()));
        }
        let destination: Address = destination.trim().parse()?;
        Ok(Self {
            wallet_id: wallet_id.trim().to_string(),
            passphrase,
            destination,
            amount,
            change_address: None,
            fee_rate: None,
            accessibility: None,
        })
    }

    pub fn with_change_address(mut self, address: &str) -> Result<Self, WalletError> {
        self.change_address = Some(address.trim().parse()?);
        Ok(self)
    }

    /// Override the context's fee rate for this payment.
    pub fn with_fee_rate(mut self, fee_rate: f64) -> Result<Self, WalletError> {
        check_fee_rate(fee_rate)?;
        self.fee_rate = Some(fee_rate);
        Ok(self)
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = Some(accessibility);
        self
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }
}

impl std::fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentRequest")
            .field("wallet_id", &self.wallet_id)
            .field("passphrase", &"<redacted>")
            .field("destination", &self.destination.to_string())
            .field("amount", &self.amount)
            .field("change_address", &self.change_address.as_ref().map(|a| a.to_string()))
            .field("fee_rate", &self.fee_rate)
            .finish()
    }
}

/// A signed payment and the envelope carrying it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    /// Base64 x402 envelope for the facilitator.
    pub envelope: String,
    pub txid: String,
    pub tx_hex: String,
    pub network: Network,
    pub destination: String,
    pub amount: u64,
    pub fee: u64,
    pub change: u64,
    pub size: usize,
    pub input_count: usize,
    pub output_count: usize,
}

/// User-facing outcome of a payment attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<PaymentProof>,
}

impl PaymentResult {
    pub fn from_outcome(outcome: Result<PaymentProof, WalletError>) -> Self {
        match outcome {
            Ok(proof) => Self {
                success: true,
                message: format!(
                    "payment of {} sats to {} signed (txid {}, fee {} sats)",
                    proof.amount, proof.destination, proof.txid, proof.fee
                ),
                proof: Some(proof),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                proof: None,
            },
        }
    }
}

/// Spendable balance of a wallet as the indexer reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub utxo_count: usize,
}

impl WalletBalance {
    pub fn total(&self) -> u64 {
        self.confirmed.saturating_add(self.unconfirmed)
    }
}

/// Store, chain and fee rate for one network.
#[derive(Clone)]
pub struct PaymentContext {
    store: Arc<WalletStore>,
    chain: Arc<dyn ChainSource>,
    fee_rate: f64,
    network: Network,
}

impl PaymentContext {
    /// The context's network is the chain source's network.
    pub fn new(
        store: Arc<WalletStore>,
        chain: Arc<dyn ChainSource>,
        fee_rate: f64,
    ) -> Result<Self, WalletError> {
        check_fee_rate(fee_rate)?;
        let network = chain.network();
        Ok(Self {
            store,
            chain,
            fee_rate,
            network,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }

    pub fn chain(&self) -> &dyn ChainSource {
        self.chain.as_ref()
    }

    /// Generate a fresh key, seal it and save a new wallet.
    pub async fn create_wallet(
        &self,
        name: &str,
        passphrase: Zeroizing<String>,
    ) -> Result<WalletSummary, WalletError> {
        let key = WifKey::generate(self.network);
        self.save_new(name, &key, passphrase).await
    }

    /// Seal an existing WIF key and save it as a new wallet.
    pub async fn import_wallet(
        &self,
        name: &str,
        wif: Zeroizing<String>,
        passphrase: Zeroizing<String>,
    ) -> Result<WalletSummary, WalletError> {
        let key = WifKey::from_wif(&wif)?;
        if key.network() != self.network {
            return Err(WalletError::Validation(format!(
                "key is for {}, context is on {}",
                key.network(),
                self.network
            )));
        }
        self.save_new(name, &key, passphrase).await
    }

    async fn save_new(
        &self,
        name: &str,
        key: &WifKey,
        passphrase: Zeroizing<String>,
    ) -> Result<WalletSummary, WalletError> {
        if name.trim().is_empty() {
            return Err(WalletError::Validation("wallet name must not be empty".into()));
        }
        let encrypted = encryption::encrypt_blocking(key.to_portable(), passphrase).await?;
        let record = WalletRecord::new(name, key.address(), encrypted)?;
        self.store.save(&record)?;
        Ok(record.summary())
    }

    /// Re-encrypt a wallet under a new passphrase on a blocking worker.
    pub async fn rotate_passphrase(
        &self,
        wallet_id: &str,
        old: Zeroizing<String>,
        new: Zeroizing<String>,
    ) -> Result<(), WalletError> {
        let store = Arc::clone(&self.store);
        let id = wallet_id.to_string();
        tokio::task::spawn_blocking(move || store.rotate_passphrase(&id, &old, &new))
            .await
            .map_err(|e| WalletError::Task(e.to_string()))?
    }

    pub async fn balance(&self, wallet_id: &str) -> Result<WalletBalance, WalletError> {
        let record = self.load_on_network(wallet_id)?;
        let utxos = self.chain.get_spendable_outputs(&record.address).await?;
        let mut balance = WalletBalance {
            utxo_count: utxos.len(),
            ..WalletBalance::default()
        };
        for utxo in &utxos {
            let bucket = if utxo.is_confirmed() {
                &mut balance.confirmed
            } else {
                &mut balance.unconfirmed
            };
            *bucket = bucket.saturating_add(utxo.value);
        }
        Ok(balance)
    }

    /// Build, sign and wrap a payment. Nothing is broadcast.
    pub async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentProof, WalletError> {
        let record = self.load_on_network(&request.wallet_id)?;
        let fee_rate = request.fee_rate.unwrap_or(self.fee_rate);

        let mut builder = TransactionBuilder::new(self.network);
        builder
            .set_destination(request.destination.clone(), request.amount)
            .set_fee_rate(fee_rate);
        if let Some(change) = &request.change_address {
            builder.set_change_address(change.clone());
        }

        let available = self.chain.get_spendable_outputs(&record.address).await?;
        // Select first so only the parents that will be spent are fetched.
        let selection = select_outputs(&available, request.amount, fee_rate)?;
        let with_parents = fetch_parent_transactions(&selection.selected, self.chain.as_ref()).await?;

        // The key exists only between unlock and signing; no remote call in between.
        let key = record.unlock_blocking(request.passphrase.clone()).await?;
        let signed = builder.build(&key, &with_parents);
        drop(key);
        let signed = signed?;

        let envelope =
            satchel_proof::encode(&signed.hex, self.network, request.accessibility.clone())?;

        let proof = PaymentProof {
            envelope,
            txid: signed.txid.to_string(),
            tx_hex: signed.hex,
            network: self.network,
            destination: request.destination.to_string(),
            amount: signed.amount,
            fee: signed.fee,
            change: signed.change,
            size: signed.size,
            input_count: signed.input_count,
            output_count: signed.output_count,
        };

        let entry = HistoryEntry::built(
            proof.txid.clone(),
            proof.amount,
            proof.fee,
            proof.destination.clone(),
        );
        if let Err(e) = self.store.record_history(&record.id, entry) {
            warn!(wallet = %record.id, txid = %proof.txid, error = %e, "failed to record payment history");
        }

        info!(
            wallet = %record.id,
            txid = %proof.txid,
            amount = proof.amount,
            fee = proof.fee,
            "payment proof created"
        );
        Ok(proof)
    }

    /// [`create_payment`](Self::create_payment) folded into a structured result.
    pub async fn pay(&self, request: &PaymentRequest) -> PaymentResult {
        PaymentResult::from_outcome(self.create_payment(request).await)
    }

    /// Broadcast a signed transaction and note the outcome in the wallet's
    /// history.
    pub async fn broadcast(
        &self,
        wallet_id: &str,
        tx_hex: &str,
    ) -> Result<BroadcastResult, WalletError> {
        let tx = Transaction::from_hex(tx_hex)?;
        let txid = tx.txid().to_string();
        let result = self.chain.broadcast(tx_hex).await?;

        let status = match result.outcome {
            BroadcastOutcome::Accepted => Some(HistoryStatus::Broadcast),
            BroadcastOutcome::AlreadyBroadcast => Some(HistoryStatus::AlreadyBroadcast),
            BroadcastOutcome::StaleInputs => None,
        };
        match status {
            Some(status) => {
                info!(wallet = %wallet_id, txid = %txid, outcome = ?result.outcome, "broadcast settled");
                if let Err(e) = self.store.set_history_status(wallet_id, &txid, status) {
                    warn!(wallet = %wallet_id, txid = %txid, error = %e, "failed to update payment history");
                }
            }
            None => warn!(wallet = %wallet_id, txid = %txid, "broadcast rejected: inputs are stale"),
        }
        Ok(result)
    }

    fn load_on_network(&self, wallet_id: &str) -> Result<WalletRecord, WalletError> {
        let record = self.store.load(wallet_id)?;
        if record.network != self.network {
            return Err(WalletError::Validation(format!(
                "wallet {} is on {}, context is on {}",
                record.id, record.network, self.network
            )));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin_selection::estimate_fee;
    use crate::test_support::MemoryChain;
    use satchel_core::crypto::verify_p2pkh_input;

    const PASS: &str = "test-password-123";

    struct Fixture {
        _tmp: tempfile::TempDir,
        chain: Arc<MemoryChain>,
        ctx: PaymentContext,
    }

    fn fixture(network: Network) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(WalletStore::open(tmp.path().join("wallets")).unwrap());
        let chain = Arc::new(MemoryChain::new(network));
        let ctx = PaymentContext::new(store, chain.clone(), 0.5).unwrap();
        Fixture {
            _tmp: tmp,
            chain,
            ctx,
        }
    }

    fn pass(p: &str) -> Zeroizing<String> {
        Zeroizing::new(p.to_string())
    }

    fn payee(network: Network) -> String {
        Address::from_pubkey_hash([0x42; 20], network).to_string()
    }

    #[tokio::test]
    async fn pays_with_largest_output() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.chain.fund(&wallet.address, &[50_000, 30_000, 20_000]);

        let request =
            PaymentRequest::new(&wallet.id, pass(PASS), &payee(Network::Testnet), 40_000).unwrap();
        let proof = f.ctx.create_payment(&request).await.unwrap();

        assert_eq!(proof.input_count, 1);
        assert_eq!(proof.fee, estimate_fee(1, 2, 0.5));
        assert_eq!(proof.change, 50_000 - 40_000 - proof.fee);
        assert_eq!(satchel_proof::extract_transaction(&proof.envelope).unwrap(), proof.tx_hex);
        let envelope = satchel_proof::decode(&proof.envelope).unwrap();
        assert_eq!(envelope.network, "bsv-testnet");

        let tx = Transaction::from_hex(&proof.tx_hex).unwrap();
        verify_p2pkh_input(&tx, 0, &wallet.address.script_pubkey(), 50_000).unwrap();

        let history = f.ctx.store().history(&wallet.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].txid, proof.txid);
        assert_eq!(history[0].status, HistoryStatus::Built);
        assert!(f.chain.broadcasts.lock().is_empty());
    }

    #[tokio::test]
    async fn unwritable_history_does_not_fail_payment() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.chain.fund(&wallet.address, &[50_000]);
        let history_file = f.ctx.store().dir().join(format!("{}.history.json", wallet.id));
        std::fs::write(&history_file, b"{not a list").unwrap();

        let request =
            PaymentRequest::new(&wallet.id, pass(PASS), &payee(Network::Testnet), 1_000).unwrap();
        let proof = f.ctx.create_payment(&request).await.unwrap();
        assert_eq!(proof.amount, 1_000);

        // The log is left as it was; the broadcast path tolerates it too.
        assert_eq!(std::fs::read(&history_file).unwrap(), b"{not a list");
        let result = f.ctx.broadcast(&wallet.id, &proof.tx_hex).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn wrong_passphrase_fails_cleanly() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.chain.fund(&wallet.address, &[50_000]);

        let request =
            PaymentRequest::new(&wallet.id, pass("wrong-password"), &payee(Network::Testnet), 1_000)
                .unwrap();
        let result = f.ctx.pay(&request).await;
        assert!(!result.success);
        assert!(result.proof.is_none());
        assert!(result.message.contains("authentication failed"));
        assert!(!result.message.contains("wrong-password"));
        assert!(f.ctx.store().history(&wallet.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn insufficient_funds_result() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.chain.fund(&wallet.address, &[1_000]);

        let request =
            PaymentRequest::new(&wallet.id, pass(PASS), &payee(Network::Testnet), 5_000).unwrap();
        let err = f.ctx.create_payment(&request).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { available: 1_000, .. }));
    }

    #[tokio::test]
    async fn cross_network_destination_rejected() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.chain.fund(&wallet.address, &[50_000]);

        let request =
            PaymentRequest::new(&wallet.id, pass(PASS), &payee(Network::Mainnet), 1_000).unwrap();
        let err = f.ctx.create_payment(&request).await.unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[tokio::test]
    async fn import_checks_network_and_derives_address() {
        let f = fixture(Network::Mainnet);
        let wif = "L1aW4aubDFB7yfras2S1mN3bqg9nwySY8nkoLmJebSLD5BWv3ENZ";
        let expected = WifKey::from_wif(wif).unwrap().address();

        let summary = f.ctx.import_wallet("imported", pass(wif), pass(PASS)).await.unwrap();
        assert_eq!(summary.address, expected);
        assert_eq!(summary.network, Network::Mainnet);

        let testnet_key = WifKey::generate(Network::Testnet);
        let err = f
            .ctx
            .import_wallet("t", testnet_key.to_wif(), pass(PASS))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[tokio::test]
    async fn broadcast_updates_history() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.chain.fund(&wallet.address, &[50_000]);
        let request =
            PaymentRequest::new(&wallet.id, pass(PASS), &payee(Network::Testnet), 1_000).unwrap();
        let proof = f.ctx.create_payment(&request).await.unwrap();

        let result = f.ctx.broadcast(&wallet.id, &proof.tx_hex).await.unwrap();
        assert!(result.success);
        assert_eq!(result.txid.as_deref(), Some(proof.txid.as_str()));
        assert_eq!(
            f.ctx.store().history(&wallet.id).unwrap()[0].status,
            HistoryStatus::Broadcast
        );

        *f.chain.broadcast_reply.lock() = Some(BroadcastResult::already_broadcast(None));
        let again = f.ctx.broadcast(&wallet.id, &proof.tx_hex).await.unwrap();
        assert!(!again.success);
        assert!(again.is_on_network());
        assert_eq!(
            f.ctx.store().history(&wallet.id).unwrap()[0].status,
            HistoryStatus::AlreadyBroadcast
        );
    }

    #[tokio::test]
    async fn balance_splits_confirmation() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.chain.fund(&wallet.address, &[4_000, 6_000]);

        let balance = f.ctx.balance(&wallet.id).await.unwrap();
        assert_eq!(balance.confirmed, 10_000);
        assert_eq!(balance.unconfirmed, 0);
        assert_eq!(balance.total(), 10_000);
        assert_eq!(balance.utxo_count, 2);
    }

    #[tokio::test]
    async fn rotate_through_context() {
        let f = fixture(Network::Testnet);
        let wallet = f.ctx.create_wallet("agent", pass(PASS)).await.unwrap();
        f.ctx
            .rotate_passphrase(&wallet.id, pass(PASS), pass("fresh"))
            .await
            .unwrap();
        let record = f.ctx.store().load(&wallet.id).unwrap();
        assert_eq!(record.unlock("fresh").unwrap().address(), wallet.address);
    }

    #[test]
    fn request_validation() {
        let to = payee(Network::Mainnet);
        assert!(PaymentRequest::new("", pass(PASS), &to, 1).is_err());
        assert!(PaymentRequest::new("id", pass(""), &to, 1).is_err());
        assert!(PaymentRequest::new("id", pass(PASS), &to, 0).is_err());
        assert!(matches!(
            PaymentRequest::new("id", pass(PASS), "nonsense", 1),
            Err(WalletError::Address(_))
        ));
        let ok = PaymentRequest::new("id", pass(PASS), &to, 1).unwrap();
        assert!(ok.clone().with_fee_rate(-0.1).is_err());
        assert!(ok.with_fee_rate(0.0).is_ok());
    }

    #[test]
    fn request_debug_redacts_passphrase() {
        let req = PaymentRequest::new("id", pass("hunter2"), &payee(Network::Mainnet), 1).unwrap();
        let dbg = format!("{req:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
