//! P2PKH transaction assembly and signing.
//!
//! 1. Fetch the full raw parent of every candidate output
//!    ([`fetch_parent_transactions`]).
//! 2. Configure a [`TransactionBuilder`] with one destination and optional
//!    change address and fee rate.
//! 3. [`TransactionBuilder::build`] selects outputs, lays out the
//!    transaction, signs every input and checks each signature before
//!    returning.
//!
//! Building never touches the network; broadcasting is the caller's call.

use std::collections::HashMap;

use tracing::{debug, info};

use satchel_chain::ChainSource;
use satchel_core::address::{Address, Network};
use satchel_core::constants::{SIGHASH_ALL_FORKID, TX_LOCK_TIME, TX_VERSION};
use satchel_core::crypto::{SigningKey, verify_p2pkh_input};
use satchel_core::error::TransactionError;
use satchel_core::script::Script;
use satchel_core::transaction::{OutPoint, Transaction, TxIn, TxOut, Txid};
use satchel_core::types::Utxo;

use crate::coin_selection::{self, CoinSelection, DEFAULT_FEE_RATE};
use crate::error::WalletError;

/// A spendable output together with the raw hex of the transaction that
/// created it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoWithParent {
    pub utxo: Utxo,
    pub parent_hex: String,
}

/// Fetch the raw parent of every output, in order.
///
/// The first failure aborts the whole fetch and names the output it was
/// for.
pub async fn fetch_parent_transactions(
    outputs: &[Utxo],
    chain: &dyn ChainSource,
) -> Result<Vec<UtxoWithParent>, WalletError> {
    let mut with_parents = Vec::with_capacity(outputs.len());
    for utxo in outputs {
        let parent_hex = chain
            .get_raw_transaction(&utxo.txid)
            .await
            .map_err(|source| WalletError::ParentFetch {
                outpoint: utxo.outpoint().to_string(),
                source,
            })?;
        debug!(outpoint = %utxo.outpoint(), bytes = parent_hex.len() / 2, "fetched parent transaction");
        with_parents.push(UtxoWithParent {
            utxo: utxo.clone(),
            parent_hex,
        });
    }
    Ok(with_parents)
}

/// A fully signed transaction ready to broadcast or embed in a proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    /// Lowercase hex of the wire encoding.
    pub hex: String,
    pub txid: Txid,
    /// Serialized size in bytes.
    pub size: usize,
    pub input_count: usize,
    pub output_count: usize,
    /// Satoshis paid to the destination.
    pub amount: u64,
    /// Satoshis returned as change; zero when there is no change output.
    pub change: u64,
    /// `inputs - outputs` in satoshis.
    pub fee: u64,
}

/// Builder for a single-destination P2PKH payment.
///
/// # Example
/// ```ignore
/// let signed = TransactionBuilder::new(Network::Mainnet)
///     .set_destination(to, 40_000)
///     .set_fee_rate(0.5)
///     .build(&key, &outputs)?;
/// ```
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    network: Network,
    destination: Option<(Address, u64)>,
    change_address: Option<Address>,
    fee_rate: f64,
}

impl TransactionBuilder {
    /// A builder for `network` at [`DEFAULT_FEE_RATE`].
    pub fn new(network: Network) -> Self {
        Self {
            network,
            destination: None,
            change_address: None,
            fee_rate: DEFAULT_FEE_RATE,
        }
    }

    /// Pay `amount` satoshis to `address`. Replaces any earlier destination.
    pub fn set_destination(&mut self, address: Address, amount: u64) -> &mut Self {
        self.destination = Some((address, amount));
        self
    }

    /// Send change here instead of back to the signer's address.
    pub fn set_change_address(&mut self, address: Address) -> &mut Self {
        self.change_address = Some(address);
        self
    }

    /// Fee rate in satoshis per byte.
    pub fn set_fee_rate(&mut self, fee_rate: f64) -> &mut Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Select, assemble and sign.
    ///
    /// Every selected output must come with its parent: the parent must hash
    /// to the output's txid, carry the referenced output with the same value,
    /// and lock it to the signer's key. Either the whole transaction is
    /// returned or nothing is.
    pub fn build(
        &self,
        signer: &dyn SigningKey,
        outputs: &[UtxoWithParent],
    ) -> Result<SignedTransaction, WalletError> {
        let (destination, amount) = self
            .destination
            .as_ref()
            .ok_or_else(|| WalletError::Validation("no destination set".into()))?;
        let amount = *amount;
        if amount == 0 {
            return Err(WalletError::Validation("amount must be greater than zero".into()));
        }
        if outputs.is_empty() {
            return Err(WalletError::Validation("no spendable outputs supplied".into()));
        }
        self.check_network("destination", destination)?;
        let own_address = signer.address();
        self.check_network("signing key", &own_address)?;
        let change_address = match &self.change_address {
            Some(addr) => {
                self.check_network("change address", addr)?;
                addr.clone()
            }
            None => own_address.clone(),
        };

        let available: Vec<Utxo> = outputs.iter().map(|o| o.utxo.clone()).collect();
        let CoinSelection {
            selected,
            change,
            fee,
            ..
        } = coin_selection::select_outputs(&available, amount, self.fee_rate)?;

        let by_outpoint: HashMap<OutPoint, &UtxoWithParent> =
            outputs.iter().map(|o| (o.utxo.outpoint(), o)).collect();

        let mut spent: Vec<TxOut> = Vec::with_capacity(selected.len());
        for utxo in &selected {
            let with_parent = by_outpoint.get(&utxo.outpoint()).ok_or_else(|| {
                WalletError::Build(format!("no parent supplied for {}", utxo.outpoint()))
            })?;
            spent.push(spent_output(with_parent, &own_address)?);
        }

        let mut tx_outputs = vec![TxOut {
            value: amount,
            script_pubkey: destination.script_pubkey(),
        }];
        if change > 0 {
            tx_outputs.push(TxOut {
                value: change,
                script_pubkey: change_address.script_pubkey(),
            });
        }

        let mut tx = Transaction {
            version: TX_VERSION,
            inputs: selected.iter().map(|u| TxIn::unsigned(u.outpoint())).collect(),
            outputs: tx_outputs,
            lock_time: TX_LOCK_TIME,
        };

        sign_inputs(&mut tx, signer, &spent)?;
        for (index, prev) in spent.iter().enumerate() {
            verify_p2pkh_input(&tx, index, &prev.script_pubkey, prev.value)?;
        }

        let input_total = spent
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
            .ok_or(TransactionError::ValueOverflow)?;
        let output_total = tx.total_output_value()?;
        let actual_fee = input_total
            .checked_sub(output_total)
            .ok_or_else(|| WalletError::Build("outputs exceed inputs".into()))?;
        debug_assert_eq!(actual_fee, fee);

        let txid = tx.txid();
        let hex = tx.to_hex();
        let signed = SignedTransaction {
            txid,
            size: hex.len() / 2,
            input_count: tx.inputs.len(),
            output_count: tx.outputs.len(),
            amount,
            change,
            fee: actual_fee,
            hex,
            tx,
        };
        info!(
            txid = %signed.txid,
            inputs = signed.input_count,
            outputs = signed.output_count,
            fee = signed.fee,
            size = signed.size,
            "transaction built"
        );
        Ok(signed)
    }

    fn check_network(&self, what: &str, address: &Address) -> Result<(), WalletError> {
        if address.network() != self.network {
            return Err(WalletError::Validation(format!(
                "{what} {address} is for {}, wallet is on {}",
                address.network(),
                self.network
            )));
        }
        Ok(())
    }
}

/// The parent output a selected UTXO refers to, after checking it matches.
fn spent_output(with_parent: &UtxoWithParent, owner: &Address) -> Result<TxOut, WalletError> {
    let utxo = &with_parent.utxo;
    let parent = Transaction::from_hex(&with_parent.parent_hex)?;
    if parent.txid() != utxo.txid {
        return Err(WalletError::Build(format!(
            "parent supplied for {} hashes to {}",
            utxo.outpoint(),
            parent.txid()
        )));
    }
    let output = parent
        .outputs
        .get(utxo.vout as usize)
        .ok_or_else(|| TransactionError::MissingParentOutput {
            txid: utxo.txid.to_string(),
            vout: utxo.vout,
        })?;
    if output.value != utxo.value {
        return Err(WalletError::Build(format!(
            "{} is worth {} in its parent, indexer reported {}",
            utxo.outpoint(),
            output.value,
            utxo.value
        )));
    }
    if output.script_pubkey.p2pkh_hash().as_ref() != Some(owner.pubkey_hash()) {
        return Err(WalletError::Build(format!(
            "{} is not locked to {owner}",
            utxo.outpoint()
        )));
    }
    Ok(output.clone())
}

/// Sign every input with `SIGHASH_ALL | FORKID` over the output it spends.
fn sign_inputs(
    tx: &mut Transaction,
    signer: &dyn SigningKey,
    spent: &[TxOut],
) -> Result<(), WalletError> {
    let public_key = signer.public_key();
    for (index, prev) in spent.iter().enumerate() {
        // FORKID digests exclude unlocking scripts, so signing in place is safe.
        let digest = tx.sighash_forkid(index, &prev.script_pubkey, prev.value)?;
        let mut signature = signer.sign(&digest)?;
        signature.push(SIGHASH_ALL_FORKID as u8);
        tx.inputs[index].script_sig = Script::p2pkh_unlock(&signature, &public_key);
    }
    Ok(())
}
