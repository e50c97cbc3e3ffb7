//! Largest-first coin selection with a fixed-size fee model.
//!
//! Sizes are approximations for P2PKH: a 10-byte envelope, 148 bytes per
//! input (outpoint, sequence, DER signature, compressed key) and 34 bytes
//! per output. The fee is `ceil(size * rate)` in satoshis, `rate` in
//! satoshis per byte.
//!
//! Selection always budgets for two outputs (destination plus change), so
//! the fee it reports is an upper bound for a transaction that ends up
//! without change.

use satchel_core::types::Utxo;

use crate::error::WalletError;

/// Fixed transaction overhead: version, locktime and the two count varints.
pub const TX_OVERHEAD_BYTES: u64 = 10;

/// One P2PKH input with a compressed key.
pub const P2PKH_INPUT_BYTES: u64 = 148;

/// One P2PKH output.
pub const P2PKH_OUTPUT_BYTES: u64 = 34;

/// Fee rate used when none is configured, in satoshis per byte.
pub const DEFAULT_FEE_RATE: f64 = 0.5;

/// Outputs assumed while selecting: destination and change.
pub const SELECTION_OUTPUT_COUNT: usize = 2;

/// Per-script-type size estimates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeModel {
    pub overhead: u64,
    pub input: u64,
    pub output: u64,
}

impl SizeModel {
    pub const P2PKH: SizeModel = SizeModel {
        overhead: TX_OVERHEAD_BYTES,
        input: P2PKH_INPUT_BYTES,
        output: P2PKH_OUTPUT_BYTES,
    };

    /// Estimated serialized size in bytes.
    pub fn estimate_size(&self, inputs: usize, outputs: usize) -> u64 {
        self.overhead
            .saturating_add(self.input.saturating_mul(inputs as u64))
            .saturating_add(self.output.saturating_mul(outputs as u64))
    }

    /// `ceil(size * rate)`.
    pub fn estimate_fee(&self, inputs: usize, outputs: usize, rate: f64) -> u64 {
        (self.estimate_size(inputs, outputs) as f64 * rate).ceil() as u64
    }
}

impl Default for SizeModel {
    fn default() -> Self {
        Self::P2PKH
    }
}

/// Fee for a P2PKH transaction with the given shape.
pub fn estimate_fee(inputs: usize, outputs: usize, rate: f64) -> u64 {
    SizeModel::P2PKH.estimate_fee(inputs, outputs, rate)
}

/// Reject rates that cannot produce a meaningful fee.
pub fn check_fee_rate(rate: f64) -> Result<(), WalletError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(WalletError::Validation(format!(
            "fee rate must be a non-negative number, got {rate}"
        )));
    }
    Ok(())
}

/// Result of coin selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected outputs, largest first.
    pub selected: Vec<Utxo>,
    /// Sum of selected values.
    pub total_value: u64,
    /// `total_value - target - fee`; zero means no change output.
    pub change: u64,
    /// Fee budgeted for `selected.len()` inputs and two outputs.
    pub fee: u64,
}

/// Select outputs covering `target` plus fee, spending the largest first.
pub fn select_outputs(
    available: &[Utxo],
    target: u64,
    fee_rate: f64,
) -> Result<CoinSelection, WalletError> {
    select_outputs_with(&SizeModel::P2PKH, available, target, fee_rate)
}

/// [`select_outputs`] under an explicit size model.
pub fn select_outputs_with(
    model: &SizeModel,
    available: &[Utxo],
    target: u64,
    fee_rate: f64,
) -> Result<CoinSelection, WalletError> {
    if target == 0 {
        return Err(WalletError::Validation("amount must be greater than zero".into()));
    }
    check_fee_rate(fee_rate)?;

    let mut sorted: Vec<&Utxo> = available.iter().collect();
    // Largest value first; outpoint order keeps ties deterministic.
    sorted.sort_by(|a, b| {
        b.value
            .cmp(&a.value)
            .then_with(|| a.txid.cmp(&b.txid))
            .then_with(|| a.vout.cmp(&b.vout))
    });

    let mut selected = Vec::new();
    let mut total: u64 = 0;

    for utxo in sorted {
        selected.push(utxo.clone());
        total = total.saturating_add(utxo.value);

        let fee = model.estimate_fee(selected.len(), SELECTION_OUTPUT_COUNT, fee_rate);
        let needed = target.saturating_add(fee);
        if total >= needed {
            return Ok(CoinSelection {
                change: total - needed,
                selected,
                total_value: total,
                fee,
            });
        }
    }

    let fee_all = model.estimate_fee(available.len().max(1), SELECTION_OUTPUT_COUNT, fee_rate);
    Err(WalletError::insufficient(target.saturating_add(fee_all), total))
}
