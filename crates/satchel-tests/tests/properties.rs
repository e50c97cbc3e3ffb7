//! Property tests for fee estimation, coin selection and transaction
//! building.
//!
//! Invariants:
//! - Fees follow `ceil((10 + 148 * inputs + 34 * outputs) * rate)`
//! - A selection always covers target plus the fee for its own shape
//! - Selection spends the largest outputs first and stops as soon as it can
//! - Built transactions conserve value and every input signature verifies

use proptest::prelude::*;
use satchel_core::address::Network;
use satchel_core::crypto::{SigningKey, WifKey, verify_p2pkh_input};
use satchel_core::transaction::Txid;
use satchel_core::types::Utxo;
use satchel_tests::helpers::{outputs_with_parent, payee};
use satchel_wallet::{TransactionBuilder, WalletError, estimate_fee, select_outputs};

fn utxos(values: &[u64]) -> Vec<Utxo> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| Utxo {
            txid: Txid([i as u8; 32]),
            vout: i as u32,
            value,
            height: Some(1),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fee_matches_size_formula(
        inputs in 0usize..200,
        outputs in 0usize..50,
        rate in 0.0f64..10.0,
    ) {
        let size = 10 + 148 * inputs as u64 + 34 * outputs as u64;
        let fee = estimate_fee(inputs, outputs, rate);
        prop_assert_eq!(fee, (size as f64 * rate).ceil() as u64);
        prop_assert!(fee as f64 >= size as f64 * rate);
    }

    #[test]
    fn fee_grows_with_shape(inputs in 1usize..100, outputs in 1usize..10, rate in 0.1f64..5.0) {
        prop_assert!(estimate_fee(inputs + 1, outputs, rate) >= estimate_fee(inputs, outputs, rate));
        prop_assert!(estimate_fee(inputs, outputs + 1, rate) >= estimate_fee(inputs, outputs, rate));
    }

    #[test]
    fn selection_covers_target_and_fee(
        values in prop::collection::vec(1u64..5_000_000, 0..20),
        target in 1u64..10_000_000,
        rate in 0.0f64..5.0,
    ) {
        let available = utxos(&values);
        let total_available: u64 = values.iter().sum();

        match select_outputs(&available, target, rate) {
            Ok(sel) => {
                let n = sel.selected.len();
                prop_assert!(n >= 1);
                prop_assert_eq!(sel.fee, estimate_fee(n, 2, rate));
                prop_assert_eq!(sel.total_value, sel.selected.iter().map(|u| u.value).sum::<u64>());
                prop_assert!(sel.total_value >= target + sel.fee);
                prop_assert_eq!(sel.change, sel.total_value - target - sel.fee);

                // Largest first.
                prop_assert!(sel.selected.windows(2).all(|w| w[0].value >= w[1].value));
                let mut sorted = values.clone();
                sorted.sort_unstable_by(|a, b| b.cmp(a));
                let picked: Vec<u64> = sel.selected.iter().map(|u| u.value).collect();
                prop_assert_eq!(&picked[..], &sorted[..n]);

                // Stops at the first prefix that covers.
                if n > 1 {
                    let short: u64 = picked[..n - 1].iter().sum();
                    prop_assert!(short < target + estimate_fee(n - 1, 2, rate));
                }
            }
            Err(WalletError::InsufficientFunds { required, available, shortfall }) => {
                prop_assert_eq!(available, total_available);
                prop_assert_eq!(required, target + estimate_fee(values.len().max(1), 2, rate));
                prop_assert!(available < required);
                prop_assert_eq!(shortfall, required - available);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}

proptest! {
    // Each case signs every input; keep the count modest.
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn built_transaction_conserves_value(
        seed in 1u8..=254,
        values in prop::collection::vec(1_000u64..1_000_000, 1..6),
        amount in 1u64..2_000_000,
        rate in 0.0f64..2.0,
    ) {
        let key = WifKey::from_secret_bytes(&[seed; 32], Network::Testnet).unwrap();
        let owner = key.address();
        let outputs = outputs_with_parent(&owner, &values, seed);

        let mut builder = TransactionBuilder::new(Network::Testnet);
        builder
            .set_destination(payee(0xAB, Network::Testnet), amount)
            .set_fee_rate(rate);

        match builder.build(&key, &outputs) {
            Ok(signed) => {
                let spent: u64 = signed
                    .tx
                    .inputs
                    .iter()
                    .map(|input| {
                        outputs
                            .iter()
                            .find(|o| o.utxo.outpoint() == input.previous_output)
                            .map(|o| o.utxo.value)
                            .unwrap()
                    })
                    .sum();
                let paid = signed.tx.total_output_value().unwrap();

                prop_assert_eq!(spent, paid + signed.fee);
                prop_assert_eq!(paid, signed.amount + signed.change);
                prop_assert_eq!(signed.tx.outputs[0].value, amount);
                prop_assert_eq!(signed.output_count, if signed.change > 0 { 2 } else { 1 });
                prop_assert!(signed.fee >= estimate_fee(signed.input_count, 2, rate));
                prop_assert_eq!(signed.hex.len(), signed.size * 2);

                for (index, input) in signed.tx.inputs.iter().enumerate() {
                    prop_assert_eq!(input.sequence, 0xFFFF_FFFF);
                    let value = outputs
                        .iter()
                        .find(|o| o.utxo.outpoint() == input.previous_output)
                        .map(|o| o.utxo.value)
                        .unwrap();
                    prop_assert!(verify_p2pkh_input(&signed.tx, index, &owner.script_pubkey(), value).is_ok());
                }
            }
            Err(WalletError::InsufficientFunds { available, required, .. }) => {
                prop_assert_eq!(available, values.iter().sum::<u64>());
                prop_assert!(available < required);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
