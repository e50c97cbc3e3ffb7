//! # satchel-wallet
//! Wallet side of Satchel: at-rest protection of signing keys, durable
//! wallet records, largest-first coin selection, P2PKH transaction building
//! and the payment pipeline that turns a request into an x402 envelope.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`encryption`]: scrypt + AES-256-GCM credential vault
//! - [`store`]: owner-only wallet record files
//! - [`history`]: best-effort local transaction log
//! - [`coin_selection`]: size model, fee estimate, largest-first selection
//! - [`builder`]: parent fetching, transaction assembly and signing
//! - [`payment`]: `PaymentContext` pipeline
//! - [`config`]: environment-driven configuration

pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod encryption;
pub mod error;
pub mod history;
pub mod payment;
pub mod store;

#[cfg(test)]
mod test_support;

pub use builder::{SignedTransaction, TransactionBuilder, UtxoWithParent, fetch_parent_transactions};
pub use coin_selection::{CoinSelection, SizeModel, estimate_fee, select_outputs};
pub use config::SatchelConfig;
pub use encryption::{EncryptedSecret, decrypt, encrypt};
pub use error::WalletError;
pub use history::{HistoryEntry, HistoryStatus};
pub use payment::{PaymentContext, PaymentProof, PaymentRequest, PaymentResult, WalletBalance};
pub use store::{WalletRecord, WalletStore, WalletSummary};
