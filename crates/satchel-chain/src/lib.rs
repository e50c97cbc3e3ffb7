//! # satchel-chain
//! Chain data client: spendable outputs, parent transactions, chain height,
//! address history, transaction details and broadcast against a
//! WhatsOnChain-compatible indexer.
//!
//! HTTP goes through the [`transport::Transport`] seam so the retry and
//! classification policy can be exercised without a network.

pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod traits;
pub mod transport;
pub mod types;

pub use broadcast::{BroadcastOutcome, BroadcastResult};
pub use client::ChainClient;
pub use config::ChainConfig;
pub use error::ChainError;
pub use retry::RetryPolicy;
pub use traits::ChainSource;
