//! Cross-crate test suite for Satchel.
//!
//! Scenarios drive the real [`ChainClient`](satchel_chain::ChainClient)
//! against an in-memory indexer that speaks the WhatsOnChain REST shapes,
//! so JSON parsing, retry and broadcast classification are exercised
//! together with the wallet pipeline.

pub mod helpers;
