//! # satchel-core
//! Foundation types for Satchel: networks, P2PKH addresses and scripts,
//! transaction serialization with FORKID signature hashing, and the signing
//! key capability used by the transaction builder.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod script;
pub mod transaction;
pub mod types;
