//! Protocol constants. All monetary values in satoshis (1 BSV = 10^8 satoshis).

pub const SATOSHIS_PER_BSV: u64 = 100_000_000;

/// Transaction version emitted by the builder.
pub const TX_VERSION: u32 = 1;

/// Lock time emitted by the builder (no absolute timelock).
pub const TX_LOCK_TIME: u32 = 0;

/// Input sequence meaning "final": no relative-timelock semantics.
pub const FINAL_SEQUENCE: u32 = 0xFFFF_FFFF;

/// `SIGHASH_ALL | SIGHASH_FORKID`, the only signature hash type produced.
pub const SIGHASH_ALL_FORKID: u32 = 0x41;

/// Base58Check version byte of mainnet P2PKH addresses.
pub const MAINNET_P2PKH_VERSION: u8 = 0x00;

/// Base58Check version byte of testnet P2PKH addresses.
pub const TESTNET_P2PKH_VERSION: u8 = 0x6f;

/// WIF version byte for mainnet keys.
pub const MAINNET_WIF_VERSION: u8 = 0x80;

/// WIF version byte for testnet keys.
pub const TESTNET_WIF_VERSION: u8 = 0xef;

/// Upper bound accepted when parsing a transaction. Parent transactions
/// fetched from an indexer larger than this are rejected.
pub const MAX_TX_SIZE: usize = 10 * 1024 * 1024;
