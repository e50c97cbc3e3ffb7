//! Error types for Satchel core primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58check encoding: {0}")] InvalidEncoding(String),
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("unknown version byte: 0x{0:02x}")] UnknownVersion(u8),
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("address is for {found}, expected {expected}")] NetworkMismatch { expected: String, found: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid WIF encoding")] InvalidWif,
    #[error("invalid secret key")] InvalidSecretKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("unexpected end of data at offset {0}")] UnexpectedEof(usize),
    #[error("trailing bytes after transaction: {0}")] TrailingBytes(usize),
    #[error("oversized: {size} > {max}")] Oversized { size: usize, max: usize },
    #[error("invalid txid: {0}")] InvalidTxid(String),
    #[error("output {vout} not present in parent {txid}")] MissingParentOutput { txid: String, vout: u32 },
    #[error("value overflow")] ValueOverflow,
}

