//! # satchel-proof
//! Encoding, decoding and validation of x402 "exact" payment envelopes
//! carrying a signed BSV transaction for a facilitator to settle.

pub mod envelope;
pub mod error;
pub mod network;

pub use envelope::{
    decode, encode, extract_transaction, validate, Accessibility, PaymentEnvelope, PaymentPayload,
    ValidationReport,
};
pub use error::ProofError;
