//! Payment proof error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// Bad base64, bad UTF-8, bad JSON, or a missing / mistyped field.
    #[error("malformed payment envelope: {0}")]
    MalformedEnvelope(String),

    /// No envelope network tag corresponds to the requested network.
    #[error("unknown envelope network: {0}")]
    UnknownNetwork(String),
}
