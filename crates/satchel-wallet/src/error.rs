//! Wallet error types.

use satchel_chain::ChainError;
use satchel_core::error::{AddressError, CryptoError, TransactionError};
use satchel_proof::ProofError;
use thiserror::Error;

/// Errors that can occur in wallet operations.
///
/// Messages never include passphrases or key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// A caller-supplied parameter was rejected.
    #[error("validation: {0}")]
    Validation(String),

    /// Wrong passphrase, or the ciphertext / tag was tampered with.
    #[error("authentication failed: wrong passphrase or tampered data")]
    AuthenticationFailed,

    /// The encrypted block names an algorithm this build cannot decrypt.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No wallet record with this id.
    #[error("wallet not found: {0}")]
    NotFound(String),

    /// A stored record or encrypted block is structurally invalid.
    #[error("corrupt: {0}")]
    Corrupt(String),

    /// The available outputs cannot cover amount plus fee.
    #[error(
        "insufficient funds: need {required} sats, have {available} sats (short by {shortfall})"
    )]
    InsufficientFunds {
        /// Amount plus fee in satoshis.
        required: u64,
        /// Sum of all spendable outputs in satoshis.
        available: u64,
        /// `required - available`.
        shortfall: u64,
    },

    /// A parent transaction could not be obtained for an output.
    #[error("fetching parent of {outpoint}: {source}")]
    ParentFetch {
        /// The output whose parent was requested.
        outpoint: String,
        /// The underlying chain failure.
        source: ChainError,
    },

    /// Transaction assembly failed.
    #[error("build error: {0}")]
    Build(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Proof(#[from] ProofError),
}

impl WalletError {
    /// Build an [`WalletError::InsufficientFunds`] with the shortfall filled in.
    pub fn insufficient(required: u64, available: u64) -> Self {
        WalletError::InsufficientFunds {
            required,
            available,
            shortfall: required.saturating_sub(available),
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let e = WalletError::insufficient(40_113, 30_000);
        assert_eq!(
            e.to_string(),
            "insufficient funds: need 40113 sats, have 30000 sats (short by 10113)"
        );
    }

    #[test]
    fn display_authentication_failed() {
        let e = WalletError::AuthenticationFailed;
        assert_eq!(
            e.to_string(),
            "authentication failed: wrong passphrase or tampered data"
        );
    }

    #[test]
    fn from_chain_error() {
        let chain = ChainError::MaxRetriesExceeded {
            attempts: 4,
            last_error: "HTTP 429".into(),
        };
        let wallet: WalletError = chain.clone().into();
        assert_eq!(wallet, WalletError::Chain(chain));
    }

    #[test]
    fn from_crypto_error() {
        let wallet: WalletError = CryptoError::InvalidWif.into();
        assert_eq!(wallet, WalletError::Crypto(CryptoError::InvalidWif));
    }

    #[test]
    fn parent_fetch_names_outpoint() {
        let e = WalletError::ParentFetch {
            outpoint: "ab:0".into(),
            source: ChainError::NotFound("transaction ab".into()),
        };
        assert_eq!(e.to_string(), "fetching parent of ab:0: not found: transaction ab");
    }

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(WalletError::from(io), WalletError::Io(_)));
    }
}
