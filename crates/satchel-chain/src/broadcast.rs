//! Broadcast outcome classification.
//!
//! Indexers report "already have it" and "inputs are gone" as errors with
//! free-text bodies. Both are terminal, so they are recognised by substring
//! (case-insensitive) before the generic retry rule sees the response.

use serde::{Deserialize, Serialize};

/// Body fragments meaning the transaction is already known to the network.
const ALREADY_BROADCAST_MARKERS: &[&str] = &[
    "txn-already-known",
    "already known",
    "already in the mempool",
    "txn-already-in-mempool",
    "already in block chain",
];

/// Body fragments meaning one or more inputs are missing or spent.
const STALE_INPUT_MARKERS: &[&str] = &[
    "missing inputs",
    "missingorspent",
    "bad-txns-inputs-spent",
    "txn-mempool-conflict",
    "already spent",
    "mempool conflict",
];

/// Message reported for an already-broadcast transaction.
pub const ALREADY_BROADCAST_MESSAGE: &str = "already broadcast";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BroadcastOutcome {
    /// The indexer accepted the transaction.
    Accepted,
    /// The transaction is already in the mempool or a block.
    AlreadyBroadcast,
    /// An input was missing or already spent; rebuilding is required.
    StaleInputs,
}

/// Structured result of a broadcast that reached a terminal answer.
///
/// `success` is true only for [`BroadcastOutcome::Accepted`]. An already
/// broadcast transaction is success-equivalent but reported with
/// `success = false` and `error = "already broadcast"` so callers can tell
/// a fresh acceptance from a duplicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub success: bool,
    pub txid: Option<String>,
    pub outcome: BroadcastOutcome,
    pub error: Option<String>,
}

impl BroadcastResult {
    pub fn accepted(txid: String) -> Self {
        Self {
            success: true,
            txid: Some(txid),
            outcome: BroadcastOutcome::Accepted,
            error: None,
        }
    }

    pub fn already_broadcast(txid: Option<String>) -> Self {
        Self {
            success: false,
            txid,
            outcome: BroadcastOutcome::AlreadyBroadcast,
            error: Some(ALREADY_BROADCAST_MESSAGE.to_string()),
        }
    }

    pub fn stale_inputs(detail: String) -> Self {
        Self {
            success: false,
            txid: None,
            outcome: BroadcastOutcome::StaleInputs,
            error: Some(detail),
        }
    }

    /// Accepted now or earlier: either way the transaction is on the network.
    pub fn is_on_network(&self) -> bool {
        matches!(
            self.outcome,
            BroadcastOutcome::Accepted | BroadcastOutcome::AlreadyBroadcast
        )
    }
}

/// Classify an error body. `None` means the generic status rules apply.
pub fn classify_rejection(body: &str) -> Option<BroadcastOutcome> {
    let lower = body.to_lowercase();
    if ALREADY_BROADCAST_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(BroadcastOutcome::AlreadyBroadcast)
    } else if STALE_INPUT_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(BroadcastOutcome::StaleInputs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_known_variants() {
        for body in [
            "257: txn-already-known",
            "Transaction already in the mempool",
            "TXN-ALREADY-IN-MEMPOOL",
            "transaction already in block chain",
            "already known",
        ] {
            assert_eq!(
                classify_rejection(body),
                Some(BroadcastOutcome::AlreadyBroadcast),
                "{body}"
            );
        }
    }

    #[test]
    fn stale_input_variants() {
        for body in [
            "Missing inputs",
            "missingorspent",
            "258: txn-mempool-conflict",
            "bad-txns-inputs-spent",
            "input already spent",
            "Mempool conflict detected",
        ] {
            assert_eq!(
                classify_rejection(body),
                Some(BroadcastOutcome::StaleInputs),
                "{body}"
            );
        }
    }

    #[test]
    fn unrelated_body_unclassified() {
        assert_eq!(classify_rejection("Internal Server Error"), None);
        assert_eq!(classify_rejection(""), None);
    }

    #[test]
    fn already_broadcast_result_shape() {
        let r = BroadcastResult::already_broadcast(None);
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("already broadcast"));
        assert!(r.is_on_network());
        assert!(!BroadcastResult::stale_inputs("x".into()).is_on_network());
    }

    #[test]
    fn outcome_serializes_kebab() {
        let json = serde_json::to_string(&BroadcastOutcome::AlreadyBroadcast).unwrap();
        assert_eq!(json, "\"already-broadcast\"");
    }
}
