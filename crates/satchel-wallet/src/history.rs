//! Best-effort local log of transactions a wallet has built or broadcast.
//!
//! Stored next to the wallet record as `<id>.history.json`. The log is a
//! convenience cache: losing it never affects funds, and a failed write is
//! logged rather than surfaced to the payment that triggered it.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryStatus {
    /// Signed and handed to the caller as a proof, not yet broadcast by us.
    Built,
    /// Accepted by the indexer.
    Broadcast,
    /// The indexer already knew the transaction.
    AlreadyBroadcast,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub txid: String,
    /// Satoshis sent to the destination.
    pub amount: u64,
    pub fee: u64,
    pub destination: String,
    pub created_at: DateTime<Utc>,
    pub status: HistoryStatus,
}

impl HistoryEntry {
    pub fn built(txid: String, amount: u64, fee: u64, destination: String) -> Self {
        Self {
            txid,
            amount,
            fee,
            destination,
            created_at: Utc::now(),
            status: HistoryStatus::Built,
        }
    }
}

/// Read the log. A missing file is an empty history.
pub(crate) fn read(path: &Path) -> Result<Vec<HistoryEntry>, WalletError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| WalletError::Corrupt(format!("history {}: {e}", path.display())))
}

/// Insert `entry`, or replace the entry with the same txid keeping its
/// original creation time. Newest entries are kept last.
pub(crate) fn upsert(entries: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    match entries.iter_mut().find(|e| e.txid == entry.txid) {
        Some(existing) => {
            existing.status = entry.status;
            existing.amount = entry.amount;
            existing.fee = entry.fee;
            existing.destination = entry.destination;
        }
        None => entries.push(entry),
    }
}

/// Update only the status of an existing entry. Returns false when absent.
pub(crate) fn set_status(entries: &mut [HistoryEntry], txid: &str, status: HistoryStatus) -> bool {
    match entries.iter_mut().find(|e| e.txid == txid) {
        Some(existing) => {
            existing.status = status;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(txid: &str, status: HistoryStatus) -> HistoryEntry {
        HistoryEntry {
            status,
            ..HistoryEntry::built(txid.into(), 1_000, 113, "dest".into())
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = read(&dir.path().join("nope.history.json")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.history.json");
        std::fs::write(&path, b"{not a list").unwrap();
        assert!(matches!(read(&path), Err(WalletError::Corrupt(_))));
    }

    #[test]
    fn upsert_replaces_by_txid() {
        let mut entries = vec![entry("aa", HistoryStatus::Built)];
        let created = entries[0].created_at;
        upsert(&mut entries, entry("bb", HistoryStatus::Built));
        upsert(&mut entries, entry("aa", HistoryStatus::Broadcast));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].txid, "aa");
        assert_eq!(entries[0].status, HistoryStatus::Broadcast);
        assert_eq!(entries[0].created_at, created);
    }

    #[test]
    fn set_status_only_touches_known_txids() {
        let mut entries = vec![entry("aa", HistoryStatus::Built)];
        assert!(set_status(&mut entries, "aa", HistoryStatus::AlreadyBroadcast));
        assert!(!set_status(&mut entries, "cc", HistoryStatus::Broadcast));
        assert_eq!(entries[0].status, HistoryStatus::AlreadyBroadcast);
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(entry("aa", HistoryStatus::AlreadyBroadcast)).unwrap();
        assert_eq!(json["status"], "already-broadcast");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["fee"], 113);
    }
}
