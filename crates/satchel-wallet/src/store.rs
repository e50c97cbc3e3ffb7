//! Durable wallet records, one JSON file per wallet.
//!
//! Layout under the store directory (mode 0700):
//!
//! ```text
//! <id>.json           wallet record (mode 0600)
//! <id>.history.json   best-effort transaction log (mode 0600)
//! ```
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so a crash never leaves a half-written record. All writes through
//! one [`WalletStore`] are serialized by an in-process mutex.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use satchel_core::address::{Address, Network};
use satchel_core::crypto::{SigningKey, WifKey};

use crate::encryption::{self, EncryptedSecret};
use crate::error::WalletError;
use crate::history::{self, HistoryEntry, HistoryStatus};

/// Current wallet record format version.
pub const RECORD_VERSION: u32 = 1;

const RECORD_SUFFIX: &str = ".json";
const HISTORY_SUFFIX: &str = ".history.json";

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// A stored wallet. Holds the key only in encrypted form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub version: u32,
    pub id: String,
    pub name: String,
    pub network: Network,
    pub address: Address,
    pub created_at: DateTime<Utc>,
    pub encrypted: EncryptedSecret,
}

impl WalletRecord {
    /// A fresh record with a new random id.
    pub fn new(name: &str, address: Address, encrypted: EncryptedSecret) -> Result<Self, WalletError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WalletError::Validation("wallet name must not be empty".into()));
        }
        Ok(Self {
            version: RECORD_VERSION,
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            network: address.network(),
            address,
            created_at: Utc::now(),
            encrypted,
        })
    }

    /// Seal `key` under `passphrase` into a new record. Runs the KDF inline.
    pub fn seal(name: &str, key: &WifKey, passphrase: &str) -> Result<Self, WalletError> {
        let encrypted = encryption::encrypt(&key.to_portable(), passphrase)?;
        Self::new(name, key.address(), encrypted)
    }

    /// Parse a decrypted secret and check it controls the stored address.
    pub fn verify_address(&self, secret: &str) -> Result<WifKey, WalletError> {
        let key = WifKey::from_wif(secret)
            .map_err(|_| WalletError::Corrupt(format!("wallet {}: secret is not a valid key", self.id)))?;
        if key.network() != self.network || key.address() != self.address {
            return Err(WalletError::Corrupt(format!(
                "wallet {}: secret does not match stored address",
                self.id
            )));
        }
        Ok(key)
    }

    /// Decrypt and verify. Runs the KDF inline.
    pub fn unlock(&self, passphrase: &str) -> Result<WifKey, WalletError> {
        let secret = encryption::decrypt(&self.encrypted, passphrase)?;
        self.verify_address(&secret)
    }

    /// [`unlock`](Self::unlock) on a blocking worker.
    pub async fn unlock_blocking(&self, passphrase: Zeroizing<String>) -> Result<WifKey, WalletError> {
        let secret = encryption::decrypt_blocking(self.encrypted.clone(), passphrase).await?;
        self.verify_address(&secret)
    }

    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            network: self.network,
            address: self.address.clone(),
            created_at: self.created_at,
        }
    }

    fn check_consistent(&self, expected_id: &str) -> Result<(), WalletError> {
        if self.version != RECORD_VERSION {
            return Err(WalletError::Corrupt(format!(
                "wallet {expected_id}: unsupported record version {}",
                self.version
            )));
        }
        if self.id != expected_id {
            return Err(WalletError::Corrupt(format!(
                "wallet {expected_id}: record carries id {}",
                self.id
            )));
        }
        if self.address.network() != self.network {
            return Err(WalletError::Corrupt(format!(
                "wallet {expected_id}: address network does not match record network"
            )));
        }
        if !self.encrypted.is_well_formed() {
            return Err(WalletError::Corrupt(format!(
                "wallet {expected_id}: encrypted block malformed"
            )));
        }
        Ok(())
    }
}

/// Public metadata of a wallet, as returned by [`WalletStore::list`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub id: String,
    pub name: String,
    pub network: Network,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// Directory of wallet records.
#[derive(Debug)]
pub struct WalletStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl WalletStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        restrict_dir(&dir)?;
        debug!(dir = %dir.display(), "wallet store opened");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `record`, replacing any previous version atomically.
    pub fn save(&self, record: &WalletRecord) -> Result<(), WalletError> {
        let id = canonical_id(&record.id)?;
        if id != record.id {
            return Err(WalletError::Validation(format!(
                "wallet id must be a lowercase hyphenated uuid: {}",
                record.id
            )));
        }
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| WalletError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock();
        self.write_atomic(&self.record_path(&id), &json)?;
        info!(id = %id, name = %record.name, network = %record.network, "wallet saved");
        Ok(())
    }

    /// Load one record. `NotFound` when absent, `Corrupt` when unreadable.
    pub fn load(&self, id: &str) -> Result<WalletRecord, WalletError> {
        let id = canonical_id(id)?;
        self.load_canonical(&id)
    }

    /// Metadata of every readable record, most recently created first.
    ///
    /// Unreadable or inconsistent files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<WalletSummary>, WalletError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.ends_with(HISTORY_SUFFIX) {
                continue;
            }
            let Some(stem) = name.strip_suffix(RECORD_SUFFIX) else {
                continue;
            };
            let loaded = canonical_id(stem).and_then(|id| self.load_canonical(&id));
            match loaded {
                Ok(record) => summaries.push(record.summary()),
                Err(e) => warn!(file = %name, error = %e, "skipping unreadable wallet record"),
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Irreversibly remove a wallet and its history.
    pub fn delete(&self, id: &str) -> Result<(), WalletError> {
        let id = canonical_id(id)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.record_path(&id)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WalletError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(self.history_path(&id)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(id = %id, error = %e, "failed to remove wallet history"),
        }
        info!(id = %id, "wallet deleted");
        Ok(())
    }

    /// Whether a record file exists. Malformed ids never exist.
    pub fn exists(&self, id: &str) -> bool {
        canonical_id(id)
            .map(|id| self.record_path(&id).is_file())
            .unwrap_or(false)
    }

    /// Re-encrypt a wallet's secret under a new passphrase.
    ///
    /// Runs the KDF twice inline; async callers should use a blocking worker.
    pub fn rotate_passphrase(&self, id: &str, old: &str, new: &str) -> Result<(), WalletError> {
        if new.is_empty() {
            return Err(WalletError::Validation("new passphrase must not be empty".into()));
        }
        let id = canonical_id(id)?;

        // Held across read-modify-write so a concurrent save cannot interleave.
        let _guard = self.write_lock.lock();
        let mut record = self.load_canonical(&id)?;
        let key = record.unlock(old)?;
        record.encrypted = encryption::encrypt(&key.to_portable(), new)?;

        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| WalletError::Serialization(e.to_string()))?;
        self.write_atomic(&self.record_path(&id), &json)?;
        info!(id = %id, "wallet passphrase rotated");
        Ok(())
    }

    /// Transaction history of a wallet, oldest first.
    pub fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, WalletError> {
        let id = canonical_id(id)?;
        history::read(&self.history_path(&id))
    }

    /// Insert or update a history entry, keyed by txid.
    pub fn record_history(&self, id: &str, entry: HistoryEntry) -> Result<(), WalletError> {
        let id = canonical_id(id)?;
        let _guard = self.write_lock.lock();
        let path = self.history_path(&id);
        let mut entries = history::read(&path)?;
        history::upsert(&mut entries, entry);
        self.write_history(&path, &entries)
    }

    /// Change the status of a logged transaction. Returns false when the
    /// txid is not in the log.
    pub fn set_history_status(
        &self,
        id: &str,
        txid: &str,
        status: HistoryStatus,
    ) -> Result<bool, WalletError> {
        let id = canonical_id(id)?;
        let _guard = self.write_lock.lock();
        let path = self.history_path(&id);
        let mut entries = history::read(&path)?;
        if !history::set_status(&mut entries, txid, status) {
            return Ok(false);
        }
        self.write_history(&path, &entries)?;
        Ok(true)
    }

    fn write_history(&self, path: &Path, entries: &[HistoryEntry]) -> Result<(), WalletError> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| WalletError::Serialization(e.to_string()))?;
        self.write_atomic(path, &json)
    }

    fn load_canonical(&self, id: &str) -> Result<WalletRecord, WalletError> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WalletError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let record: WalletRecord = serde_json::from_slice(&bytes)
            .map_err(|e| WalletError::Corrupt(format!("wallet {id}: {e}")))?;
        record.check_consistent(id)?;
        Ok(record)
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{RECORD_SUFFIX}"))
    }

    fn history_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{HISTORY_SUFFIX}"))
    }

    /// Caller must hold `write_lock`.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), WalletError> {
        restrict_dir(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        restrict_file(tmp.path())?;
        tmp.persist(path).map_err(|e| WalletError::Io(e.error.to_string()))?;
        Ok(())
    }
}

/// Parse a wallet id and return its canonical form. Rejects anything that
/// could name a path outside the store.
fn canonical_id(id: &str) -> Result<String, WalletError> {
    Uuid::parse_str(id)
        .map(|u| u.hyphenated().to_string())
        .map_err(|_| WalletError::Validation(format!("invalid wallet id: {id:?}")))
}

#[cfg(unix)]
fn restrict_dir(dir: &Path) -> Result<(), WalletError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir(_dir: &Path) -> Result<(), WalletError> {
    Ok(())
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> Result<(), WalletError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(FILE_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> Result<(), WalletError> {
    Ok(())
}
