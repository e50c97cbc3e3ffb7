//! Passphrase-based encryption of a single wallet secret.
//!
//! The key is derived with scrypt (N = 2^15, r = 8, p = 1) from the
//! passphrase and a fresh 32-byte salt, then the secret is sealed with
//! AES-256-GCM under a fresh 16-byte IV. Salt, IV and ciphertext therefore
//! differ on every call, even for identical inputs.
//!
//! # Stored form
//! ```json
//! { "algorithm": "aes-256-gcm", "salt": "<b64>", "iv": "<b64>",
//!   "authTag": "<b64>", "data": "<b64>" }
//! ```

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;

/// Algorithm tag written to and required from every encrypted block.
pub const ALGORITHM: &str = "aes-256-gcm";

/// scrypt cost parameter as a power of two (N = 32768).
pub const SCRYPT_LOG_N: u8 = 15;

/// scrypt block size.
pub const SCRYPT_R: u32 = 8;

/// scrypt parallelism.
pub const SCRYPT_P: u32 = 1;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

pub const SALT_LEN: usize = 32;

pub const IV_LEN: usize = 16;

pub const TAG_LEN: usize = 16;

/// AES-256-GCM with a 128-bit nonce.
type Cipher = AesGcm<Aes256, U16>;

/// A secret sealed under a passphrase. All byte fields are standard base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSecret {
    pub algorithm: String,
    pub salt: String,
    pub iv: String,
    pub auth_tag: String,
    pub data: String,
}

/// Decoded binary fields of an [`EncryptedSecret`], lengths checked.
struct RawParts {
    salt: Vec<u8>,
    iv: Vec<u8>,
    tag: Vec<u8>,
    data: Vec<u8>,
}

impl EncryptedSecret {
    /// Whether every field decodes and has the expected length. No KDF runs.
    pub fn is_well_formed(&self) -> bool {
        self.decode_parts().is_ok()
    }

    fn decode_parts(&self) -> Result<RawParts, WalletError> {
        Ok(RawParts {
            salt: decode_field("salt", &self.salt, Some(SALT_LEN))?,
            iv: decode_field("iv", &self.iv, Some(IV_LEN))?,
            tag: decode_field("authTag", &self.auth_tag, Some(TAG_LEN))?,
            data: decode_field("data", &self.data, None)?,
        })
    }
}

fn decode_field(name: &str, value: &str, len: Option<usize>) -> Result<Vec<u8>, WalletError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| WalletError::Corrupt(format!("{name}: {e}")))?;
    match len {
        Some(expected) if bytes.len() != expected => Err(WalletError::Corrupt(format!(
            "{name}: expected {expected} bytes, got {}",
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}

/// Derive the AES key from a passphrase and salt.
fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, WalletError> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
        .map_err(|e| WalletError::Build(format!("scrypt params: {e}")))?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(passphrase, salt, &params, key.as_mut_slice())
        .map_err(|e| WalletError::Build(format!("scrypt: {e}")))?;
    Ok(key)
}

/// Seal `secret` under `passphrase`.
pub fn encrypt(secret: &str, passphrase: &str) -> Result<EncryptedSecret, WalletError> {
    if secret.is_empty() {
        return Err(WalletError::Validation("secret must not be empty".into()));
    }
    if passphrase.is_empty() {
        return Err(WalletError::Validation("passphrase must not be empty".into()));
    }

    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase.as_bytes(), &salt)?;
    let cipher = Cipher::new(GenericArray::from_slice(key.as_slice()));

    let mut buffer = Zeroizing::new(secret.as_bytes().to_vec());
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| WalletError::Build("encryption failed".into()))?;

    Ok(EncryptedSecret {
        algorithm: ALGORITHM.to_string(),
        salt: STANDARD.encode(salt),
        iv: STANDARD.encode(iv),
        auth_tag: STANDARD.encode(tag),
        data: STANDARD.encode(buffer.as_slice()),
    })
}

/// Open an encrypted block. Either the full secret is returned or nothing.
pub fn decrypt(encrypted: &EncryptedSecret, passphrase: &str) -> Result<Zeroizing<String>, WalletError> {
    if encrypted.algorithm != ALGORITHM {
        return Err(WalletError::UnsupportedAlgorithm(encrypted.algorithm.clone()));
    }
    if passphrase.is_empty() {
        return Err(WalletError::Validation("passphrase must not be empty".into()));
    }

    let RawParts {
        salt,
        iv,
        tag,
        mut data,
    } = encrypted.decode_parts()?;

    let key = derive_key(passphrase.as_bytes(), &salt)?;
    let cipher = Cipher::new(GenericArray::from_slice(key.as_slice()));

    if cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(&iv),
            b"",
            &mut data,
            GenericArray::from_slice(&tag),
        )
        .is_err()
    {
        data.zeroize();
        return Err(WalletError::AuthenticationFailed);
    }

    match String::from_utf8(data) {
        Ok(secret) => Ok(Zeroizing::new(secret)),
        Err(e) => {
            e.into_bytes().zeroize();
            Err(WalletError::Corrupt("decrypted secret is not UTF-8".into()))
        }
    }
}

/// Whether `value` has the shape of an [`EncryptedSecret`]. Does not decrypt.
pub fn validate(value: &serde_json::Value) -> bool {
    let Ok(block) = serde_json::from_value::<EncryptedSecret>(value.clone()) else {
        return false;
    };
    block.algorithm == ALGORITHM && block.is_well_formed()
}

/// [`encrypt`] on a blocking worker, keeping the KDF off the async executor.
pub async fn encrypt_blocking(
    secret: Zeroizing<String>,
    passphrase: Zeroizing<String>,
) -> Result<EncryptedSecret, WalletError> {
    tokio::task::spawn_blocking(move || encrypt(&secret, &passphrase))
        .await
        .map_err(|e| WalletError::Task(e.to_string()))?
}

/// [`decrypt`] on a blocking worker.
pub async fn decrypt_blocking(
    encrypted: EncryptedSecret,
    passphrase: Zeroizing<String>,
) -> Result<Zeroizing<String>, WalletError> {
    tokio::task::spawn_blocking(move || decrypt(&encrypted, &passphrase))
        .await
        .map_err(|e| WalletError::Task(e.to_string()))?
}
