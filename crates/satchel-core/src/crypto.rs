//! secp256k1 signing keys and the hash functions used by P2PKH.
//!
//! A wallet's secret is carried as a WIF string. [`WifKey`] decodes it into
//! a secp256k1 secret key and implements [`SigningKey`], the narrow
//! capability the transaction builder needs: produce a DER signature over a
//! 32-byte sighash, expose the public key and address, and re-export the
//! portable WIF form for encryption at rest.
//!
//! # Hashes
//!
//! - `hash160(x) = RIPEMD160(SHA256(x))`, used for pubkey hashes.
//! - `sha256d(x) = SHA256(SHA256(x))`, used for txids and sighashes.

use ripemd::Ripemd160;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::address::{Address, Network};
use crate::constants::{MAINNET_WIF_VERSION, SIGHASH_ALL_FORKID, TESTNET_WIF_VERSION};
use crate::error::CryptoError;
use crate::script::Script;
use crate::transaction::Transaction;

/// RIPEMD160 of SHA256.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// Double SHA256.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Capability to sign transaction inputs for a single P2PKH address.
///
/// Implementations own their secret material; callers only ever see
/// signatures, public data and the portable (still secret) WIF form.
pub trait SigningKey {
    /// Sign a 32-byte digest, returning a DER-encoded ECDSA signature
    /// without the trailing sighash byte.
    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError>;

    /// Serialized public key as it appears in unlocking scripts.
    fn public_key(&self) -> Vec<u8>;

    /// The P2PKH address controlled by this key.
    fn address(&self) -> Address;

    /// Portable text form of the secret, suitable for encryption at rest.
    fn to_portable(&self) -> Zeroizing<String>;
}

/// A secp256k1 key decoded from Wallet Import Format.
pub struct WifKey {
    secret: SecretKey,
    network: Network,
    compressed: bool,
}

impl WifKey {
    /// Generate a fresh compressed key from the OS RNG.
    pub fn generate(network: Network) -> Self {
        let mut rng = rand::rngs::OsRng;
        loop {
            let mut bytes = Zeroizing::new([0u8; 32]);
            rand::RngCore::fill_bytes(&mut rng, &mut bytes[..]);
            // Out-of-range scalars are astronomically rare; draw again.
            if let Ok(secret) = SecretKey::from_slice(&bytes[..]) {
                return Self {
                    secret,
                    network,
                    compressed: true,
                };
            }
        }
    }

    /// Build a compressed key from raw secret bytes.
    pub fn from_secret_bytes(bytes: &[u8; 32], network: Network) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self {
            secret,
            network,
            compressed: true,
        })
    }

    /// Decode a WIF string. The network is taken from the version byte.
    pub fn from_wif(wif: &str) -> Result<Self, CryptoError> {
        let decoded = Zeroizing::new(
            bs58::decode(wif.trim())
                .with_check(None)
                .into_vec()
                .map_err(|_| CryptoError::InvalidWif)?,
        );

        let network = match decoded.first() {
            Some(&MAINNET_WIF_VERSION) => Network::Mainnet,
            Some(&TESTNET_WIF_VERSION) => Network::Testnet,
            _ => return Err(CryptoError::InvalidWif),
        };

        let compressed = match decoded.len() {
            33 => false,
            34 if decoded[33] == 0x01 => true,
            _ => return Err(CryptoError::InvalidWif),
        };

        let secret =
            SecretKey::from_slice(&decoded[1..33]).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self {
            secret,
            network,
            compressed,
        })
    }

    /// Encode as WIF.
    pub fn to_wif(&self) -> Zeroizing<String> {
        let mut payload = Zeroizing::new(Vec::with_capacity(34));
        payload.push(self.network.wif_version());
        payload.extend_from_slice(&self.secret.secret_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        Zeroizing::new(bs58::encode(payload.as_slice()).with_check().into_string())
    }

    /// Network encoded in the WIF version byte.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Whether the public key is serialized in compressed form.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

impl SigningKey for WifKey {
    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(*digest);
        let sig = secp.sign_ecdsa(&msg, &self.secret);
        Ok(sig.serialize_der().to_vec())
    }

    fn public_key(&self) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let pk = PublicKey::from_secret_key(&secp, &self.secret);
        if self.compressed {
            pk.serialize().to_vec()
        } else {
            pk.serialize_uncompressed().to_vec()
        }
    }

    fn address(&self) -> Address {
        Address::from_public_key(&self.public_key(), self.network)
    }

    fn to_portable(&self) -> Zeroizing<String> {
        self.to_wif()
    }
}

impl fmt::Debug for WifKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifKey")
            .field("address", &self.address().to_string())
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

impl Drop for WifKey {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

/// Check that input `index` of `tx` carries a valid P2PKH unlocking script
/// for an output locked by `locking_script` and worth `value` satoshis.
///
/// Verifies that the pushed public key hashes to the locking script's pubkey
/// hash, that the sighash byte is `SIGHASH_ALL | FORKID`, and that the
/// signature verifies over the FORKID sighash.
pub fn verify_p2pkh_input(
    tx: &Transaction,
    index: usize,
    locking_script: &Script,
    value: u64,
) -> Result<(), CryptoError> {
    let input = tx.inputs.get(index).ok_or(CryptoError::InputIndexOutOfBounds {
        index,
        len: tx.inputs.len(),
    })?;

    let expected_hash = locking_script
        .p2pkh_hash()
        .ok_or(CryptoError::InvalidPublicKey)?;
    let (sig_with_type, pubkey_bytes) = input
        .script_sig
        .p2pkh_unlock_parts()
        .ok_or(CryptoError::InvalidSignature)?;

    if hash160(pubkey_bytes) != expected_hash {
        return Err(CryptoError::VerificationFailed);
    }

    let (sighash_byte, der) = sig_with_type
        .split_last()
        .ok_or(CryptoError::InvalidSignature)?;
    if u32::from(*sighash_byte) != SIGHASH_ALL_FORKID {
        return Err(CryptoError::InvalidSignature);
    }

    let pk = PublicKey::from_slice(pubkey_bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_der(der).map_err(|_| CryptoError::InvalidSignature)?;
    let digest = tx.sighash_forkid(index, locking_script, value)?;

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&Message::from_digest(digest), &sig, &pk)
        .map_err(|_| CryptoError::VerificationFailed)
}
