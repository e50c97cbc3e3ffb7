//! Network tags and P2PKH address encoding.
//!
//! Addresses are Base58Check strings of `version || hash160(pubkey)`, with
//! the version byte selecting the network:
//! - Mainnet: `0x00` (addresses start with `1`)
//! - Testnet: `0x6f` (addresses start with `m` or `n`)

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    MAINNET_P2PKH_VERSION, MAINNET_WIF_VERSION, TESTNET_P2PKH_VERSION, TESTNET_WIF_VERSION,
};
use crate::crypto::hash160;
use crate::error::AddressError;
use crate::script::Script;

/// The two mutually exclusive chain environments a wallet can live on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Lowercase tag used in wallet records and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Base58Check version byte for P2PKH addresses.
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2PKH_VERSION,
            Network::Testnet => TESTNET_P2PKH_VERSION,
        }
    }

    /// Version byte prefixed to WIF-encoded keys.
    pub fn wif_version(&self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_WIF_VERSION,
            Network::Testnet => TESTNET_WIF_VERSION,
        }
    }

    fn from_p2pkh_version(version: u8) -> Result<Self, AddressError> {
        match version {
            MAINNET_P2PKH_VERSION => Ok(Network::Mainnet),
            TESTNET_P2PKH_VERSION => Ok(Network::Testnet),
            other => Err(AddressError::UnknownVersion(other)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A pay-to-public-key-hash address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    pubkey_hash: [u8; 20],
}

impl Address {
    /// Create an address from a 20-byte pubkey hash.
    pub fn from_pubkey_hash(pubkey_hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            pubkey_hash,
        }
    }

    /// Create an address from serialized public key bytes (33 or 65 bytes).
    pub fn from_public_key(public_key: &[u8], network: Network) -> Self {
        Self::from_pubkey_hash(hash160(public_key), network)
    }

    /// Parse an address and require it to belong to `network`.
    pub fn parse_for(s: &str, network: Network) -> Result<Self, AddressError> {
        let address: Address = s.parse()?;
        if address.network != network {
            return Err(AddressError::NetworkMismatch {
                expected: network.to_string(),
                found: address.network.to_string(),
            });
        }
        Ok(address)
    }

    /// The HASH160 of the public key this address pays to.
    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }

    /// The network this address belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Locking script paying to this address.
    pub fn script_pubkey(&self) -> Script {
        Script::p2pkh(&self.pubkey_hash)
    }

    /// Encode as a Base58Check string.
    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.p2pkh_version());
        payload.extend_from_slice(&self.pubkey_hash);
        bs58::encode(payload).with_check().into_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s.trim())
            .with_check(None)
            .into_vec()
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;
        if decoded.len() != 21 {
            return Err(AddressError::InvalidLength(decoded.len()));
        }
        let network = Network::from_p2pkh_version(decoded[0])?;
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&decoded[1..]);
        Ok(Self {
            network,
            pubkey_hash,
        })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
