//! P2PKH locking and unlocking scripts.

use serde::{Deserialize, Serialize};
use std::fmt;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_PUSHDATA1: u8 = 0x4c;

/// Raw script bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Self {
        let mut bytes = Vec::with_capacity(25);
        bytes.push(OP_DUP);
        bytes.push(OP_HASH160);
        bytes.push(20);
        bytes.extend_from_slice(pubkey_hash);
        bytes.push(OP_EQUALVERIFY);
        bytes.push(OP_CHECKSIG);
        Self(bytes)
    }

    /// `<sig || sighash_type> <pubkey>`.
    pub fn p2pkh_unlock(signature: &[u8], public_key: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(signature.len() + public_key.len() + 4);
        push_data(&mut bytes, signature);
        push_data(&mut bytes, public_key);
        Self(bytes)
    }

    /// Pubkey hash if this is a standard P2PKH locking script.
    pub fn p2pkh_hash(&self) -> Option<[u8; 20]> {
        let b = &self.0;
        if b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == 20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
        {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&b[3..23]);
            Some(hash)
        } else {
            None
        }
    }

    /// Split a P2PKH unlocking script into its two pushes
    /// (signature with sighash byte, public key).
    pub fn p2pkh_unlock_parts(&self) -> Option<(&[u8], &[u8])> {
        let (sig, rest) = read_push(&self.0)?;
        let (pubkey, rest) = read_push(rest)?;
        if !rest.is_empty() {
            return None;
        }
        Some((sig, pubkey))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    // Signatures and keys are always far below 256 bytes.
    if data.len() < OP_PUSHDATA1 as usize {
        out.push(data.len() as u8);
    } else {
        out.push(OP_PUSHDATA1);
        out.push(data.len() as u8);
    }
    out.extend_from_slice(data);
}

fn read_push(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&op, rest) = bytes.split_first()?;
    let (len, rest) = match op {
        1..=0x4b => (op as usize, rest),
        OP_PUSHDATA1 => {
            let (&n, rest) = rest.split_first()?;
            (n as usize, rest)
        }
        _ => return None,
    };
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}
