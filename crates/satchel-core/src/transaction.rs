//! Transaction model, wire serialization and FORKID signature hashing.
//!
//! The byte layout is the standard one:
//!
//! ```text
//! version:u32le | varint n_in | inputs | varint n_out | outputs | lock_time:u32le
//! input  = prev_txid[32] | vout:u32le | varint len | script_sig | sequence:u32le
//! output = value:u64le | varint len | script_pubkey
//! ```
//!
//! Txids are `sha256d(serialized)` and are displayed byte-reversed.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{FINAL_SEQUENCE, MAX_TX_SIZE, SIGHASH_ALL_FORKID};
use crate::crypto::sha256d;
use crate::error::{CryptoError, TransactionError};
use crate::script::Script;

/// A transaction id in internal (hash) byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Internal byte order, as serialized inside transactions.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({self})")
    }
}

impl FromStr for Txid {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| TransactionError::InvalidTxid(s.to_string()))?;
        let mut out: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransactionError::InvalidTxid(s.to_string()))?;
        out.reverse();
        Ok(Self(out))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    /// An unsigned input spending `previous_output` with a final sequence.
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: Script::default(),
            sequence: FINAL_SEQUENCE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Script,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Wire encoding.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.inputs.len() * 148 + self.outputs.len() * 34);
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_varint(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_output.txid.as_bytes());
            buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_varint(&mut buf, input.script_sig.len() as u64);
            buf.extend_from_slice(input.script_sig.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_varint(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            write_output(&mut buf, output);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// Lowercase hex of the wire encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Parse from hex. Case-insensitive.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Self::deserialize(&bytes)
    }

    /// Parse from wire bytes. The entire slice must be consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        if bytes.len() > MAX_TX_SIZE {
            return Err(TransactionError::Oversized {
                size: bytes.len(),
                max: MAX_TX_SIZE,
            });
        }

        let mut r = Reader::new(bytes);
        let version = r.u32()?;

        let n_in = r.count()?;
        let mut inputs = Vec::with_capacity(n_in.min(1024));
        for _ in 0..n_in {
            let txid = Txid(r.array::<32>()?);
            let vout = r.u32()?;
            let script_sig = Script(r.var_bytes()?.to_vec());
            let sequence = r.u32()?;
            inputs.push(TxIn {
                previous_output: OutPoint { txid, vout },
                script_sig,
                sequence,
            });
        }

        let n_out = r.count()?;
        let mut outputs = Vec::with_capacity(n_out.min(1024));
        for _ in 0..n_out {
            let value = r.u64()?;
            let script_pubkey = Script(r.var_bytes()?.to_vec());
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        let lock_time = r.u32()?;
        if r.remaining() != 0 {
            return Err(TransactionError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn txid(&self) -> Txid {
        Txid(sha256d(&self.serialize()))
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    /// Sum of all output values.
    pub fn total_output_value(&self) -> Result<u64, TransactionError> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
            .ok_or(TransactionError::ValueOverflow)
    }

    /// Signature hash for input `index` under `SIGHASH_ALL | FORKID`.
    ///
    /// Preimage, in order: version, hashPrevouts, hashSequence, the spent
    /// outpoint, `script_code` (length-prefixed), the spent `value`, the
    /// input's sequence, hashOutputs, lock_time, sighash type. The result is
    /// `sha256d` of the preimage.
    pub fn sighash_forkid(
        &self,
        index: usize,
        script_code: &Script,
        value: u64,
    ) -> Result<[u8; 32], CryptoError> {
        let input = self
            .inputs
            .get(index)
            .ok_or(CryptoError::InputIndexOutOfBounds {
                index,
                len: self.inputs.len(),
            })?;

        let mut prevouts = Vec::with_capacity(self.inputs.len() * 36);
        let mut sequences = Vec::with_capacity(self.inputs.len() * 4);
        for i in &self.inputs {
            prevouts.extend_from_slice(i.previous_output.txid.as_bytes());
            prevouts.extend_from_slice(&i.previous_output.vout.to_le_bytes());
            sequences.extend_from_slice(&i.sequence.to_le_bytes());
        }
        let mut outputs = Vec::with_capacity(self.outputs.len() * 34);
        for o in &self.outputs {
            write_output(&mut outputs, o);
        }

        let mut preimage = Vec::with_capacity(156 + script_code.len());
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&sha256d(&prevouts));
        preimage.extend_from_slice(&sha256d(&sequences));
        preimage.extend_from_slice(input.previous_output.txid.as_bytes());
        preimage.extend_from_slice(&input.previous_output.vout.to_le_bytes());
        write_varint(&mut preimage, script_code.len() as u64);
        preimage.extend_from_slice(script_code.as_bytes());
        preimage.extend_from_slice(&value.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
        preimage.extend_from_slice(&sha256d(&outputs));
        preimage.extend_from_slice(&self.lock_time.to_le_bytes());
        preimage.extend_from_slice(&SIGHASH_ALL_FORKID.to_le_bytes());

        Ok(sha256d(&preimage))
    }
}

fn write_output(buf: &mut Vec<u8>, output: &TxOut) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    write_varint(buf, output.script_pubkey.len() as u64);
    buf.extend_from_slice(output.script_pubkey.as_bytes());
}

fn write_varint(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < n {
            return Err(TransactionError::UnexpectedEof(self.pos));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, TransactionError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, TransactionError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn varint(&mut self) -> Result<u64, TransactionError> {
        Ok(match self.u8()? {
            0xfd => u16::from_le_bytes(self.array()?) as u64,
            0xfe => u32::from_le_bytes(self.array()?) as u64,
            0xff => self.u64()?,
            n => n as u64,
        })
    }

    /// A varint element count, bounded by the bytes left.
    fn count(&mut self) -> Result<usize, TransactionError> {
        let n = self.varint()?;
        if n > self.remaining() as u64 {
            return Err(TransactionError::UnexpectedEof(self.pos));
        }
        Ok(n as usize)
    }

    fn var_bytes(&mut self) -> Result<&'a [u8], TransactionError> {
        let n = self.count()?;
        self.take(n)
    }
}
