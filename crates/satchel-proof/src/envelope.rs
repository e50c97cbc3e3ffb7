//! The x402 payment envelope.
//!
//! Wire form is standard base64 of compact UTF-8 JSON:
//!
//! ```json
//! {
//!   "x402Version": 1,
//!   "scheme": "exact",
//!   "network": "bsv-mainnet",
//!   "payload": { "transaction": "<hex>" },
//!   "accessibility": { "language": "en", "cognitiveLevel": "simple", "audioFriendly": true }
//! }
//! ```
//!
//! `accessibility` is omitted when absent. The transaction hex is carried
//! verbatim, including its case.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use satchel_core::address::Network;

use crate::error::ProofError;
use crate::network::{envelope_tag, wallet_network};

/// The only protocol version produced and accepted.
pub const X402_VERSION: u32 = 1;

/// The only payment scheme produced and accepted.
pub const SCHEME_EXACT: &str = "exact";

/// Optional presentation hints for agents relaying the payment to a person.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessibility {
    pub language: String,
    pub cognitive_level: String,
    pub audio_friendly: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Signed transaction as hex.
    pub transaction: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEnvelope {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: PaymentPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<Accessibility>,
}

impl PaymentEnvelope {
    /// Version 1 "exact" envelope for a signed transaction.
    pub fn new(
        tx_hex: &str,
        network: Network,
        accessibility: Option<Accessibility>,
    ) -> Result<Self, ProofError> {
        Ok(Self {
            x402_version: X402_VERSION,
            scheme: SCHEME_EXACT.to_string(),
            network: envelope_tag(network)?.to_string(),
            payload: PaymentPayload {
                transaction: tx_hex.to_string(),
            },
            accessibility,
        })
    }

    /// Base64 of the compact JSON form.
    pub fn encode(&self) -> Result<String, ProofError> {
        let json =
            serde_json::to_vec(self).map_err(|e| ProofError::MalformedEnvelope(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(text: &str) -> Result<Self, ProofError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| ProofError::MalformedEnvelope(format!("base64: {e}")))?;
        let json = std::str::from_utf8(&bytes)
            .map_err(|e| ProofError::MalformedEnvelope(format!("utf-8: {e}")))?;
        serde_json::from_str(json).map_err(|e| ProofError::MalformedEnvelope(format!("json: {e}")))
    }

    /// Wallet network named by the envelope's tag.
    pub fn wallet_network(&self) -> Result<Network, ProofError> {
        wallet_network(&self.network).ok_or_else(|| ProofError::UnknownNetwork(self.network.clone()))
    }

    /// Every rule this envelope breaks; empty when acceptable.
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.x402_version != X402_VERSION {
            errors.push(format!("unsupported x402Version: {}", self.x402_version));
        }
        if self.scheme != SCHEME_EXACT {
            errors.push(format!("unsupported scheme: {}", self.scheme));
        }
        if wallet_network(&self.network).is_none() {
            errors.push(format!("unknown network: {}", self.network));
        }
        let tx = &self.payload.transaction;
        if tx.is_empty() {
            errors.push("payload.transaction is empty".to_string());
        } else if tx.len() % 2 != 0 || !tx.bytes().all(|b| b.is_ascii_hexdigit()) {
            errors.push("payload.transaction is not hex".to_string());
        }
        errors
    }
}

/// Outcome of [`validate`]: all violations found, not just the first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Build and encode an envelope.
pub fn encode(
    tx_hex: &str,
    network: Network,
    accessibility: Option<Accessibility>,
) -> Result<String, ProofError> {
    PaymentEnvelope::new(tx_hex, network, accessibility)?.encode()
}

pub fn decode(text: &str) -> Result<PaymentEnvelope, ProofError> {
    PaymentEnvelope::decode(text)
}

/// The transaction hex exactly as carried in the envelope.
pub fn extract_transaction(text: &str) -> Result<String, ProofError> {
    Ok(PaymentEnvelope::decode(text)?.payload.transaction)
}

pub fn validate(text: &str) -> ValidationReport {
    let errors = match PaymentEnvelope::decode(text) {
        Ok(envelope) => envelope.violations(),
        Err(e) => vec![e.to_string()],
    };
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TX: &str = "0100000001AbCdEf";

    fn raw(json: &str) -> String {
        STANDARD.encode(json)
    }

    #[test]
    fn testnet_roundtrip() {
        let text = encode(TX, Network::Testnet, None).unwrap();
        let env = decode(&text).unwrap();
        assert_eq!(env.network, "bsv-testnet");
        assert_eq!(env.scheme, "exact");
        assert_eq!(env.x402_version, 1);
        assert_eq!(env.payload.transaction, TX);
        assert_eq!(env.wallet_network().unwrap(), Network::Testnet);
    }

    #[test]
    fn wire_json_shape() {
        let text = encode("00", Network::Mainnet, None).unwrap();
        let json = String::from_utf8(STANDARD.decode(text).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"x402Version":1,"scheme":"exact","network":"bsv-mainnet","payload":{"transaction":"00"}}"#
        );
    }

    #[test]
    fn accessibility_carried() {
        let acc = Accessibility {
            language: "en".into(),
            cognitive_level: "simple".into(),
            audio_friendly: true,
        };
        let text = encode(TX, Network::Mainnet, Some(acc.clone())).unwrap();
        let json = String::from_utf8(STANDARD.decode(&text).unwrap()).unwrap();
        assert!(json.contains(r#""cognitiveLevel":"simple""#));
        assert!(json.contains(r#""audioFriendly":true"#));
        assert_eq!(decode(&text).unwrap().accessibility, Some(acc));
    }

    #[test]
    fn malformed_inputs() {
        for text in [
            "!!!not base64!!!".to_string(),
            STANDARD.encode([0xff, 0xfe, 0xfd]),
            raw("not json"),
            raw(r#"{"x402Version":1,"scheme":"exact","network":"bsv-mainnet"}"#),
            raw(r#"{"x402Version":"1","scheme":"exact","network":"bsv-mainnet","payload":{"transaction":"00"}}"#),
            raw(r#"{"x402Version":1,"scheme":"exact","network":"bsv-mainnet","payload":{"transaction":5}}"#),
        ] {
            assert!(
                matches!(decode(&text), Err(ProofError::MalformedEnvelope(_))),
                "{text}"
            );
            assert!(extract_transaction(&text).is_err());
        }
    }

    #[test]
    fn validate_accepts_good_envelope() {
        let report = validate(&encode("00ff", Network::Mainnet, None).unwrap());
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn validate_aggregates_all_violations() {
        let text = raw(
            r#"{"x402Version":2,"scheme":"upto","network":"eth-mainnet","payload":{"transaction":""}}"#,
        );
        let report = validate(&text);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 4);
        assert!(report.errors.iter().any(|e| e.contains("x402Version")));
        assert!(report.errors.iter().any(|e| e.contains("scheme")));
        assert!(report.errors.iter().any(|e| e.contains("network")));
        assert!(report.errors.iter().any(|e| e.contains("empty")));
    }

    #[test]
    fn validate_flags_non_hex() {
        let text = raw(
            r#"{"x402Version":1,"scheme":"exact","network":"bsv-testnet","payload":{"transaction":"xyz0"}}"#,
        );
        let report = validate(&text);
        assert_eq!(report.errors, vec!["payload.transaction is not hex".to_string()]);
    }

    #[test]
    fn validate_reports_decode_failure() {
        let report = validate("%%%");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("malformed payment envelope"));
    }

    #[test]
    fn unknown_network_tag() {
        let env = PaymentEnvelope {
            network: "bsv-stn".into(),
            ..PaymentEnvelope::new("00", Network::Mainnet, None).unwrap()
        };
        assert_eq!(
            env.wallet_network().unwrap_err(),
            ProofError::UnknownNetwork("bsv-stn".into())
        );
    }

    proptest! {
        #[test]
        fn extract_returns_exact_hex(
            hex in "([0-9a-fA-F]{2}){1,200}",
            testnet in any::<bool>(),
        ) {
            let network = if testnet { Network::Testnet } else { Network::Mainnet };
            let text = encode(&hex, network, None).unwrap();
            prop_assert_eq!(extract_transaction(&text).unwrap(), hex);
            prop_assert!(validate(&text).valid);
        }
    }
}
