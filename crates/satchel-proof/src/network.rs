//! Mapping between wallet networks and envelope network tags.

use satchel_core::address::Network;

use crate::error::ProofError;

/// Every supported `(wallet network, envelope tag)` pair.
pub const NETWORK_TAGS: &[(Network, &str)] = &[
    (Network::Mainnet, "bsv-mainnet"),
    (Network::Testnet, "bsv-testnet"),
];

/// Envelope tag for a wallet network. A network without a row is an error.
pub fn envelope_tag(network: Network) -> Result<&'static str, ProofError> {
    tag_in(NETWORK_TAGS, network)
}

fn tag_in(table: &[(Network, &'static str)], network: Network) -> Result<&'static str, ProofError> {
    table
        .iter()
        .find(|(n, _)| *n == network)
        .map(|(_, tag)| *tag)
        .ok_or_else(|| ProofError::UnknownNetwork(network.to_string()))
}

/// Wallet network for an envelope tag, if the tag is known.
pub fn wallet_network(tag: &str) -> Option<Network> {
    NETWORK_TAGS
        .iter()
        .find(|(_, t)| *t == tag)
        .map(|(n, _)| *n)
}
