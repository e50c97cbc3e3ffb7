//! Chain client configuration.

use std::time::Duration;

use satchel_core::address::Network;

use crate::retry::RetryPolicy;

/// Default indexer base URL; the network segment is appended per network.
pub const DEFAULT_API_BASE: &str = "https://api.whatsonchain.com/v1/bsv";

/// Default per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    pub network: Network,
    /// Base URL without the `main` / `test` segment.
    pub api_base: String,
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ChainConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            api_base: DEFAULT_API_BASE.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Indexer path segment for the network.
    pub fn network_segment(&self) -> &'static str {
        match self.network {
            Network::Mainnet => "main",
            Network::Testnet => "test",
        }
    }

    /// Full base URL including the network segment.
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            self.network_segment()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls() {
        assert_eq!(
            ChainConfig::new(Network::Mainnet).base_url(),
            "https://api.whatsonchain.com/v1/bsv/main"
        );
        assert_eq!(
            ChainConfig::new(Network::Testnet).base_url(),
            "https://api.whatsonchain.com/v1/bsv/test"
        );
    }

    #[test]
    fn trailing_slash_trimmed() {
        let mut cfg = ChainConfig::new(Network::Testnet);
        cfg.api_base = "http://localhost:8080/v1/bsv/".into();
        assert_eq!(cfg.base_url(), "http://localhost:8080/v1/bsv/test");
    }
}
