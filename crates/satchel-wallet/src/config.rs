//! Satchel configuration loaded from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `SATCHEL_HOME` | `~/.satchel` |
//! | `SATCHEL_NETWORK` | `mainnet` |
//! | `SATCHEL_FEE_RATE` | `0.5` sat/byte |
//! | `SATCHEL_CHAIN_API` | WhatsOnChain |
//! | `SATCHEL_HTTP_TIMEOUT_SECS` | `30` |

use std::path::PathBuf;
use std::time::Duration;

use satchel_chain::ChainConfig;
use satchel_chain::config::{DEFAULT_API_BASE, DEFAULT_HTTP_TIMEOUT};
use satchel_core::address::Network;

use crate::coin_selection::{DEFAULT_FEE_RATE, check_fee_rate};
use crate::error::WalletError;

#[derive(Clone, Debug, PartialEq)]
pub struct SatchelConfig {
    /// Root directory; wallet records live under `home/wallets`.
    pub home: PathBuf,
    pub network: Network,
    /// Satoshis per byte.
    pub fee_rate: f64,
    /// Indexer base URL, without the network segment.
    pub chain_api: String,
    pub http_timeout_secs: u64,
}

impl Default for SatchelConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            network: Network::Mainnet,
            fee_rate: DEFAULT_FEE_RATE,
            chain_api: DEFAULT_API_BASE.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
        }
    }
}

impl SatchelConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let home = lookup("SATCHEL_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.home);

        let network = match lookup("SATCHEL_NETWORK") {
            Some(v) => v.parse::<Network>().map_err(|_| {
                WalletError::Validation(format!("SATCHEL_NETWORK must be mainnet or testnet, got {v:?}"))
            })?,
            None => defaults.network,
        };

        let fee_rate = match lookup("SATCHEL_FEE_RATE") {
            Some(v) => {
                let rate = v.trim().parse::<f64>().map_err(|_| {
                    WalletError::Validation(format!("SATCHEL_FEE_RATE must be a number, got {v:?}"))
                })?;
                check_fee_rate(rate)?;
                rate
            }
            None => defaults.fee_rate,
        };

        let chain_api = lookup("SATCHEL_CHAIN_API")
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.chain_api);

        let http_timeout_secs = match lookup("SATCHEL_HTTP_TIMEOUT_SECS") {
            Some(v) => v.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                WalletError::Validation(format!(
                    "SATCHEL_HTTP_TIMEOUT_SECS must be a positive integer, got {v:?}"
                ))
            })?,
            None => defaults.http_timeout_secs,
        };

        Ok(Self {
            home,
            network,
            fee_rate,
            chain_api,
            http_timeout_secs,
        })
    }

    /// Directory holding wallet records.
    pub fn wallets_dir(&self) -> PathBuf {
        self.home.join("wallets")
    }

    /// Chain client settings for `network`, which may differ from the
    /// configured default when a wallet lives on the other network.
    pub fn chain_config(&self, network: Network) -> ChainConfig {
        ChainConfig {
            api_base: self.chain_api.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            ..ChainConfig::new(network)
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".satchel")
}
