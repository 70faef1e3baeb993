pub mod http_provider;
pub mod provider;

use crate::{
    error::{ChainSwitchError, RortalError, WalletError},
    models::{ChainDefinition, WalletSession},
};
use serde_json::{json, Value};
use std::sync::Arc;

pub use http_provider::HttpProvider;
pub use provider::{Eip1193Provider, ProviderRpcError, UNRECOGNIZED_CHAIN, USER_REJECTED_REQUEST};

/// Connection and network management on top of an injected provider.
/// The active chain is wallet-level state outside our control; nothing is cached here.
#[derive(Clone)]
pub struct WalletAdapter {
    provider: Option<Arc<dyn Eip1193Provider>>,
}

impl WalletAdapter {
    pub fn new(provider: Arc<dyn Eip1193Provider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// An adapter with no injected provider; every call fails with `WalletError::Unavailable`.
    pub fn unavailable() -> Self {
        Self { provider: None }
    }

    pub fn from_rpc_url(url: Option<&str>) -> Self {
        match url {
            Some(url) => Self::new(Arc::new(HttpProvider::new(url))),
            None => Self::unavailable(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Raw passthrough, RPC failures surfaced as `WalletError::Rpc`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let provider = self.provider.as_ref().ok_or(WalletError::Unavailable)?;
        provider
            .request(method, params)
            .await
            .map_err(|e| WalletError::Rpc {
                code: e.code,
                message: e.message,
            })
    }

    /// Prompts for account access if needed and reports the active account and chain.
    pub async fn ensure_connected(&self) -> Result<WalletSession, WalletError> {
        let accounts = self.request("eth_requestAccounts", json!([])).await?;
        let address = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .ok_or(WalletError::NoAccounts)?
            .to_string();

        let chain_id = self.chain_id().await?;
        log::info!("Wallet connected: {} on chain {}", address, chain_id);
        Ok(WalletSession { address, chain_id })
    }

    pub async fn chain_id(&self) -> Result<u64, WalletError> {
        let value = self.request("eth_chainId", json!([])).await?;
        value
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| WalletError::MalformedResponse(format!("eth_chainId returned {}", value)))
    }

    /// Switches the wallet to `chain`. When the wallet does not know the chain
    /// (4902) it is asked to add it once, then the switch is retried.
    pub async fn ensure_chain(&self, chain: &ChainDefinition) -> Result<(), RortalError> {
        let provider = self.provider.as_ref().ok_or(WalletError::Unavailable)?;
        let switch_params = json!([{ "chainId": chain.chain_id_hex() }]);

        log::info!("Requesting switch to {} ({})", chain.name, chain.chain_id_hex());
        let err = match provider
            .request("wallet_switchEthereumChain", switch_params.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        if err.code != UNRECOGNIZED_CHAIN {
            log::warn!("Chain switch refused: {}", err);
            return Err(ChainSwitchError::Rejected {
                code: err.code,
                message: err.message,
            }
            .into());
        }

        log::info!("Wallet does not know {}, asking it to add the chain", chain.name);
        let add_params = serde_json::to_value(chain.add_chain_parameter())
            .map_err(|e| RortalError::Config(e.to_string()))?;
        provider
            .request("wallet_addEthereumChain", json!([add_params]))
            .await
            .map_err(|e| ChainSwitchError::AddFailed {
                code: e.code,
                message: e.message,
            })?;

        provider
            .request("wallet_switchEthereumChain", switch_params)
            .await
            .map_err(|e| ChainSwitchError::Rejected {
                code: e.code,
                message: e.message,
            })?;
        Ok(())
    }
}

/// Parses an Ethereum JSON-RPC quantity (`0x`-prefixed hex); bare decimals are tolerated.
pub fn parse_quantity(value: &str) -> Option<u64> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some("") => None,
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}
