use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to add and switch to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDefinition {
    pub chain_id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_url: String,
    pub explorer_url: String,
}

/// Parameter object of `wallet_addEthereumChain` (EIP-3085).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEthereumChainParameter {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl ChainDefinition {
    pub fn polygon_amoy() -> Self {
        Self {
            chain_id: 80002,
            name: "Polygon Amoy Testnet".to_string(),
            native_currency: NativeCurrency {
                name: "POL".to_string(),
                symbol: "POL".to_string(),
                decimals: 18,
            },
            rpc_url: "https://rpc-amoy.polygon.technology".to_string(),
            explorer_url: "https://www.oklink.com/amoy".to_string(),
        }
    }

    pub fn sepolia() -> Self {
        Self {
            chain_id: 11155111,
            name: "Sepolia".to_string(),
            native_currency: NativeCurrency {
                name: "Sepolia Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            rpc_url: "https://rpc.sepolia.org".to_string(),
            explorer_url: "https://sepolia.etherscan.io".to_string(),
        }
    }

    pub fn presets() -> Vec<Self> {
        vec![Self::polygon_amoy(), Self::sepolia()]
    }

    /// Looks a preset up by short name (`amoy`, `sepolia`) or decimal chain id.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "amoy" | "polygon-amoy" | "polygon_amoy" => Some(Self::polygon_amoy()),
            "sepolia" => Some(Self::sepolia()),
            other => other
                .parse::<u64>()
                .ok()
                .and_then(|id| Self::presets().into_iter().find(|c| c.chain_id == id)),
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    pub fn add_chain_parameter(&self) -> AddEthereumChainParameter {
        AddEthereumChainParameter {
            chain_id: self.chain_id_hex(),
            chain_name: self.name.clone(),
            native_currency: self.native_currency.clone(),
            rpc_urls: vec![self.rpc_url.clone()],
            block_explorer_urls: vec![self.explorer_url.clone()],
        }
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }

    pub fn token_url(&self, contract: &str, token_id: &str) -> String {
        format!("{}/token/{}/token/{}", self.explorer_url, contract, token_id)
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }
}

/// Account and network the wallet is currently on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSession {
    pub address: String,
    pub chain_id: u64,
}
