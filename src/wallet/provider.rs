use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// EIP-1193: the user rejected the request.
pub const USER_REJECTED_REQUEST: i64 = 4001;
/// EIP-1193: the provider does not support the method.
pub const UNSUPPORTED_METHOD: i64 = 4200;
/// MetaMask: the chain has not been added to the wallet.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
/// JSON-RPC internal error, also used for transport failures.
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_REQUEST, "User rejected the request.")
    }

    pub fn unrecognized_chain(chain_id_hex: &str) -> Self {
        Self::new(
            UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{}\".", chain_id_hex),
        )
    }

    pub fn unsupported_method(method: &str) -> Self {
        Self::new(UNSUPPORTED_METHOD, format!("unsupported method {}", method))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// The injected-wallet seam: a single `request` entry point, as browser
/// wallets expose it. Everything wallet-related flows through here so fakes
/// can stand in for a real wallet.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;
}
