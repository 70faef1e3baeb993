use crate::{
    error::{MintError, RortalError, WalletError},
    models::TransactionReceipt,
    retry::RetryPolicy,
    wallet::WalletAdapter,
};
use alloy_primitives::{hex, Address, U256};
use alloy_sol_types::SolCall;
use serde_json::{json, Value};

pub(crate) mod abi {
    alloy_sol_types::sol! {
        function mintNFT(string tokenURI) returns (uint256);
        function tokenURI(uint256 tokenId) returns (string);
        function ownerOf(uint256 tokenId) returns (address);
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

/// The ERC-721 collection tokens are minted into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftContract {
    address: Address,
}

impl NftContract {
    pub fn new(address: &str) -> Result<Self, RortalError> {
        let address = address
            .trim()
            .parse::<Address>()
            .map_err(|e| RortalError::Config(format!("invalid contract address '{}': {}", address, e)))?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// EIP-55 checksummed address.
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    pub fn mint_calldata(token_uri: &str) -> Vec<u8> {
        abi::mintNFTCall {
            tokenURI: token_uri.to_string(),
        }
        .abi_encode()
    }

    pub fn token_uri_calldata(token_id: U256) -> Vec<u8> {
        abi::tokenURICall { tokenId: token_id }.abi_encode()
    }

    pub fn owner_of_calldata(token_id: U256) -> Vec<u8> {
        abi::ownerOfCall { tokenId: token_id }.abi_encode()
    }

    /// Asks the wallet to sign and send `mintNFT(tokenURI)`; returns the transaction hash.
    pub async fn send_mint(
        &self,
        wallet: &WalletAdapter,
        from: &str,
        token_uri: &str,
    ) -> Result<String, RortalError> {
        let tx = json!([{
            "from": from,
            "to": self.address_string(),
            "data": hex::encode_prefixed(Self::mint_calldata(token_uri)),
        }]);

        log::info!("Sending mintNFT(\"{}\") to {}", token_uri, self.address_string());
        let hash = wallet
            .request("eth_sendTransaction", tx)
            .await
            .map_err(|e| match e {
                WalletError::Rpc { code, message } => {
                    RortalError::from(MintError::TransactionRejected { code, message })
                }
                other => other.into(),
            })?;

        hash.as_str()
            .map(str::to_string)
            .ok_or_else(|| MintError::Rpc(format!("eth_sendTransaction returned {}", hash)).into())
    }

    /// Polls for the receipt until it appears or the policy's budget runs out.
    pub async fn wait_for_receipt(
        &self,
        wallet: &WalletAdapter,
        tx_hash: &str,
        policy: &RetryPolicy,
    ) -> Result<TransactionReceipt, RortalError> {
        let receipt = policy
            .poll("Transaction receipt", |_| fetch_receipt(wallet, tx_hash))
            .await?;
        receipt.ok_or_else(|| MintError::ReceiptTimeout(tx_hash.to_string()).into())
    }

    /// Reads `tokenURI(tokenId)` through `eth_call`.
    pub async fn token_uri(&self, wallet: &WalletAdapter, token_id: &str) -> Result<String, RortalError> {
        let token_id = parse_token_id(token_id)?;
        let bytes = self.call(wallet, Self::token_uri_calldata(token_id)).await?;
        let decoded = abi::tokenURICall::abi_decode_returns(&bytes, true)
            .map_err(|e| MintError::Rpc(format!("could not decode tokenURI result: {}", e)))?;
        Ok(decoded._0)
    }

    /// Reads `ownerOf(tokenId)`; the owner comes back checksummed.
    pub async fn owner_of(&self, wallet: &WalletAdapter, token_id: &str) -> Result<String, RortalError> {
        let token_id = parse_token_id(token_id)?;
        let bytes = self.call(wallet, Self::owner_of_calldata(token_id)).await?;
        let decoded = abi::ownerOfCall::abi_decode_returns(&bytes, true)
            .map_err(|e| MintError::Rpc(format!("could not decode ownerOf result: {}", e)))?;
        Ok(decoded._0.to_checksum(None))
    }

    async fn call(&self, wallet: &WalletAdapter, data: Vec<u8>) -> Result<Vec<u8>, RortalError> {
        let call = json!([
            {
                "to": self.address_string(),
                "data": hex::encode_prefixed(data),
            },
            "latest"
        ]);

        let result = wallet
            .request("eth_call", call)
            .await
            .map_err(rpc_error)?;
        let encoded = result
            .as_str()
            .ok_or_else(|| MintError::Rpc(format!("eth_call returned {}", result)))?;
        let bytes = hex::decode(encoded.trim_start_matches("0x"))
            .map_err(|e| MintError::Rpc(format!("eth_call returned invalid hex: {}", e)))?;
        Ok(bytes)
    }
}

fn parse_token_id(token_id: &str) -> Result<U256, RortalError> {
    token_id
        .trim()
        .parse::<U256>()
        .map_err(|e| RortalError::Config(format!("invalid token id '{}': {}", token_id, e)))
}

/// Fetches a receipt; `Ok(None)` while the transaction is still pending.
pub async fn fetch_receipt(
    wallet: &WalletAdapter,
    tx_hash: &str,
) -> Result<Option<TransactionReceipt>, RortalError> {
    let value = wallet
        .request("eth_getTransactionReceipt", json!([tx_hash]))
        .await
        .map_err(rpc_error)?;
    if value == Value::Null {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| MintError::MalformedReceipt(e.to_string()).into())
}

fn rpc_error(e: WalletError) -> RortalError {
    match e {
        WalletError::Rpc { code, message } => {
            MintError::Rpc(format!("{} ({})", message, code)).into()
        }
        other => other.into(),
    }
}
