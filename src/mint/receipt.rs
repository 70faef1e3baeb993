use crate::{
    error::MintError,
    mint::contract::abi,
    models::{ReceiptLog, TransactionReceipt},
};
use alloy_primitives::{B256, U256};
use alloy_sol_types::SolEvent;

/// keccak256("Transfer(address,address,uint256)")
pub fn transfer_topic() -> B256 {
    abi::Transfer::SIGNATURE_HASH
}

/// Pulls the minted token id out of the receipt's raw ERC-721 Transfer log.
///
/// A log qualifies when its first topic is the Transfer signature and it has
/// the three indexed arguments; ERC-20 transfers share the signature but carry
/// only two indexed topics. With a `contract`, only its own logs count;
/// without one, the first qualifying log is used.
pub fn extract_token_id(receipt: &TransactionReceipt, contract: Option<&str>) -> Result<String, MintError> {
    if !receipt.succeeded() {
        return Err(MintError::TransactionReverted(receipt.transaction_hash.clone()));
    }

    let transfers: Vec<&ReceiptLog> = receipt.logs.iter().filter(|log| is_nft_transfer(log)).collect();
    let chosen = match contract {
        Some(address) => transfers
            .iter()
            .find(|log| log.address.eq_ignore_ascii_case(address))
            .copied(),
        None => transfers.first().copied(),
    };

    chosen
        .and_then(|log| parse_word(&log.topics[3]))
        .map(|id| id.to_string())
        .ok_or_else(|| MintError::TokenIdNotFound {
            transaction_hash: receipt.transaction_hash.clone(),
        })
}

fn is_nft_transfer(log: &ReceiptLog) -> bool {
    log.topics.len() >= 4
        && log
            .topics
            .first()
            .and_then(|topic| topic.parse::<B256>().ok())
            .is_some_and(|topic| topic == transfer_topic())
}

/// Parses a 32-byte hex word; shorter values are treated as left-padded.
fn parse_word(value: &str) -> Option<U256> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if hex.is_empty() || hex.len() > 64 {
        return None;
    }
    U256::from_str_radix(hex, 16).ok()
}
