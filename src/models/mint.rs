use crate::error::RortalError;
use serde::{Deserialize, Serialize};

/// Outcome of a confirmed mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub transaction_hash: String,
    /// Decimal string; token ids are uint256 and do not fit in a u64.
    pub token_id: String,
    pub contract_address: String,
    pub token_uri: String,
}

/// Subset of `eth_getTransactionReceipt` we rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

impl TransactionReceipt {
    /// Pre-Byzantium receipts carry no status; treat them as successful.
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0") | Some("0x00"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

/// Where in the sequence a mint failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintStage {
    Generating,
    Uploading,
    Minting,
}

impl std::fmt::Display for MintStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MintStage::Generating => "generating",
            MintStage::Uploading => "uploading",
            MintStage::Minting => "minting",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MintState {
    Idle,
    Generating,
    Uploading,
    Minting,
    Confirmed(MintReceipt),
    Errored { stage: MintStage, error: RortalError },
}

impl MintState {
    /// True while a sequence is in flight; front ends disable the mint action then.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            MintState::Generating | MintState::Uploading | MintState::Minting
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MintState::Confirmed(_) | MintState::Errored { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            MintState::Idle => "idle",
            MintState::Generating => "generating",
            MintState::Uploading => "uploading",
            MintState::Minting => "minting",
            MintState::Confirmed(_) => "confirmed",
            MintState::Errored { .. } => "errored",
        }
    }
}
