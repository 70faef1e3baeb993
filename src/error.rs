use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Generation backend HTTP error{}: {message}", status_suffix(.status))]
    Http {
        status: Option<u16>,
        message: String,
    },
    #[error("Generation job {0} faulted on the backend")]
    Faulted(String),
    #[error("Generation timed out after {attempts} status checks")]
    Timeout { attempts: u32 },
    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),
    #[error("Generation backend returned an empty image")]
    EmptyImage,
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// Transport failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Http { status: None, .. } => true,
            GenerationError::Http {
                status: Some(code), ..
            } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("Pinning service credentials are missing")]
    MissingCredentials,
    #[error("Refusing to pin an empty payload")]
    EmptyPayload,
    #[error("Pinning service HTTP error{}: {message}", status_suffix(.status))]
    Http {
        status: Option<u16>,
        message: String,
    },
    #[error("Pinning request exceeded its {0:?} deadline")]
    Timeout(Duration),
    #[error("Malformed pinning response: {0}")]
    MalformedResponse(String),
}

impl UploadError {
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Timeout(_) => true,
            UploadError::Http { status: None, .. } => true,
            UploadError::Http {
                status: Some(code), ..
            } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    #[error("No wallet provider is available")]
    Unavailable,
    #[error("Wallet returned no accounts")]
    NoAccounts,
    #[error("Wallet RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Malformed wallet response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainSwitchError {
    #[error("Chain switch rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("Adding chain to wallet failed ({code}): {message}")]
    AddFailed { code: i64, message: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MintError {
    #[error("Mint transaction rejected ({code}): {message}")]
    TransactionRejected { code: i64, message: String },
    #[error("Mint transaction {0} reverted")]
    TransactionReverted(String),
    #[error("No receipt for transaction {0} within the polling budget")]
    ReceiptTimeout(String),
    #[error("Transaction {transaction_hash} has no Transfer event; token id unknown")]
    TokenIdNotFound { transaction_hash: String },
    #[error("RPC error while minting: {0}")]
    Rpc(String),
    #[error("Malformed transaction receipt: {0}")]
    MalformedReceipt(String),
    #[error("A mint can only start from idle (currently {0}); reset first")]
    NotIdle(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RortalError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    ChainSwitch(#[from] ChainSwitchError),
    #[error(transparent)]
    Mint(#[from] MintError),
    #[error("Could not fetch token metadata: {0}")]
    Metadata(String),
}

impl RortalError {
    /// Single message suitable for showing to the person who started the mint.
    pub fn user_message(&self) -> String {
        match self {
            RortalError::Config(msg) => format!("Rortal is misconfigured: {}", msg),
            RortalError::Generation(GenerationError::Faulted(_)) => {
                "The image generator failed to render your prompt. Please try again.".to_string()
            }
            RortalError::Generation(GenerationError::Timeout { .. }) => {
                "Image generation took too long. Please try again later.".to_string()
            }
            RortalError::Generation(GenerationError::InvalidRequest(msg)) => {
                format!("Invalid prompt settings: {}", msg)
            }
            RortalError::Generation(_) => "Failed to generate image".to_string(),
            RortalError::Upload(UploadError::MissingCredentials) => {
                "IPFS pinning is not configured".to_string()
            }
            RortalError::Upload(_) => "Failed to upload image to IPFS".to_string(),
            RortalError::Wallet(WalletError::Unavailable) => "Please install MetaMask".to_string(),
            RortalError::Wallet(_) => "Could not connect to your wallet".to_string(),
            RortalError::ChainSwitch(ChainSwitchError::Rejected { .. }) => {
                "Please switch to the target network".to_string()
            }
            RortalError::ChainSwitch(ChainSwitchError::AddFailed { .. }) => {
                "Your wallet could not add the target network".to_string()
            }
            RortalError::Mint(MintError::TransactionRejected { .. }) => {
                "The mint transaction was rejected".to_string()
            }
            RortalError::Mint(MintError::TokenIdNotFound { transaction_hash }) => format!(
                "Minted in {} but the token id could not be determined",
                transaction_hash
            ),
            RortalError::Mint(MintError::NotIdle(_)) => {
                "A mint has already finished; start over to mint again".to_string()
            }
            RortalError::Mint(_) => "Failed to mint NFT".to_string(),
            RortalError::Metadata(_) => "Could not fetch token metadata".to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" {}", s)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, RortalError>;
