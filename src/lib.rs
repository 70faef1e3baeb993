pub mod config;
pub mod error;
pub mod generation;
pub mod ipfs;
pub mod logger;
pub mod mint;
pub mod models;
pub mod retry;
pub mod wallet;

pub use config::{GenerationBackend, GenerationConfig, PinataConfig, RortalConfig};
pub use error::{
    ChainSwitchError, GenerationError, MintError, Result, RortalError, UploadError, WalletError,
};
pub use generation::{GenerationManager, ImageGenerationClient};
pub use ipfs::{IpfsGateway, PinataClient, PinningService};
pub use mint::{lookup_mint, MintOrchestrator, MintSource, NftContract};
pub use models::*;
pub use retry::{Backoff, RetryPolicy};
pub use wallet::{Eip1193Provider, HttpProvider, ProviderRpcError, WalletAdapter};
