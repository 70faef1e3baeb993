pub mod contract;
pub mod receipt;

use crate::{
    config::RortalConfig,
    error::{MintError, Result, RortalError},
    generation::{GenerationManager, ImageGenerationClient},
    ipfs::{PinataClient, PinningService},
    logger::Timer,
    models::{
        ChainDefinition, GenerationRequest, GenerationResult, MintReceipt, MintStage, MintState,
        PinResult, TokenMetadata, TransactionReceipt,
    },
    retry::RetryPolicy,
    wallet::WalletAdapter,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use contract::{fetch_receipt, NftContract};
pub use receipt::{extract_token_id, transfer_topic};

/// Where the image for a mint comes from. Exactly one source per run.
#[derive(Debug, Clone)]
pub enum MintSource {
    Generate(GenerationRequest),
    Supplied(GenerationResult),
}

impl MintSource {
    fn prompt(&self) -> Option<&str> {
        match self {
            MintSource::Generate(request) => Some(request.prompt.as_str()),
            MintSource::Supplied(_) => None,
        }
    }
}

/// Drives generate -> pin -> mint and publishes every state change.
///
/// `run` takes `&mut self`, so one orchestrator never has two sequences in
/// flight. Observers read progress through `subscribe` or `state_stream`.
pub struct MintOrchestrator {
    generator: Arc<dyn ImageGenerationClient>,
    pinner: Arc<dyn PinningService>,
    wallet: WalletAdapter,
    contract: NftContract,
    chain: ChainDefinition,
    pin_metadata: bool,
    receipt_retry: RetryPolicy,
    state: watch::Sender<MintState>,
}

impl MintOrchestrator {
    pub fn new(
        generator: Arc<dyn ImageGenerationClient>,
        pinner: Arc<dyn PinningService>,
        wallet: WalletAdapter,
        contract: NftContract,
        chain: ChainDefinition,
    ) -> Self {
        let (state, _) = watch::channel(MintState::Idle);
        Self {
            generator,
            pinner,
            wallet,
            contract,
            chain,
            pin_metadata: false,
            receipt_retry: RetryPolicy::receipt_polling(),
            state,
        }
    }

    pub fn from_config(config: &RortalConfig) -> Result<Self> {
        let generator = GenerationManager::new(&config.generation).backend();
        let pinner: Arc<dyn PinningService> = Arc::new(PinataClient::new(&config.pinata));
        let wallet = WalletAdapter::from_rpc_url(config.wallet_rpc_url.as_deref());
        let contract = NftContract::new(&config.contract_address)?;

        Ok(Self::new(generator, pinner, wallet, contract, config.chain.clone())
            .with_metadata_pinning(config.pin_metadata)
            .with_receipt_retry(config.receipt_retry.clone()))
    }

    /// Pin an ERC-721 metadata document and use its URI as the token URI.
    pub fn with_metadata_pinning(mut self, enabled: bool) -> Self {
        self.pin_metadata = enabled;
        self
    }

    pub fn with_receipt_retry(mut self, policy: RetryPolicy) -> Self {
        self.receipt_retry = policy;
        self
    }

    pub fn state(&self) -> MintState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MintState> {
        self.state.subscribe()
    }

    /// Current state first, then every change.
    pub fn state_stream(&self) -> WatchStream<MintState> {
        WatchStream::new(self.subscribe())
    }

    pub fn wallet(&self) -> &WalletAdapter {
        &self.wallet
    }

    pub fn contract(&self) -> &NftContract {
        &self.contract
    }

    pub fn chain(&self) -> &ChainDefinition {
        &self.chain
    }

    /// Back to `Idle` after a terminal state.
    pub fn reset(&mut self) {
        self.transition(MintState::Idle);
    }

    /// Runs one full sequence. Stages never overlap and a failure stops the
    /// sequence: nothing is pinned without an image and nothing is minted
    /// without a pin. A run starts only from `Idle`; call `reset` after a
    /// terminal state.
    pub async fn run(&mut self, source: MintSource) -> Result<MintReceipt> {
        let current = self.state.borrow().label();
        if current != MintState::Idle.label() {
            return Err(MintError::NotIdle(current.to_string()).into());
        }
        let prompt = source.prompt().map(str::to_string);

        self.transition(MintState::Generating);
        let image = match source {
            MintSource::Generate(request) => {
                let _timer = Timer::new("generate image");
                self.generator
                    .generate(&request)
                    .await
                    .map_err(|e| self.fail(MintStage::Generating, e.into()))?
            }
            MintSource::Supplied(image) => {
                log::info!("🖼️  Using supplied {} image ({} bytes)", image.mime_type(), image.len());
                image
            }
        };

        self.transition(MintState::Uploading);
        let token_uri = {
            let _timer = Timer::new("pin to IPFS");
            self.pin(&image, prompt.as_deref())
                .await
                .map_err(|e| self.fail(MintStage::Uploading, e))?
        };

        self.transition(MintState::Minting);
        let receipt = {
            let _timer = Timer::new("mint token");
            self.mint(&token_uri)
                .await
                .map_err(|e| self.fail(MintStage::Minting, e))?
        };

        log::info!(
            "🎉 Minted token #{} in {}",
            receipt.token_id,
            receipt.transaction_hash
        );
        log::info!(
            "🔗 {}",
            self.chain.token_url(&receipt.contract_address, &receipt.token_id)
        );
        self.transition(MintState::Confirmed(receipt.clone()));
        Ok(receipt)
    }

    async fn pin(&self, image: &GenerationResult, prompt: Option<&str>) -> Result<String> {
        let filename = format!("generated-image.{}", image.file_extension());
        let pinned = self
            .pinner
            .upload(image.image_bytes(), &filename, image.mime_type())
            .await?;
        log::info!("📌 Image available at {}", crate::models::gateway_url(&pinned.token_uri()));

        if !self.pin_metadata {
            return Ok(pinned.token_uri());
        }

        let metadata = TokenMetadata::for_image(&pinned, prompt);
        let document: PinResult = self
            .pinner
            .pin_json(&metadata, &format!("{}-metadata", pinned.cid))
            .await?;
        Ok(document.token_uri())
    }

    async fn mint(&self, token_uri: &str) -> Result<MintReceipt> {
        let session = self.wallet.ensure_connected().await?;
        if session.chain_id != self.chain.chain_id {
            log::warn!(
                "Wallet is on chain {}, expected {} ({})",
                session.chain_id,
                self.chain.chain_id,
                self.chain.name
            );
            self.wallet.ensure_chain(&self.chain).await?;
        }

        let tx_hash = self
            .contract
            .send_mint(&self.wallet, &session.address, token_uri)
            .await?;
        log::info!("⛓️  Mint submitted: {}", self.chain.tx_url(&tx_hash));

        let tx_receipt = self
            .contract
            .wait_for_receipt(&self.wallet, &tx_hash, &self.receipt_retry)
            .await?;
        let contract_address = self.contract.address_string();
        let token_id = extract_token_id(&tx_receipt, Some(&contract_address))?;

        Ok(MintReceipt {
            transaction_hash: tx_hash,
            token_id,
            contract_address,
            token_uri: token_uri.to_string(),
        })
    }

    fn fail(&self, stage: MintStage, error: RortalError) -> RortalError {
        log::error!("❌ Mint failed while {}: {}", stage, error);
        self.transition(MintState::Errored {
            stage,
            error: error.clone(),
        });
        error
    }

    fn transition(&self, next: MintState) {
        log::debug!("Mint state -> {}", next.label());
        self.state.send_replace(next);
    }
}

/// Resolves a past mint from its transaction hash.
pub async fn lookup_mint(
    wallet: &WalletAdapter,
    contract: &NftContract,
    tx_hash: &str,
) -> Result<(TransactionReceipt, String)> {
    let receipt = fetch_receipt(wallet, tx_hash)
        .await?
        .ok_or_else(|| RortalError::from(MintError::ReceiptTimeout(tx_hash.to_string())))?;
    let token_id = extract_token_id(&receipt, Some(&contract.address_string()))?;
    Ok((receipt, token_id))
}
