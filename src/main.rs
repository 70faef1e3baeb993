use clap::{Parser, Subcommand};
use futures::StreamExt;
use rortal::{
    logger, models::gateway_url, ChainDefinition, GenerationManager, GenerationRequest,
    GenerationResult, IpfsGateway, MintOrchestrator, MintSource, MintState, PinataClient,
    RortalConfig, Sampler, TokenContent,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "rortal", version, about = "Generate an image, pin it to IPFS and mint it as an NFT")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate (or load) an image, pin it and mint it
    Mint(MintArgs),
    /// Resolve the token id minted by a transaction
    Lookup {
        #[arg(long)]
        tx: String,
    },
    /// Read tokenURI(id) from the collection
    TokenUri {
        #[arg(long)]
        id: String,
    },
    /// List the supported networks
    Chains,
    /// List the supported image generation backends
    Backends,
    /// Verify the Pinata credentials
    CheckPinning,
}

#[derive(Debug, Parser)]
struct MintArgs {
    #[arg(long, required_unless_present = "image", conflicts_with = "image")]
    prompt: Option<String>,
    #[arg(long, default_value = "")]
    negative_prompt: String,
    #[arg(long, default_value_t = rortal::models::DEFAULT_STEPS)]
    steps: u32,
    #[arg(long, default_value_t = rortal::models::DEFAULT_CFG_SCALE)]
    cfg_scale: f32,
    #[arg(long, default_value_t = rortal::models::DEFAULT_SIZE)]
    width: u32,
    #[arg(long, default_value_t = rortal::models::DEFAULT_SIZE)]
    height: u32,
    #[arg(long, default_value = "lcm")]
    sampler: String,
    #[arg(long, default_value_t = rortal::models::RANDOM_SEED, allow_hyphen_values = true)]
    seed: i64,
    /// Mint an existing image file instead of generating one
    #[arg(long)]
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    logger::init()?;
    logger::log_startup_info("Rortal", env!("CARGO_PKG_VERSION"));
    if dotenv_loaded {
        log::debug!("✅ .env file loaded");
    } else {
        log::debug!("No .env file found, using system environment variables");
    }

    let cli = Cli::parse();
    let config = RortalConfig::from_env()?;
    logger::log_config_info(&config);

    match cli.command {
        Command::Mint(args) => mint(&config, args).await?,
        Command::Lookup { tx } => lookup(&config, &tx).await?,
        Command::TokenUri { id } => token_uri(&config, &id).await?,
        Command::Chains => {
            for chain in ChainDefinition::presets() {
                println!(
                    "{:<8} {:>10} ({}) {}",
                    chain.native_currency.symbol,
                    chain.chain_id,
                    chain.chain_id_hex(),
                    chain.name
                );
                println!("         rpc: {}  explorer: {}", chain.rpc_url, chain.explorer_url);
            }
        }
        Command::Backends => {
            for backend in GenerationManager::supported_backends() {
                println!(
                    "{:<14} {} ({}, {:?}) - {}",
                    backend.id, backend.name, backend.provider, backend.mode, backend.description
                );
            }
        }
        Command::CheckPinning => {
            let client = PinataClient::new(&config.pinata);
            if client.health_check().await? {
                println!("Pinata credentials are valid");
            } else {
                println!("Pinata rejected the configured credentials");
            }
        }
    }

    Ok(())
}

async fn mint(config: &RortalConfig, args: MintArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = match (&args.image, args.prompt.clone()) {
        (Some(path), _) => MintSource::Supplied(load_image(path)?),
        (None, Some(prompt)) => MintSource::Generate(
            GenerationRequest::new(prompt)
                .with_negative_prompt(args.negative_prompt.clone())
                .with_steps(args.steps)
                .with_cfg_scale(args.cfg_scale)
                .with_size(args.width, args.height)
                .with_sampler(Sampler::from_name(&args.sampler))
                .with_seed(args.seed),
        ),
        (None, None) => return Err("either --prompt or --image is required".into()),
    };

    let mut orchestrator = MintOrchestrator::from_config(config)?;
    let mut states = orchestrator.state_stream();
    let progress = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            match &state {
                MintState::Idle => {}
                MintState::Confirmed(_) => rortal::log_info!("Mint confirmed"),
                MintState::Errored { stage, error } => {
                    rortal::log_error!("Failed while {}: {}", stage, error.user_message())
                }
                busy => rortal::log_info!("Status: {}...", busy.label()),
            }
        }
    });

    let result = orchestrator.run(source).await;
    drop(orchestrator);
    let _ = progress.await;

    let receipt = result?;
    let chain = &config.chain;
    println!("Token ID:        {}", receipt.token_id);
    println!("Transaction:     {}", receipt.transaction_hash);
    println!("Token URI:       {}", receipt.token_uri);
    println!("Gateway:         {}", gateway_url(&receipt.token_uri));
    println!("Explorer (tx):   {}", chain.tx_url(&receipt.transaction_hash));
    println!(
        "Explorer (token): {}",
        chain.token_url(&receipt.contract_address, &receipt.token_id)
    );
    Ok(())
}

async fn lookup(config: &RortalConfig, tx_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = read_only(config)?;
    let (receipt, token_id) =
        rortal::lookup_mint(orchestrator.wallet(), orchestrator.contract(), tx_hash).await?;

    println!("Token ID:    {}", token_id);
    println!("Status:      {}", if receipt.succeeded() { "success" } else { "reverted" });
    if let Some(from) = &receipt.from {
        println!("From:        {}", from);
    }
    if let Some(block) = &receipt.block_number {
        println!("Block:       {}", block);
    }
    println!("Explorer:    {}", config.chain.tx_url(tx_hash));
    show_token(config, &orchestrator, &token_id).await;
    Ok(())
}

async fn token_uri(config: &RortalConfig, token_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = read_only(config)?;
    println!("Token ID:    {}", token_id);
    show_token(config, &orchestrator, token_id).await;
    Ok(())
}

/// Token URI, metadata and owner. Each read is independent, so one failing
/// does not hide the others.
async fn show_token(config: &RortalConfig, orchestrator: &MintOrchestrator, token_id: &str) {
    let contract = orchestrator.contract();
    let wallet = orchestrator.wallet();

    match contract.token_uri(wallet, token_id).await {
        Ok(uri) => {
            println!("Token URI:   {}", uri);
            if uri.starts_with(rortal::models::IPFS_SCHEME) {
                let gateway = IpfsGateway::new(config.gateway_url.as_str());
                println!("Gateway:     {}", gateway.url_for(&uri));
                match gateway.fetch(&uri).await {
                    Ok(TokenContent::Metadata(metadata)) => {
                        println!("Name:        {}", metadata.name);
                        println!("Description: {}", metadata.description);
                        println!("Image:       {}", gateway.url_for(&metadata.image));
                        for attribute in &metadata.attributes {
                            println!("  {}: {}", attribute.trait_type, attribute.value);
                        }
                    }
                    Ok(TokenContent::Media { mime_type, size }) => {
                        println!("Content:     {} ({} bytes)", mime_type, size);
                    }
                    Err(e) => println!("Metadata:    unavailable ({})", e),
                }
            }
        }
        Err(e) => println!("Token URI:   unavailable ({})", e),
    }

    match contract.owner_of(wallet, token_id).await {
        Ok(owner) => println!("Owner:       {}", owner),
        Err(e) => println!("Owner:       unavailable ({})", e),
    }
    println!(
        "Explorer (token): {}",
        config.chain.token_url(&contract.address_string(), token_id)
    );
}

/// Read calls fall back to the chain's public RPC when no wallet endpoint is set.
fn read_only(config: &RortalConfig) -> rortal::Result<MintOrchestrator> {
    let mut config = config.clone();
    if config.wallet_rpc_url.is_none() {
        config.wallet_rpc_url = Some(config.chain.rpc_url.clone());
    }
    MintOrchestrator::from_config(&config)
}

fn load_image(path: &Path) -> Result<GenerationResult, Box<dyn std::error::Error>> {
    let mime_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    };
    let bytes = fs::read(path)?;
    Ok(GenerationResult::new(bytes, mime_type)?)
}
