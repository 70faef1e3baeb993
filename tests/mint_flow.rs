mod common;

use common::{FakeProvider, RecordedRequest, StubResponse, StubServer, PNG_1X1_BASE64};
use futures::StreamExt;
use rortal::config::{Automatic1111Config, DEFAULT_CONTRACT_ADDRESS};
use rortal::generation::Automatic1111Client;
use rortal::{
    lookup_mint, ChainDefinition, ChainSwitchError, GenerationError, GenerationRequest,
    GenerationResult, MintError, MintOrchestrator, MintSource, MintStage, MintState, NftContract,
    PinataClient, PinataConfig, ProviderRpcError, RetryPolicy, RortalError, WalletAdapter,
    WalletError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
const TX_HASH: &str = "0xfeedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedface";
const TRANSFER: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
const ZERO_WORD: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
const OWNER_WORD: &str = "0x0000000000000000000000001111111111111111111111111111111111111111";
const TOKEN_1000: &str = "0x00000000000000000000000000000000000000000000000000000000000003e8";

fn quick(attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(attempts, Duration::from_millis(5))
}

fn receipt_json(status: &str, logs: Value) -> Value {
    json!({
        "transactionHash": TX_HASH,
        "status": status,
        "blockNumber": "0x5bd2",
        "from": ACCOUNT,
        "to": DEFAULT_CONTRACT_ADDRESS.to_lowercase(),
        "contractAddress": null,
        "logs": logs,
    })
}

fn transfer_logs() -> Value {
    json!([{
        "address": DEFAULT_CONTRACT_ADDRESS.to_lowercase(),
        "topics": [TRANSFER, ZERO_WORD, OWNER_WORD, TOKEN_1000],
        "data": "0x",
        "logIndex": "0x0",
    }])
}

/// Wallet already on Polygon Amoy that mints token 1000 after one pending receipt poll.
fn minting_wallet() -> FakeProvider {
    FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x13882")))
        .reply("eth_sendTransaction", Ok(json!(TX_HASH)))
        .reply("eth_getTransactionReceipt", Ok(Value::Null))
        .reply(
            "eth_getTransactionReceipt",
            Ok(receipt_json("0x1", transfer_logs())),
        )
}

fn sd_ok(_: &RecordedRequest) -> StubResponse {
    StubResponse::json(200, json!({ "images": [PNG_1X1_BASE64] }))
}

fn pinata_ok(req: &RecordedRequest) -> StubResponse {
    if req.path == "/pinning/pinJSONToIPFS" {
        StubResponse::json(200, json!({ "IpfsHash": "QmMeta" }))
    } else {
        StubResponse::json(200, json!({ "IpfsHash": "Qm123" }))
    }
}

struct Harness {
    sd: StubServer,
    pinata: StubServer,
    provider: Arc<FakeProvider>,
    orchestrator: MintOrchestrator,
}

async fn harness<F>(sd: F, provider: FakeProvider) -> Harness
where
    F: Fn(&RecordedRequest) -> StubResponse + Send + Sync + 'static,
{
    let sd = StubServer::start(sd).await;
    let pinata = StubServer::start(pinata_ok).await;
    let provider = Arc::new(provider);

    let generator = Automatic1111Client::new(
        &Automatic1111Config::default().with_url(sd.url()),
        quick(3),
    );
    let pinner = PinataClient::new(
        &PinataConfig::new()
            .with_url(pinata.url())
            .with_jwt("jwt")
            .with_retry(quick(3)),
    );
    let orchestrator = MintOrchestrator::new(
        Arc::new(generator),
        Arc::new(pinner),
        WalletAdapter::new(provider.clone()),
        NftContract::new(DEFAULT_CONTRACT_ADDRESS).unwrap(),
        ChainDefinition::polygon_amoy(),
    )
    .with_receipt_retry(quick(5));

    Harness {
        sd,
        pinata,
        provider,
        orchestrator,
    }
}

fn prompt() -> MintSource {
    MintSource::Generate(GenerationRequest::new("a red circle"))
}

#[tokio::test]
async fn prompt_to_confirmed_token() {
    let mut h = harness(sd_ok, minting_wallet()).await;

    let receipt = h.orchestrator.run(prompt()).await.unwrap();

    assert_eq!(receipt.token_id, "1000");
    assert_eq!(receipt.token_uri, "ipfs://Qm123");
    assert_eq!(receipt.transaction_hash, TX_HASH);
    assert_eq!(
        receipt.contract_address.to_lowercase(),
        DEFAULT_CONTRACT_ADDRESS.to_lowercase()
    );
    assert_eq!(h.orchestrator.state(), MintState::Confirmed(receipt.clone()));

    assert_eq!(h.sd.hits("/sdapi/v1/txt2img"), 1);
    let pin = &h.pinata.requests()[0];
    assert!(pin.body_text().contains("filename=\"generated-image.png\""));

    let send = h
        .provider
        .calls()
        .into_iter()
        .find(|(method, _)| method == "eth_sendTransaction")
        .unwrap()
        .1;
    let tx = &send[0];
    assert_eq!(tx["from"], ACCOUNT);
    assert_eq!(
        tx["to"].as_str().unwrap().to_lowercase(),
        DEFAULT_CONTRACT_ADDRESS.to_lowercase()
    );
    let data = tx["data"].as_str().unwrap();
    let selector = alloy_primitives::hex::encode(&alloy_primitives::keccak256("mintNFT(string)")[..4]);
    assert!(data.starts_with(&format!("0x{}", selector)));
    assert!(data.contains(&alloy_primitives::hex::encode("ipfs://Qm123")));

    assert_eq!(h.provider.count("eth_getTransactionReceipt"), 2);
    assert_eq!(h.provider.count("wallet_switchEthereumChain"), 0);
}

#[tokio::test]
async fn state_stream_follows_the_stages_in_order() {
    let mut h = harness(sd_ok, minting_wallet()).await;
    let mut stream = h.orchestrator.state_stream();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(state) = stream.next().await {
            seen.push(state.label());
        }
        seen
    });

    h.orchestrator.run(prompt()).await.unwrap();
    drop(h.orchestrator);
    let seen = observer.await.unwrap();

    let order = ["idle", "generating", "uploading", "minting", "confirmed"];
    let ranks: Vec<usize> = seen
        .iter()
        .map(|label| order.iter().position(|o| o == label).unwrap())
        .collect();
    assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&"confirmed"));
}

#[tokio::test]
async fn generation_failure_stops_before_pinning() {
    let mut h = harness(
        |_| StubResponse::json(500, json!({ "detail": "boom" })),
        minting_wallet(),
    )
    .await;

    let err = h.orchestrator.run(prompt()).await.unwrap_err();

    assert_eq!(
        err,
        RortalError::Generation(GenerationError::Http {
            status: Some(500),
            message: "boom".into(),
        })
    );
    assert_eq!(err.user_message(), "Failed to generate image");
    assert_eq!(h.sd.hits("/sdapi/v1/txt2img"), 3);
    assert!(h.pinata.requests().is_empty());
    assert!(h.provider.calls().is_empty());
    assert!(matches!(
        h.orchestrator.state(),
        MintState::Errored {
            stage: MintStage::Generating,
            ..
        }
    ));
}

#[tokio::test]
async fn rejected_chain_switch_never_sends_the_transaction() {
    let wallet = FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x1")))
        .reply(
            "wallet_switchEthereumChain",
            Err(ProviderRpcError::user_rejected()),
        );
    let mut h = harness(sd_ok, wallet).await;

    let err = h.orchestrator.run(prompt()).await.unwrap_err();

    assert!(matches!(
        err,
        RortalError::ChainSwitch(ChainSwitchError::Rejected { code: 4001, .. })
    ));
    assert_eq!(h.pinata.hits("/pinning/pinFileToIPFS"), 1);
    assert_eq!(h.provider.count("eth_sendTransaction"), 0);
    assert!(matches!(
        h.orchestrator.state(),
        MintState::Errored {
            stage: MintStage::Minting,
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_chain_is_added_before_minting() {
    let wallet = minting_wallet()
        .reply("eth_chainId", Ok(json!("0xaa36a7")))
        .reply(
            "wallet_switchEthereumChain",
            Err(ProviderRpcError::unrecognized_chain("0x13882")),
        )
        .reply("wallet_addEthereumChain", Ok(Value::Null))
        .reply("wallet_switchEthereumChain", Ok(Value::Null));
    let mut h = harness(sd_ok, wallet).await;

    let receipt = h.orchestrator.run(prompt()).await.unwrap();

    assert_eq!(receipt.token_id, "1000");
    assert_eq!(h.provider.count("wallet_addEthereumChain"), 1);
    assert_eq!(h.provider.count("wallet_switchEthereumChain"), 2);
}

#[tokio::test]
async fn receipt_without_transfer_event_has_no_token_id() {
    let wallet = FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x13882")))
        .reply("eth_sendTransaction", Ok(json!(TX_HASH)))
        .reply(
            "eth_getTransactionReceipt",
            Ok(receipt_json("0x1", json!([]))),
        );
    let mut h = harness(sd_ok, wallet).await;

    let err = h.orchestrator.run(prompt()).await.unwrap_err();

    assert_eq!(
        err,
        RortalError::Mint(MintError::TokenIdNotFound {
            transaction_hash: TX_HASH.into()
        })
    );
    assert!(err.user_message().contains(TX_HASH));
}

#[tokio::test]
async fn reverted_mint_is_reported() {
    let wallet = FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x13882")))
        .reply("eth_sendTransaction", Ok(json!(TX_HASH)))
        .reply(
            "eth_getTransactionReceipt",
            Ok(receipt_json("0x0", json!([]))),
        );
    let mut h = harness(sd_ok, wallet).await;

    let err = h.orchestrator.run(prompt()).await.unwrap_err();
    assert_eq!(
        err,
        RortalError::Mint(MintError::TransactionReverted(TX_HASH.into()))
    );
}

#[tokio::test]
async fn rejected_transaction_is_reported() {
    let wallet = FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x13882")))
        .reply("eth_sendTransaction", Err(ProviderRpcError::user_rejected()));
    let mut h = harness(sd_ok, wallet).await;

    let err = h.orchestrator.run(prompt()).await.unwrap_err();

    assert!(matches!(
        err,
        RortalError::Mint(MintError::TransactionRejected { code: 4001, .. })
    ));
    assert_eq!(h.provider.count("eth_getTransactionReceipt"), 0);
}

#[tokio::test]
async fn pending_receipt_times_out() {
    let wallet = FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x13882")))
        .reply("eth_sendTransaction", Ok(json!(TX_HASH)))
        .always("eth_getTransactionReceipt", Ok(Value::Null));
    let mut h = harness(sd_ok, wallet).await;

    let err = h.orchestrator.run(prompt()).await.unwrap_err();

    assert_eq!(
        err,
        RortalError::Mint(MintError::ReceiptTimeout(TX_HASH.into()))
    );
    assert_eq!(h.provider.count("eth_getTransactionReceipt"), 5);
}

#[tokio::test]
async fn missing_wallet_fails_after_pinning() {
    let sd = StubServer::start(sd_ok).await;
    let pinata = StubServer::start(pinata_ok).await;
    let mut orchestrator = MintOrchestrator::new(
        Arc::new(Automatic1111Client::new(
            &Automatic1111Config::default().with_url(sd.url()),
            quick(1),
        )),
        Arc::new(PinataClient::new(
            &PinataConfig::new().with_url(pinata.url()).with_jwt("jwt"),
        )),
        WalletAdapter::unavailable(),
        NftContract::new(DEFAULT_CONTRACT_ADDRESS).unwrap(),
        ChainDefinition::polygon_amoy(),
    );

    let err = orchestrator.run(prompt()).await.unwrap_err();

    assert_eq!(err, RortalError::Wallet(WalletError::Unavailable));
    assert_eq!(err.user_message(), "Please install MetaMask");
    assert_eq!(pinata.hits("/pinning/"), 1);
}

#[tokio::test]
async fn supplied_image_skips_generation() {
    let mut h = harness(sd_ok, minting_wallet()).await;
    let image = GenerationResult::new(vec![0xff, 0xd8, 0xff, 0xe0], "image/jpeg").unwrap();

    let receipt = h.orchestrator.run(MintSource::Supplied(image)).await.unwrap();

    assert_eq!(receipt.token_id, "1000");
    assert_eq!(h.sd.hits("/"), 0);
    let pin = &h.pinata.requests()[0];
    assert!(pin.body_text().contains("filename=\"generated-image.jpg\""));
    assert!(pin.body_text().contains("image/jpeg"));
}

#[tokio::test]
async fn metadata_pinning_uses_the_metadata_uri() {
    let mut h = harness(sd_ok, minting_wallet()).await;
    h.orchestrator = h.orchestrator.with_metadata_pinning(true);

    let receipt = h.orchestrator.run(prompt()).await.unwrap();

    assert_eq!(receipt.token_uri, "ipfs://QmMeta");
    let requests = h.pinata.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].path, "/pinning/pinJSONToIPFS");
    let metadata = requests[1].json();
    assert_eq!(metadata["pinataContent"]["image"], "ipfs://Qm123");
    assert_eq!(metadata["pinataContent"]["attributes"][0]["value"], "a red circle");
}

#[tokio::test]
async fn orchestrator_can_run_again_after_a_failure() {
    let wallet = FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x13882")))
        .reply("eth_sendTransaction", Err(ProviderRpcError::user_rejected()))
        .reply("eth_sendTransaction", Ok(json!(TX_HASH)))
        .reply(
            "eth_getTransactionReceipt",
            Ok(receipt_json("0x1", transfer_logs())),
        );
    let mut h = harness(sd_ok, wallet).await;

    assert!(h.orchestrator.run(prompt()).await.is_err());
    assert!(h.orchestrator.state().is_terminal());
    h.orchestrator.reset();
    assert_eq!(h.orchestrator.state(), MintState::Idle);

    let receipt = h.orchestrator.run(prompt()).await.unwrap();
    assert_eq!(receipt.token_id, "1000");
    assert_eq!(h.sd.hits("/sdapi/v1/txt2img"), 2);
}

#[tokio::test]
async fn confirmed_orchestrator_must_be_reset_before_minting_again() {
    let mut h = harness(sd_ok, minting_wallet()).await;
    let first = h.orchestrator.run(prompt()).await.unwrap();

    let err = h.orchestrator.run(prompt()).await.unwrap_err();

    assert_eq!(
        err,
        RortalError::Mint(MintError::NotIdle("confirmed".into()))
    );
    assert_eq!(h.orchestrator.state(), MintState::Confirmed(first));
    assert_eq!(h.sd.hits("/sdapi/v1/txt2img"), 1);
    assert_eq!(h.provider.count("eth_sendTransaction"), 1);
}

#[tokio::test]
async fn transfer_from_another_contract_is_not_credited() {
    let foreign = json!([{
        "address": "0x2222222222222222222222222222222222222222",
        "topics": [TRANSFER, ZERO_WORD, OWNER_WORD, TOKEN_1000],
        "data": "0x",
    }]);
    let wallet = FakeProvider::new()
        .always("eth_requestAccounts", Ok(json!([ACCOUNT])))
        .always("eth_chainId", Ok(json!("0x13882")))
        .reply("eth_sendTransaction", Ok(json!(TX_HASH)))
        .reply("eth_getTransactionReceipt", Ok(receipt_json("0x1", foreign)));
    let mut h = harness(sd_ok, wallet).await;

    let err = h.orchestrator.run(prompt()).await.unwrap_err();

    assert_eq!(
        err,
        RortalError::Mint(MintError::TokenIdNotFound {
            transaction_hash: TX_HASH.into()
        })
    );
}

fn abi_string(value: &str) -> String {
    let mut encoded = format!("0x{:064x}{:064x}", 32, value.len());
    let mut data = alloy_primitives::hex::encode(value);
    while data.len() % 64 != 0 {
        data.push('0');
    }
    encoded.push_str(&data);
    encoded
}

#[tokio::test]
async fn token_uri_is_read_with_eth_call() {
    let provider = Arc::new(
        FakeProvider::new().reply("eth_call", Ok(json!(abi_string("ipfs://Qm123")))),
    );
    let wallet = WalletAdapter::new(provider.clone());
    let contract = NftContract::new(DEFAULT_CONTRACT_ADDRESS).unwrap();

    let uri = contract.token_uri(&wallet, "1000").await.unwrap();

    assert_eq!(uri, "ipfs://Qm123");
    let params = &provider.calls()[0].1;
    assert_eq!(params[1], "latest");
    let selector = alloy_primitives::hex::encode(&alloy_primitives::keccak256("tokenURI(uint256)")[..4]);
    let data = params[0]["data"].as_str().unwrap();
    assert!(data.starts_with(&format!("0x{}", selector)));
    assert!(data.ends_with("03e8"));
}

#[tokio::test]
async fn owner_is_read_with_eth_call() {
    let owner_word = format!("0x{:0>64}", "1111111111111111111111111111111111111111");
    let provider = Arc::new(FakeProvider::new().reply("eth_call", Ok(json!(owner_word))));
    let wallet = WalletAdapter::new(provider.clone());
    let contract = NftContract::new(DEFAULT_CONTRACT_ADDRESS).unwrap();

    let owner = contract.owner_of(&wallet, "1000").await.unwrap();

    assert_eq!(owner, ACCOUNT);
    let params = &provider.calls()[0].1;
    assert_eq!(
        params[0]["to"].as_str().unwrap().to_lowercase(),
        DEFAULT_CONTRACT_ADDRESS.to_lowercase()
    );
    let selector = alloy_primitives::hex::encode(&alloy_primitives::keccak256("ownerOf(uint256)")[..4]);
    let data = params[0]["data"].as_str().unwrap();
    assert!(data.starts_with(&format!("0x{}", selector)));
    assert!(data.ends_with("03e8"));
}

#[tokio::test]
async fn owner_of_a_burned_token_surfaces_the_revert() {
    let provider = Arc::new(FakeProvider::new().reply(
        "eth_call",
        Err(ProviderRpcError::new(3, "execution reverted: ERC721: invalid token ID")),
    ));
    let wallet = WalletAdapter::new(provider);
    let contract = NftContract::new(DEFAULT_CONTRACT_ADDRESS).unwrap();

    let err = contract.owner_of(&wallet, "1000").await.unwrap_err();
    assert!(matches!(err, RortalError::Mint(MintError::Rpc(_))));
    assert!(matches!(
        contract.owner_of(&wallet, "not-a-number").await,
        Err(RortalError::Config(_))
    ));
}

#[tokio::test]
async fn lookup_resolves_token_id_from_a_past_transaction() {
    let provider = Arc::new(FakeProvider::new().reply(
        "eth_getTransactionReceipt",
        Ok(receipt_json("0x1", transfer_logs())),
    ));
    let wallet = WalletAdapter::new(provider.clone());
    let contract = NftContract::new(DEFAULT_CONTRACT_ADDRESS).unwrap();

    let (receipt, token_id) = lookup_mint(&wallet, &contract, TX_HASH).await.unwrap();

    assert_eq!(token_id, "1000");
    assert_eq!(receipt.block_number.as_deref(), Some("0x5bd2"));
    assert_eq!(provider.calls()[0].1, json!([TX_HASH]));
}
