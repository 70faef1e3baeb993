use crate::{
    error::{Result, RortalError},
    models::{ChainDefinition, DEFAULT_GATEWAY_URL},
    retry::RetryPolicy,
};
use std::env;
use std::time::Duration;

pub const DEFAULT_SD_API_URL: &str = "http://127.0.0.1:7860";
pub const DEFAULT_HORDE_URL: &str = "https://stablehorde.net/api/v2";
/// Stable Horde accepts this key for anonymous, lowest-priority requests.
pub const ANONYMOUS_HORDE_KEY: &str = "0000000000";
pub const DEFAULT_HF_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_HF_MODEL: &str = "stabilityai/stable-diffusion-2-1";
pub const DEFAULT_PINATA_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_PIN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xd9Aa3fAe83B41f4F9835fB7ab7d087f0c91419ED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationBackend {
    #[default]
    Automatic1111,
    StableHorde,
    HuggingFace,
}

impl GenerationBackend {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "automatic1111" | "a1111" | "webui" | "sd" => Some(GenerationBackend::Automatic1111),
            "horde" | "stablehorde" | "stable-horde" => Some(GenerationBackend::StableHorde),
            "huggingface" | "hf" | "hugging-face" => Some(GenerationBackend::HuggingFace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationBackend::Automatic1111 => "automatic1111",
            GenerationBackend::StableHorde => "horde",
            GenerationBackend::HuggingFace => "huggingface",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Automatic1111Config {
    pub url: String,
}

impl Default for Automatic1111Config {
    fn default() -> Self {
        Automatic1111Config {
            url: DEFAULT_SD_API_URL.to_string(),
        }
    }
}

impl Automatic1111Config {
    pub fn from_env() -> Self {
        Automatic1111Config {
            url: env::var("SD_API_URL").unwrap_or_else(|_| DEFAULT_SD_API_URL.to_string()),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct HordeConfig {
    pub url: String,
    pub api_key: String,
}

impl Default for HordeConfig {
    fn default() -> Self {
        HordeConfig {
            url: DEFAULT_HORDE_URL.to_string(),
            api_key: ANONYMOUS_HORDE_KEY.to_string(),
        }
    }
}

impl HordeConfig {
    pub fn from_env() -> Self {
        HordeConfig {
            url: env::var("STABLE_HORDE_URL").unwrap_or_else(|_| DEFAULT_HORDE_URL.to_string()),
            api_key: env::var("STABLE_HORDE_API_KEY")
                .unwrap_or_else(|_| ANONYMOUS_HORDE_KEY.to_string()),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub url: String,
    pub token: Option<String>,
    pub model: String,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        HuggingFaceConfig {
            url: DEFAULT_HF_URL.to_string(),
            token: None,
            model: DEFAULT_HF_MODEL.to_string(),
        }
    }
}

impl HuggingFaceConfig {
    pub fn from_env() -> Self {
        HuggingFaceConfig {
            url: env::var("HF_API_URL").unwrap_or_else(|_| DEFAULT_HF_URL.to_string()),
            token: env::var("HF_API_TOKEN").ok(),
            model: env::var("HF_MODEL").unwrap_or_else(|_| DEFAULT_HF_MODEL.to_string()),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub backend: GenerationBackend,
    pub automatic1111: Automatic1111Config,
    pub horde: HordeConfig,
    pub huggingface: HuggingFaceConfig,
    pub request_retry: RetryPolicy,
    pub poll_retry: RetryPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            backend: GenerationBackend::default(),
            automatic1111: Automatic1111Config::default(),
            horde: HordeConfig::default(),
            huggingface: HuggingFaceConfig::default(),
            request_retry: RetryPolicy::generation_requests(),
            poll_retry: RetryPolicy::generation_polling(),
        }
    }
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        let backend = match env::var("GENERATION_BACKEND") {
            Ok(name) => GenerationBackend::from_name(&name).ok_or_else(|| {
                RortalError::Config(format!("Unknown GENERATION_BACKEND '{}'", name))
            })?,
            Err(_) => GenerationBackend::default(),
        };

        Ok(GenerationConfig {
            backend,
            automatic1111: Automatic1111Config::from_env(),
            horde: HordeConfig::from_env(),
            huggingface: HuggingFaceConfig::from_env(),
            ..Default::default()
        })
    }

    pub fn with_backend(mut self, backend: GenerationBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_automatic1111(mut self, config: Automatic1111Config) -> Self {
        self.automatic1111 = config;
        self.backend = GenerationBackend::Automatic1111;
        self
    }

    pub fn with_horde(mut self, config: HordeConfig) -> Self {
        self.horde = config;
        self.backend = GenerationBackend::StableHorde;
        self
    }

    pub fn with_huggingface(mut self, config: HuggingFaceConfig) -> Self {
        self.huggingface = config;
        self.backend = GenerationBackend::HuggingFace;
        self
    }

    pub fn with_request_retry(mut self, policy: RetryPolicy) -> Self {
        self.request_retry = policy;
        self
    }

    pub fn with_poll_retry(mut self, policy: RetryPolicy) -> Self {
        self.poll_retry = policy;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PinataConfig {
    pub url: String,
    pub jwt: Option<String>,
    pub api_key: Option<String>,
    pub secret_api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PinataConfig {
    fn default() -> Self {
        PinataConfig {
            url: DEFAULT_PINATA_URL.to_string(),
            jwt: None,
            api_key: None,
            secret_api_key: None,
            timeout: Duration::from_secs(DEFAULT_PIN_TIMEOUT_SECS),
            retry: RetryPolicy::uploads(),
        }
    }
}

impl PinataConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let timeout = env::var("PINATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PIN_TIMEOUT_SECS);

        PinataConfig {
            url: env::var("PINATA_API_URL").unwrap_or_else(|_| DEFAULT_PINATA_URL.to_string()),
            jwt: env::var("PINATA_JWT").ok().filter(|s| !s.is_empty()),
            api_key: env::var("PINATA_API_KEY").ok().filter(|s| !s.is_empty()),
            secret_api_key: env::var("PINATA_SECRET_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            timeout: Duration::from_secs(timeout),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        secret_api_key: impl Into<String>,
    ) -> Self {
        self.api_key = Some(api_key.into());
        self.secret_api_key = Some(secret_api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.jwt.is_some() || (self.api_key.is_some() && self.secret_api_key.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct RortalConfig {
    pub generation: GenerationConfig,
    pub pinata: PinataConfig,
    pub chain: ChainDefinition,
    /// JSON-RPC endpoint used as the wallet provider; `None` means no wallet.
    pub wallet_rpc_url: Option<String>,
    pub contract_address: String,
    pub pin_metadata: bool,
    /// Public gateway used to read token content back.
    pub gateway_url: String,
    pub receipt_retry: RetryPolicy,
}

impl Default for RortalConfig {
    fn default() -> Self {
        RortalConfig {
            generation: GenerationConfig::default(),
            pinata: PinataConfig::default(),
            chain: ChainDefinition::polygon_amoy(),
            wallet_rpc_url: None,
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            pin_metadata: false,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            receipt_retry: RetryPolicy::receipt_polling(),
        }
    }
}

impl RortalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        let chain = match env::var("CHAIN") {
            Ok(name) => ChainDefinition::from_name(&name)
                .ok_or_else(|| RortalError::Config(format!("Unknown CHAIN '{}'", name)))?,
            Err(_) => ChainDefinition::polygon_amoy(),
        };
        let contract_address = env::var("NFT_CONTRACT_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_CONTRACT_ADDRESS.to_string());
        let pin_metadata = env::var("PIN_METADATA")
            .ok()
            .map_or(false, |val| val == "true" || val == "1");

        Ok(RortalConfig {
            generation: GenerationConfig::from_env()?,
            pinata: PinataConfig::from_env(),
            chain,
            wallet_rpc_url: env::var("RPC_URL").ok().filter(|s| !s.is_empty()),
            contract_address,
            pin_metadata,
            gateway_url: env::var("IPFS_GATEWAY_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            receipt_retry: RetryPolicy::receipt_polling(),
        })
    }

    pub fn with_generation(mut self, config: GenerationConfig) -> Self {
        self.generation = config;
        self
    }

    pub fn with_pinata(mut self, config: PinataConfig) -> Self {
        self.pinata = config;
        self
    }

    pub fn with_chain(mut self, chain: ChainDefinition) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_wallet_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.wallet_rpc_url = Some(url.into());
        self
    }

    pub fn with_contract_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = address.into();
        self
    }

    pub fn with_metadata_pinning(mut self, enabled: bool) -> Self {
        self.pin_metadata = enabled;
        self
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_receipt_retry(mut self, policy: RetryPolicy) -> Self {
        self.receipt_retry = policy;
        self
    }
}
