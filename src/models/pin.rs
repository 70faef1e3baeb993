use serde::{Deserialize, Serialize};

pub const IPFS_SCHEME: &str = "ipfs://";

const GATEWAYS: [(&str, &str); 4] = [
    ("IPFS.io", "https://ipfs.io/ipfs/"),
    ("Pinata Gateway", "https://gateway.pinata.cloud/ipfs/"),
    ("Cloudflare", "https://cloudflare-ipfs.com/ipfs/"),
    ("NFT.Storage", "https://nftstorage.link/ipfs/"),
];

/// Content identifier returned by the pinning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinResult {
    pub cid: String,
}

impl PinResult {
    pub fn new(cid: impl Into<String>) -> Self {
        Self { cid: cid.into() }
    }

    /// `ipfs://<cid>`, the form written into the token.
    pub fn token_uri(&self) -> String {
        format!("{}{}", IPFS_SCHEME, self.cid)
    }

    pub fn gateway_urls(&self) -> Vec<(&'static str, String)> {
        GATEWAYS
            .iter()
            .map(|(name, base)| (*name, format!("{}{}", base, self.cid)))
            .collect()
    }
}

pub const DEFAULT_GATEWAY_URL: &str = GATEWAYS[0].1;

/// Rewrites `ipfs://<path>` to a public HTTP gateway URL; other URIs pass through.
pub fn gateway_url(uri: &str) -> String {
    gateway_url_with(DEFAULT_GATEWAY_URL, uri)
}

/// Same as [`gateway_url`] against a chosen gateway base such as `https://ipfs.io/ipfs/`.
pub fn gateway_url_with(base: &str, uri: &str) -> String {
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(path) => format!("{}/{}", base.trim_end_matches('/'), path),
        None => uri.to_string(),
    }
}

/// ERC-721 metadata JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<MetadataAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

impl TokenMetadata {
    pub fn for_image(image: &PinResult, prompt: Option<&str>) -> Self {
        let attributes = prompt
            .map(|p| {
                vec![MetadataAttribute {
                    trait_type: "prompt".to_string(),
                    value: serde_json::Value::String(p.to_string()),
                }]
            })
            .unwrap_or_default();
        Self {
            name: "AI Generated Art".to_string(),
            description: "Art generated using Stable Diffusion".to_string(),
            image: image.token_uri(),
            attributes,
        }
    }
}

/// What a token URI resolves to: a metadata document, or the media itself
/// when the URI was pinned straight to the image.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenContent {
    Metadata(TokenMetadata),
    Media { mime_type: String, size: usize },
}

// Pinata wire types

#[derive(Debug, Deserialize)]
pub struct PinataPinResponse {
    #[serde(rename = "IpfsHash")]
    pub ipfs_hash: Option<String>,
    #[serde(rename = "PinSize", default)]
    pub pin_size: Option<u64>,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PinataJsonRequest<'a> {
    #[serde(rename = "pinataContent")]
    pub content: &'a TokenMetadata,
    #[serde(rename = "pinataMetadata")]
    pub metadata: PinataMetadata,
}

#[derive(Debug, Serialize)]
pub struct PinataMetadata {
    pub name: String,
}
