use crate::error::GenerationError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STEPS: u32 = 4;
pub const DEFAULT_CFG_SCALE: f32 = 7.0;
pub const DEFAULT_SIZE: u32 = 512;
pub const RANDOM_SEED: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sampler {
    #[default]
    #[serde(rename = "lcm")]
    Lcm,
    #[serde(rename = "k_euler_a")]
    EulerA,
    #[serde(rename = "k_euler")]
    Euler,
    #[serde(rename = "k_heun")]
    Heun,
    #[serde(rename = "k_dpm_2")]
    Dpm2,
    #[serde(rename = "k_dpm_2_a")]
    Dpm2A,
    #[serde(rename = "k_lms")]
    Lms,
    #[serde(rename = "k_dpm_fast")]
    DpmFast,
    #[serde(rename = "k_dpm_adaptive")]
    DpmAdaptive,
    #[serde(rename = "k_dpmpp_2s_a")]
    DpmPlusPlus2SA,
    #[serde(rename = "k_dpmpp_2m")]
    DpmPlusPlus2M,
    #[serde(rename = "k_dpmpp_sde")]
    DpmPlusPlusSde,
    #[serde(rename = "DDIM")]
    Ddim,
}

impl Sampler {
    pub const ALL: [Sampler; 13] = [
        Sampler::Lcm,
        Sampler::EulerA,
        Sampler::Euler,
        Sampler::Heun,
        Sampler::Dpm2,
        Sampler::Dpm2A,
        Sampler::Lms,
        Sampler::DpmFast,
        Sampler::DpmAdaptive,
        Sampler::DpmPlusPlus2SA,
        Sampler::DpmPlusPlus2M,
        Sampler::DpmPlusPlusSde,
        Sampler::Ddim,
    ];

    /// Key used by Stable Horde and by our own request JSON.
    pub fn key(&self) -> &'static str {
        match self {
            Sampler::Lcm => "lcm",
            Sampler::EulerA => "k_euler_a",
            Sampler::Euler => "k_euler",
            Sampler::Heun => "k_heun",
            Sampler::Dpm2 => "k_dpm_2",
            Sampler::Dpm2A => "k_dpm_2_a",
            Sampler::Lms => "k_lms",
            Sampler::DpmFast => "k_dpm_fast",
            Sampler::DpmAdaptive => "k_dpm_adaptive",
            Sampler::DpmPlusPlus2SA => "k_dpmpp_2s_a",
            Sampler::DpmPlusPlus2M => "k_dpmpp_2m",
            Sampler::DpmPlusPlusSde => "k_dpmpp_sde",
            Sampler::Ddim => "DDIM",
        }
    }

    /// Display name the Stable Diffusion WebUI expects in `sampler_name`.
    pub fn automatic1111_name(&self) -> &'static str {
        match self {
            Sampler::Lcm => "LCM",
            Sampler::EulerA => "Euler a",
            Sampler::Euler => "Euler",
            Sampler::Heun => "Heun",
            Sampler::Dpm2 => "DPM2",
            Sampler::Dpm2A => "DPM2 a",
            Sampler::Lms => "LMS",
            Sampler::DpmFast => "DPM fast",
            Sampler::DpmAdaptive => "DPM adaptive",
            Sampler::DpmPlusPlus2SA => "DPM++ 2S a",
            Sampler::DpmPlusPlus2M => "DPM++ 2M",
            Sampler::DpmPlusPlusSde => "DPM++ SDE",
            Sampler::Ddim => "DDIM",
        }
    }

    /// Unknown names fall back to LCM, the fastest sampler.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|sampler| sampler.key() == name || sampler.automatic1111_name() == name)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub steps: u32,
    pub cfg_scale: f32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub sampler: Sampler,
    pub seed: i64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            steps: DEFAULT_STEPS,
            cfg_scale: DEFAULT_CFG_SCALE,
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            sampler: Sampler::default(),
            seed: RANDOM_SEED,
        }
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_cfg_scale(mut self, cfg_scale: f32) -> Self {
        self.cfg_scale = cfg_scale;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("prompt is empty".into()));
        }
        if self.steps == 0 {
            return Err(GenerationError::InvalidRequest("steps must be at least 1".into()));
        }
        if !(self.cfg_scale.is_finite() && self.cfg_scale > 0.0) {
            return Err(GenerationError::InvalidRequest(format!(
                "cfg_scale must be positive, got {}",
                self.cfg_scale
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(GenerationError::InvalidRequest(format!(
                "image size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Image bytes held in memory between generation and upload. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    image_bytes: Vec<u8>,
    mime_type: String,
}

impl GenerationResult {
    pub fn new(image_bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, GenerationError> {
        if image_bytes.is_empty() {
            return Err(GenerationError::EmptyImage);
        }
        Ok(Self {
            image_bytes,
            mime_type: mime_type.into(),
        })
    }

    /// Accepts bare base64 or a `data:<mime>;base64,<payload>` URL.
    pub fn from_base64(payload: &str, default_mime: &str) -> Result<Self, GenerationError> {
        let (mime, data) = match payload.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    GenerationError::MalformedResponse("data URL without payload".into())
                })?;
                let mime = header.trim_end_matches(";base64");
                let mime = if mime.is_empty() { default_mime } else { mime };
                (mime, data)
            }
            None => (default_mime, payload),
        };

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| GenerationError::MalformedResponse(format!("invalid base64 image: {}", e)))?;
        Self::new(bytes, mime)
    }

    pub fn image_bytes(&self) -> &[u8] {
        &self.image_bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.image_bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.image_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_bytes.is_empty()
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            STANDARD.encode(&self.image_bytes)
        )
    }
}

// AUTOMATIC1111 WebUI wire types

#[derive(Debug, Serialize)]
pub struct Automatic1111Request {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub cfg_scale: f32,
    pub width: u32,
    pub height: u32,
    pub sampler_name: String,
    pub batch_size: u32,
    pub n_iter: u32,
    pub seed: i64,
    pub enable_hr: bool,
    pub denoising_strength: f32,
}

impl From<&GenerationRequest> for Automatic1111Request {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            steps: request.steps,
            cfg_scale: request.cfg_scale,
            width: request.width,
            height: request.height,
            sampler_name: request.sampler.automatic1111_name().to_string(),
            batch_size: 1,
            n_iter: 1,
            seed: request.seed,
            enable_hr: false,
            denoising_strength: 0.7,
        }
    }
}

/// The WebUI answers with `images`; proxies in front of it answer with a single `image`.
#[derive(Debug, Deserialize)]
pub struct Automatic1111Response {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

// Stable Horde wire types

#[derive(Debug, Serialize)]
pub struct HordeAsyncRequest {
    pub prompt: String,
    pub params: HordeParams,
    pub nsfw: bool,
    pub censor_nsfw: bool,
    pub r2: bool,
}

#[derive(Debug, Serialize)]
pub struct HordeParams {
    pub sampler_name: String,
    pub cfg_scale: f32,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    pub n: u32,
}

impl From<&GenerationRequest> for HordeAsyncRequest {
    fn from(request: &GenerationRequest) -> Self {
        // Horde takes the negative prompt after a `###` separator.
        let prompt = if request.negative_prompt.trim().is_empty() {
            request.prompt.clone()
        } else {
            format!("{} ### {}", request.prompt, request.negative_prompt)
        };
        Self {
            prompt,
            params: HordeParams {
                sampler_name: request.sampler.key().to_string(),
                cfg_scale: request.cfg_scale,
                steps: request.steps,
                width: request.width,
                height: request.height,
                seed: (request.seed >= 0).then(|| request.seed.to_string()),
                n: 1,
            },
            nsfw: false,
            censor_nsfw: true,
            r2: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HordeAsyncResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HordeCheckResponse {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub faulted: bool,
    #[serde(default)]
    pub is_possible: Option<bool>,
    #[serde(default)]
    pub queue_position: Option<u64>,
    #[serde(default)]
    pub wait_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct HordeStatusResponse {
    #[serde(default)]
    pub generations: Vec<HordeGeneration>,
    #[serde(default)]
    pub faulted: bool,
}

#[derive(Debug, Deserialize)]
pub struct HordeGeneration {
    pub img: String,
    #[serde(default)]
    pub seed: Option<String>,
}

// Hugging Face inference wire types

#[derive(Debug, Serialize)]
pub struct HuggingFaceRequest {
    pub inputs: String,
    pub parameters: HuggingFaceParameters,
}

#[derive(Debug, Serialize)]
pub struct HuggingFaceParameters {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub negative_prompt: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
}

impl From<&GenerationRequest> for HuggingFaceRequest {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            inputs: request.prompt.clone(),
            parameters: HuggingFaceParameters {
                negative_prompt: request.negative_prompt.clone(),
                num_inference_steps: request.steps,
                guidance_scale: request.cfg_scale,
                width: request.width,
                height: request.height,
            },
        }
    }
}
