//! HTTP client for AUTOMATIC1111-compatible Stable Diffusion servers

use async_trait::async_trait;
use reqwest::{header::{HeaderMap, HeaderValue, CONTENT_TYPE}, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::backend::types::{
    GenerationRequest, GenerationResponse, LoraInfo, ModelInfo, ProgressSnapshot, SamplerInfo,
};
use crate::config::ApiConfig;
use crate::error::{AppError, Result};

pub const TXT2IMG_PATH: &str = "/sdapi/v1/txt2img";
pub const PROGRESS_PATH: &str = "/sdapi/v1/progress";
pub const INTERRUPT_PATH: &str = "/sdapi/v1/interrupt";
pub const SAMPLERS_PATH: &str = "/sdapi/v1/samplers";
pub const MODELS_PATH: &str = "/sdapi/v1/sd-models";
pub const LORAS_PATH: &str = "/sdapi/v1/loras";
pub const HEALTH_PATH: &str = "/docs";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Operations offered by a Stable Diffusion server
#[async_trait]
pub trait StableDiffusionApi: Send + Sync {
    /// Submit a txt2img job and wait for its images
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Progress of the job currently running on the server
    async fn progress(&self) -> Result<ProgressSnapshot>;

    /// Ask the server to stop the current job
    async fn interrupt(&self) -> Result<()>;

    async fn samplers(&self) -> Result<Vec<SamplerInfo>>;

    async fn models(&self) -> Result<Vec<ModelInfo>>;

    async fn loras(&self) -> Result<Vec<LoraInfo>>;

    /// Whether the server answers at all
    async fn health(&self) -> bool;
}

/// reqwest-backed client for the `/sdapi/v1` REST surface
#[derive(Debug, Clone)]
pub struct Automatic1111Client {
    client: Client,
    base_url: String,
}

impl Automatic1111Client {
    /// Create a new client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await.map_err(|e| {
            error!(path = %path, error = %e, "Request to Stable Diffusion API failed");
            AppError::HttpClient(e)
        })?;

        parse_json(path, response).await
    }
}

/// Decode a success body or turn an error response into `AppError::Server`
async fn parse_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = server_message(&body);
        error!(path = %path, status = %status, message = %message, "Stable Diffusion API returned an error");
        return Err(AppError::Server(message));
    }

    response.json::<T>().await.map_err(|e| {
        error!(path = %path, error = %e, "Failed to parse Stable Diffusion API response");
        AppError::Server(format!("Failed to parse response: {}", e))
    })
}

/// Pick the most useful message out of an error body.
///
/// Prefers `message`, then `detail`, then `error`; anything else yields a generic message.
pub fn server_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    parsed
        .as_ref()
        .and_then(|v| {
            ["message", "detail", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
        })
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "API error".to_string())
}

#[async_trait]
impl StableDiffusionApi for Automatic1111Client {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        debug!(
            prompt = %request.prompt,
            width = request.width,
            height = request.height,
            steps = request.steps,
            batch_size = request.batch_size,
            sampler = %request.sampler_name,
            "Sending txt2img request"
        );

        let response = self
            .client
            .post(self.url(TXT2IMG_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Error generating image");
                AppError::HttpClient(e)
            })?;

        parse_json(TXT2IMG_PATH, response).await
    }

    async fn progress(&self) -> Result<ProgressSnapshot> {
        self.get_json(PROGRESS_PATH).await
    }

    async fn interrupt(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url(INTERRUPT_PATH))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Error interrupting generation");
                AppError::HttpClient(e)
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Interrupt request rejected");
            Err(AppError::Server(server_message(&body)))
        }
    }

    async fn samplers(&self) -> Result<Vec<SamplerInfo>> {
        self.get_json(SAMPLERS_PATH).await
    }

    async fn models(&self) -> Result<Vec<ModelInfo>> {
        self.get_json(MODELS_PATH).await
    }

    async fn loras(&self) -> Result<Vec<LoraInfo>> {
        self.get_json(LORAS_PATH).await
    }

    async fn health(&self) -> bool {
        let result = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "API health check failed");
                false
            }
            Err(e) => {
                debug!(error = %e, "API health check failed");
                false
            }
        }
    }
}
