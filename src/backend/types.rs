//! Wire types for the AUTOMATIC1111 `/sdapi/v1` endpoints

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// txt2img request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f32,
    pub sampler_name: String,
    /// Absent means the server picks a random seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub batch_size: u32,
    pub n_iter: u32,
    pub restore_faces: bool,
    pub tiling: bool,
    pub send_images: bool,
    pub save_images: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_settings: Option<Map<String, Value>>,
}

/// txt2img response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Base64 encoded PNG images
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: String,
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl GenerationResponse {
    pub fn images(&self) -> &[String] {
        self.images.as_deref().unwrap_or(&[])
    }
}

/// Point-in-time readout of the running job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Completion fraction in [0, 1]
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub eta_relative: f64,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub current_image: Option<String>,
    #[serde(default)]
    pub textinfo: Option<String>,
}

impl ProgressSnapshot {
    /// Completion as a clamped percentage
    pub fn percent(&self) -> f32 {
        (self.progress.clamp(0.0, 1.0) * 100.0) as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerInfo {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub title: String,
    pub model_name: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub config: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraInfo {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
