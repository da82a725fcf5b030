//! Generated image records kept in the local history

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::backend::GenerationResponse;
use crate::error::{AppError, Result};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// One generated image plus the prompt that produced it.
///
/// Field names follow the camelCase payload older history files were written with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    /// Inline `data:image/png;base64,...` reference
    pub url: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// Generate a local record id: `img_<epoch_ms>_<9 base36 chars>`
pub fn generate_record_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();

    format!("img_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Wrap a base64 PNG payload into a renderable data URL
pub fn to_data_url(base64_image: &str) -> String {
    if base64_image.starts_with("data:") {
        base64_image.to_string()
    } else {
        format!("{}{}", DATA_URL_PREFIX, base64_image)
    }
}

/// Approximate decoded size of a base64 image in KB
pub fn estimate_image_size_kb(base64_image: &str) -> u64 {
    let size_in_bytes = (base64_image.len() as f64 * 3.0) / 4.0;
    (size_in_bytes / 1024.0).round() as u64
}

impl HistoryRecord {
    /// Build one record per image in a txt2img response.
    ///
    /// All records share the prompt, negative prompt and timestamp; ids are distinct.
    pub fn from_response(
        response: &GenerationResponse,
        prompt: &str,
        negative_prompt: Option<&str>,
    ) -> Vec<HistoryRecord> {
        let images = response.images();
        if images.is_empty() {
            return Vec::new();
        }

        let timestamp = Utc::now().timestamp_millis();
        let negative_prompt = negative_prompt
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let parameters = Some(response.parameters.clone()).filter(|p| !p.is_empty());
        let info = Some(response.info.clone()).filter(|i| !i.is_empty());

        let mut seen = HashSet::with_capacity(images.len());
        images
            .iter()
            .map(|image| {
                let mut id = generate_record_id();
                while !seen.insert(id.clone()) {
                    id = generate_record_id();
                }

                HistoryRecord {
                    id,
                    url: to_data_url(image),
                    prompt: prompt.to_string(),
                    negative_prompt: negative_prompt.clone(),
                    timestamp,
                    parameters: parameters.clone(),
                    info: info.clone(),
                }
            })
            .collect()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Creation time as `dd/mm/YYYY HH:MM` (UTC)
    pub fn formatted_timestamp(&self) -> String {
        self.created_at()
            .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_default()
    }

    /// Text placed on the clipboard by a "copy prompt" action
    pub fn prompt_text(&self) -> String {
        match &self.negative_prompt {
            Some(negative) => format!("{}\n\nNegative prompt: {}", self.prompt, negative),
            None => self.prompt.clone(),
        }
    }

    /// Base64 payload without the data URL header
    pub fn base64_payload(&self) -> &str {
        match self.url.split_once(";base64,") {
            Some((_, payload)) => payload,
            None => &self.url,
        }
    }

    /// Decoded image bytes
    pub fn image_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.base64_payload())
            .map_err(|e| {
                AppError::Persistence(format!("Stored image {} is not valid base64: {}", self.id, e))
            })
    }

    pub fn download_file_name(&self) -> String {
        format!("sd_image_{}.png", self.id)
    }

    pub fn estimated_size_kb(&self) -> u64 {
        estimate_image_size_kb(self.base64_payload())
    }
}
