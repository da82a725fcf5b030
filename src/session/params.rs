//! User-adjustable generation parameters

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

use crate::backend::GenerationRequest;
use crate::error::{AppError, Result};

pub const DIMENSION_RANGE: RangeInclusive<u32> = 64..=2048;
pub const STEPS_RANGE: RangeInclusive<u32> = 1..=150;
pub const CFG_SCALE_RANGE: RangeInclusive<f32> = 1.0..=30.0;
pub const BATCH_SIZE_RANGE: RangeInclusive<u32> = 1..=8;

/// Largest seed handed out by [`random_seed`] (exclusive)
pub const MAX_RANDOM_SEED: i64 = 2_147_483_647;

/// Named width/height pair offered by the generation form
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AspectPreset {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const ASPECT_PRESETS: [AspectPreset; 8] = [
    AspectPreset { label: "SD 1.5 (512x512)", width: 512, height: 512 },
    AspectPreset { label: "SDXL 1024x1024", width: 1024, height: 1024 },
    AspectPreset { label: "SDXL 832x1216", width: 832, height: 1216 },
    AspectPreset { label: "SDXL 1216x832", width: 1216, height: 832 },
    AspectPreset { label: "Flux 768x1344", width: 768, height: 1344 },
    AspectPreset { label: "Flux 1344x768", width: 1344, height: 768 },
    AspectPreset { label: "Portrait (9:16)", width: 704, height: 1216 },
    AspectPreset { label: "Landscape (16:9)", width: 1216, height: 704 },
];

/// Random seed in `[0, 2147483647)`
pub fn random_seed() -> i64 {
    rand::thread_rng().gen_range(0..MAX_RANDOM_SEED)
}

/// Knobs for one txt2img job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParameters {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,
    /// `None` lets the server pick
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Falls back to the catalog default when unset
    #[serde(default)]
    pub sampler_name: Option<String>,
    /// Checkpoint to switch to for this request only
    #[serde(default)]
    pub checkpoint: Option<String>,
}

fn default_dimension() -> u32 {
    512
}

fn default_steps() -> u32 {
    20
}

fn default_cfg_scale() -> f32 {
    7.0
}

fn default_batch_size() -> u32 {
    1
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: None,
            width: default_dimension(),
            height: default_dimension(),
            steps: default_steps(),
            cfg_scale: default_cfg_scale(),
            seed: None,
            batch_size: default_batch_size(),
            sampler_name: None,
            checkpoint: None,
        }
    }
}

impl GenerationParameters {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn trimmed_prompt(&self) -> &str {
        self.prompt.trim()
    }

    /// Trimmed negative prompt, `None` when blank
    pub fn trimmed_negative_prompt(&self) -> Option<&str> {
        self.negative_prompt
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.trimmed_prompt().is_empty() {
            return Err(AppError::Validation("Please enter a prompt".to_string()));
        }

        check_range("width", self.width, &DIMENSION_RANGE)?;
        check_range("height", self.height, &DIMENSION_RANGE)?;
        check_range("steps", self.steps, &STEPS_RANGE)?;
        check_range("batch_size", self.batch_size, &BATCH_SIZE_RANGE)?;

        if !CFG_SCALE_RANGE.contains(&self.cfg_scale) {
            return Err(AppError::Validation(format!(
                "cfg_scale must be between {} and {}",
                CFG_SCALE_RANGE.start(),
                CFG_SCALE_RANGE.end()
            )));
        }

        Ok(())
    }

    /// Build the txt2img request body
    pub fn to_request(&self, default_sampler: &str) -> GenerationRequest {
        let sampler_name = self
            .sampler_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_sampler)
            .to_string();

        let override_settings = self
            .checkpoint
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|checkpoint| {
                let mut settings = Map::new();
                settings.insert(
                    "sd_model_checkpoint".to_string(),
                    Value::String(checkpoint.to_string()),
                );
                settings
            });

        GenerationRequest {
            prompt: self.trimmed_prompt().to_string(),
            negative_prompt: self.trimmed_negative_prompt().map(str::to_string),
            width: self.width,
            height: self.height,
            steps: self.steps,
            cfg_scale: self.cfg_scale,
            sampler_name,
            seed: self.seed,
            batch_size: self.batch_size,
            n_iter: 1,
            restore_faces: false,
            tiling: false,
            send_images: true,
            save_images: false,
            override_settings,
        }
    }
}

fn check_range(field: &str, value: u32, range: &RangeInclusive<u32>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} must be between {} and {}",
            field,
            range.start(),
            range.end()
        )))
    }
}
