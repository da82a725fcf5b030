//! Sampler, checkpoint and LoRA catalogs used to populate selection menus.
//!
//! Catalog queries never fail: any error degrades to an empty list with a warning.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::sd_api::StableDiffusionApi;
use crate::backend::types::{LoraInfo, ModelInfo, SamplerInfo};

/// Everything a generation form needs to offer choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub samplers: Vec<SamplerInfo>,
    pub models: Vec<ModelInfo>,
    pub loras: Vec<LoraInfo>,
    pub default_sampler: String,
    pub default_model: Option<String>,
}

pub async fn samplers_or_empty(api: &dyn StableDiffusionApi) -> Vec<SamplerInfo> {
    api.samplers().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load samplers");
        Vec::new()
    })
}

pub async fn models_or_empty(api: &dyn StableDiffusionApi) -> Vec<ModelInfo> {
    api.models().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load models");
        Vec::new()
    })
}

pub async fn loras_or_empty(api: &dyn StableDiffusionApi) -> Vec<LoraInfo> {
    api.loras().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load LoRA models");
        Vec::new()
    })
}

/// Sampler to preselect: the fallback if the server offers it (or offers nothing),
/// otherwise the first sampler the server lists.
pub fn resolve_default_sampler(samplers: &[SamplerInfo], fallback: &str) -> String {
    let offers_fallback = samplers
        .iter()
        .any(|s| s.name == fallback || s.aliases.iter().any(|a| a == fallback));

    if offers_fallback || samplers.is_empty() {
        fallback.to_string()
    } else {
        samplers[0].name.clone()
    }
}

/// Query all catalogs concurrently
pub async fn load_catalog(api: &dyn StableDiffusionApi, fallback_sampler: &str) -> Catalog {
    let (samplers, models, loras) = tokio::join!(
        samplers_or_empty(api),
        models_or_empty(api),
        loras_or_empty(api)
    );

    let default_sampler = resolve_default_sampler(&samplers, fallback_sampler);
    let default_model = models.first().map(|m| m.model_name.clone());

    Catalog {
        samplers,
        models,
        loras,
        default_sampler,
        default_model,
    }
}
