//! Backend module - Stable Diffusion API trait, HTTP client, and catalogs

pub mod catalog;
pub mod sd_api;
pub mod types;

pub use catalog::{load_catalog, Catalog};
pub use sd_api::{Automatic1111Client, StableDiffusionApi};
pub use types::{
    GenerationRequest, GenerationResponse, LoraInfo, ModelInfo, ProgressSnapshot, SamplerInfo,
};
