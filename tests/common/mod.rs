//! Shared test helpers: a scriptable in-process Stable Diffusion API

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sd_studio::backend::{
    GenerationRequest, GenerationResponse, LoraInfo, ModelInfo, ProgressSnapshot, SamplerInfo,
    StableDiffusionApi,
};
use sd_studio::config::SessionConfig;
use sd_studio::{AppError, Result};
use serde_json::{json, Map};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// "hello" in base64
pub const HELLO_PNG: &str = "aGVsbG8=";

pub struct MockApi {
    pub generate_calls: AtomicUsize,
    pub progress_calls: AtomicUsize,
    pub interrupt_calls: AtomicUsize,
    pub requests: Mutex<Vec<GenerationRequest>>,
    images: Mutex<std::result::Result<Vec<String>, String>>,
    progress: Mutex<Option<ProgressSnapshot>>,
    samplers: Mutex<Option<Vec<SamplerInfo>>>,
    interrupt_fails: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            generate_calls: AtomicUsize::new(0),
            progress_calls: AtomicUsize::new(0),
            interrupt_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            images: Mutex::new(Ok(vec![HELLO_PNG.to_string()])),
            progress: Mutex::new(None),
            samplers: Mutex::new(None),
            interrupt_fails: AtomicBool::new(false),
            gate: Mutex::new(None),
        }
    }

    /// Images returned by the next generate calls
    pub fn respond_with_images(&self, images: &[&str]) {
        *self.images.lock() = Ok(images.iter().map(|s| s.to_string()).collect());
    }

    /// Make generate fail with a server message
    pub fn fail_generate(&self, message: &str) {
        *self.images.lock() = Err(message.to_string());
    }

    /// Progress reading to return; `None` makes progress polls fail
    pub fn set_progress(&self, progress: Option<(f64, &str)>) {
        *self.progress.lock() = progress.map(|(value, text)| ProgressSnapshot {
            progress: value,
            eta_relative: 1.0,
            state: json!({ "job": "txt2img" }),
            current_image: None,
            textinfo: Some(text.to_string()),
        });
    }

    pub fn set_samplers(&self, samplers: Option<Vec<&str>>) {
        *self.samplers.lock() = samplers.map(|names| {
            names
                .into_iter()
                .map(|name| SamplerInfo {
                    name: name.to_string(),
                    aliases: vec![],
                    options: Map::new(),
                })
                .collect()
        });
    }

    pub fn fail_interrupt(&self) {
        self.interrupt_fails.store(true, Ordering::SeqCst);
    }

    /// Hold generate calls until the returned notify is signalled
    pub fn hold_generate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn release_hold(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.notify_one();
        }
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl StableDiffusionApi for MockApi {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let images = self.images.lock().clone();
        match images {
            Ok(images) => Ok(GenerationResponse {
                images: Some(images),
                parameters: json!({ "steps": request.steps }).as_object().cloned().unwrap(),
                info: "{\"seed\": 1234}".to_string(),
            }),
            Err(message) => Err(AppError::Server(message)),
        }
    }

    async fn progress(&self) -> Result<ProgressSnapshot> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        self.progress
            .lock()
            .clone()
            .ok_or_else(|| AppError::Server("progress unavailable".to_string()))
    }

    async fn interrupt(&self) -> Result<()> {
        self.interrupt_calls.fetch_add(1, Ordering::SeqCst);
        if self.interrupt_fails.load(Ordering::SeqCst) {
            Err(AppError::Server("interrupt rejected".to_string()))
        } else {
            Ok(())
        }
    }

    async fn samplers(&self) -> Result<Vec<SamplerInfo>> {
        self.samplers
            .lock()
            .clone()
            .ok_or_else(|| AppError::Server("samplers unavailable".to_string()))
    }

    async fn models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            title: "sd_xl_base_1.0.safetensors [31e35c80fc]".to_string(),
            model_name: "sd_xl_base_1.0".to_string(),
            hash: Some("31e35c80fc".to_string()),
            sha256: None,
            filename: "/models/sd_xl_base_1.0.safetensors".to_string(),
            config: None,
        }])
    }

    async fn loras(&self) -> Result<Vec<LoraInfo>> {
        Err(AppError::Server("loras unavailable".to_string()))
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Session timings short enough for tests
pub fn fast_session_config() -> SessionConfig {
    SessionConfig {
        poll_interval_ms: 20,
        reset_delay_ms: 150,
        default_sampler: "Euler".to_string(),
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
