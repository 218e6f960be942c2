//! Process-level configuration values.
//!
//! Everything that talks to the model receives a `ModelConfig` by reference.
//! Only [`ModelConfig::from_env`] looks at the process environment, and the
//! CLI calls it exactly once at startup.

use serde::{Deserialize, Serialize};

use crate::region::RegionConfig;

/// Default OpenAI-compatible chat completions endpoint (local vLLM).
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/v1/chat/completions";

/// Default vision model identifier.
pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-VL-8B-Instruct-FP8";

/// Default symmetric pad applied around every region.
pub const DEFAULT_PAD: f64 = 0.02;

/// Connection settings for the vision model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Chat completions URL.
    pub endpoint: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Bearer token. Local servers accept any value.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Sampling temperature (0.0 for deterministic reads).
    pub temperature: f64,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: "EMPTY".to_string(),
            temperature: 0.0,
            timeout_secs: 180,
        }
    }
}

impl ModelConfig {
    /// Build from `LLM_ENDPOINT`, `LLM_MODEL` and `OPENAI_API_KEY`, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("LLM_ENDPOINT").unwrap_or(defaults.endpoint),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or(defaults.api_key),
            ..defaults
        }
    }

    /// Override the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

/// Per-run knobs for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Symmetric pad (fraction of page size) around each region.
    pub pad: f64,

    /// Write QA overlay images next to the crops.
    pub overlay: bool,

    /// Null the patronymic when it does not start with the list-page initial.
    pub enforce_initials: bool,

    /// Regions per form variant.
    pub regions: RegionConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            pad: DEFAULT_PAD,
            overlay: false,
            enforce_initials: false,
            regions: RegionConfig::default(),
        }
    }
}

impl PipelineOptions {
    pub fn with_pad(mut self, pad: f64) -> Self {
        self.pad = pad;
        self
    }

    pub fn with_overlay(mut self, overlay: bool) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_enforce_initials(mut self, enforce: bool) -> Self {
        self.enforce_initials = enforce;
        self
    }

    pub fn with_regions(mut self, regions: RegionConfig) -> Self {
        self.regions = regions;
        self
    }
}
