//! CLI command implementations.

pub mod batch;
pub mod classify;
pub mod download;
pub mod extract;
pub mod regions;

use std::sync::Arc;

use kartka::{ModelConfig, OpenAICompatibleModel, PipelineOptions, RegionConfig, VisionModel};

use crate::cli::{ModelArgs, PipelineArgs};

/// Environment first, then flag overrides.
pub fn model_config(args: &ModelArgs) -> ModelConfig {
    let mut config = ModelConfig::from_env();
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    if let Some(key) = &args.api_key {
        config = config.with_api_key(key);
    }
    config
}

pub fn build_model(args: &ModelArgs) -> Result<Arc<dyn VisionModel>, Box<dyn std::error::Error>> {
    let config = model_config(args);
    tracing::debug!(endpoint = %config.endpoint, model = %config.model, "model configured");
    Ok(Arc::new(OpenAICompatibleModel::new(&config)?))
}

pub fn pipeline_options(
    args: &PipelineArgs,
) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    if !(0.0..0.5).contains(&args.pad) {
        return Err(format!("pad must be in [0, 0.5), got {}", args.pad).into());
    }
    let mut options = PipelineOptions::default()
        .with_pad(args.pad)
        .with_overlay(args.overlay)
        .with_enforce_initials(args.enforce_initials);
    if let Some(path) = &args.regions {
        options = options.with_regions(RegionConfig::load(path)?);
    }
    Ok(options)
}
