//! Kartka: field extraction from 1926 census family cards.
//!
//! Each household is recorded on a card with two pages: a front page with
//! the questionnaire (head of family, nationality) and a list page with the
//! family roster. Kartka cuts the relevant regions out of both scans, has a
//! vision model read each of them, and reconciles the readings into one
//! structured record per card.
//!
//! # Core Principles
//!
//! - **Model as reader**: no local OCR; the model reads, the code arbitrates
//! - **Deterministic overrides**: literal markers beat the model's verdict
//! - **Nothing is lost**: raw model text is kept next to every parsed value
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use kartka::{FieldExtractionPipeline, ModelConfig, OpenAICompatibleModel, PipelineOptions};
//!
//! let model = OpenAICompatibleModel::new(&ModelConfig::default()).unwrap();
//! let pipeline = FieldExtractionPipeline::new(Arc::new(model), PipelineOptions::default());
//! let result = pipeline
//!     .run(Path::new("0001.jpg"), Path::new("0002.jpg"), Path::new("out"))
//!     .unwrap();
//!
//! println!("Variant: {}", result.variant.detected);
//! println!("Needs review: {}", result.needs_manual_review());
//! ```

pub mod acquire;
pub mod batch;
pub mod config;
pub mod error;
pub mod extraction;
pub mod jobs;
pub mod llm;
pub mod persist;
pub mod region;

pub use acquire::{
    DownloadJob, DownloadReport, PageClassifier, PageType, Pair, PairingMode, ResumableDownloader,
};
pub use batch::{BatchItem, BatchReport, BatchRunner};
pub use config::{ModelConfig, PipelineOptions};
pub use error::{KartkaError, Result};
pub use extraction::{
    FieldExtractionPipeline, FioRecord, InitialsPair, NationalityRecord, PipelineResult,
    PipelineStage, ReconciliationEngine, SanityFilter, VariantDetector,
};
pub use jobs::{JobHandle, JobId, JobProgress, JobRegistry, JobStatus};
pub use llm::{ModelReply, OpenAICompatibleModel, ScriptedModel, VisionModel};
pub use region::{RegionConfig, Variant};
