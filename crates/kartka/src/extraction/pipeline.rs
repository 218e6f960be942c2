//! One front/list pair in, one [`PipelineResult`] out.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::config::PipelineOptions;
use crate::error::{KartkaError, Result};
use crate::llm::{ask_json, jpeg_bytes, prompts, ModelIdentity, ModelReply, VisionModel};
use crate::region::{draw_boxes, extract, Crop, PixelBox, Rect, Variant, HEADER_BAND};

use super::initials::{BandReading, BandReply};
use super::nationality::{NationalityRecord, SanityFilter};
use super::reconcile::{FioHints, FioRecord, ReconciliationEngine};
use super::review::{needs_manual_review, ManualReviewRouter, ReviewOutcome};
use super::variant::VariantDetector;

const NATIONALITY_MAX_TOKENS: usize = 64;
const BAND_MAX_TOKENS: usize = 64;
const FIO_MAX_TOKENS: usize = 180;

/// JPEG quality for crop and overlay files.
pub const CROP_JPEG_QUALITY: u8 = 95;

/// Pipeline states, in the only order they are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    VariantDetected,
    RegionsCropped,
    NationalityRead,
    BandRead,
    FioRead,
    Reconciled,
    ReviewRouted,
    Done,
}

impl PipelineStage {
    /// Rough completion percentage for progress reporting.
    pub fn percent(self) -> u8 {
        match self {
            PipelineStage::Start => 0,
            PipelineStage::VariantDetected => 10,
            PipelineStage::RegionsCropped => 20,
            PipelineStage::NationalityRead => 40,
            PipelineStage::BandRead => 60,
            PipelineStage::FioRead => 80,
            PipelineStage::Reconciled => 90,
            PipelineStage::ReviewRouted => 95,
            PipelineStage::Done => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairInputs {
    pub front: String,
    pub list: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantInfo {
    pub detected: Variant,
    pub confidence: Option<f64>,
}

/// Where a crop came from and where it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropEntry {
    pub box_percent: Rect,
    pub pad: f64,
    pub pixels: PixelBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropSet {
    pub header_band: CropEntry,
    pub front_nationality: CropEntry,
    pub front_head_name: CropEntry,
    pub list_surname_band: CropEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutputs {
    pub nationality: ModelReply<NationalityRecord>,
    pub right_band: BandReading,
    pub fio: ModelReply<FioRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFlags {
    pub needs_manual_review: bool,
}

/// Everything known about one pair. Written as the pair's result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub inputs: PairInputs,
    pub variant: VariantInfo,
    pub crops: CropSet,
    pub llm: ModelIdentity,
    pub outputs: PipelineOutputs,
    pub flags: ResultFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewOutcome>,
}

impl PipelineResult {
    pub fn needs_manual_review(&self) -> bool {
        self.flags.needs_manual_review
    }

    /// Crop files written for this pair.
    pub fn crop_files(&self) -> Vec<&Path> {
        [
            &self.crops.front_nationality,
            &self.crops.front_head_name,
            &self.crops.list_surname_band,
        ]
        .into_iter()
        .filter_map(|c| c.file.as_deref())
        .collect()
    }
}

/// Runs variant detection, the three field calls, the sanity override,
/// reconciliation and review routing for one pair.
pub struct FieldExtractionPipeline {
    model: Arc<dyn VisionModel>,
    options: PipelineOptions,
}

impl FieldExtractionPipeline {
    pub fn new(model: Arc<dyn VisionModel>, options: PipelineOptions) -> Self {
        Self { model, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn model(&self) -> &dyn VisionModel {
        self.model.as_ref()
    }

    /// Process one pair, writing crops (and overlays, review copies) under
    /// `outdir`.
    pub fn run(&self, front: &Path, list: &Path, outdir: &Path) -> Result<PipelineResult> {
        self.run_with_progress(front, list, outdir, &|_| {})
    }

    /// Like [`run`](Self::run), reporting each state as it is reached.
    pub fn run_with_progress(
        &self,
        front: &Path,
        list: &Path,
        outdir: &Path,
        progress: &dyn Fn(PipelineStage),
    ) -> Result<PipelineResult> {
        let _span =
            info_span!("pipeline", front = %front.display(), list = %list.display()).entered();

        let front_page = load_page(front)?;
        let list_page = load_page(list)?;
        fs::create_dir_all(outdir).map_err(|e| KartkaError::io(outdir, e))?;
        let model = self.model.as_ref();
        let pad = self.options.pad;
        progress(PipelineStage::Start);

        let detection = VariantDetector::new(model).detect(&front_page)?;
        let variant = detection.variant;
        progress(PipelineStage::VariantDetected);

        let regions = self.options.regions.for_variant(variant);
        let nationality_crop = extract(&front_page, &regions.front.nationality, pad);
        let head_crop = extract(&front_page, &regions.front.head_name, pad);
        let band_crop = extract(&list_page, &regions.list.surname_band, pad);

        let nationality_file = outdir.join(format!("{variant}_front_nationality.jpg"));
        let head_file = outdir.join(format!("{variant}_front_head_name.jpg"));
        let band_file = outdir.join(format!("{variant}_list_surname_band.jpg"));
        save_jpeg(&nationality_crop.image, &nationality_file)?;
        save_jpeg(&head_crop.image, &head_file)?;
        save_jpeg(&band_crop.image, &band_file)?;

        if self.options.overlay {
            let front_boxes = [detection.header_box, nationality_crop.pixels, head_crop.pixels];
            save_overlay(
                &front_page,
                &front_boxes,
                &outdir.join(format!("{variant}_front_overlay.jpg")),
            )?;
            save_overlay(
                &list_page,
                &[band_crop.pixels],
                &outdir.join(format!("{variant}_list_overlay.jpg")),
            )?;
        }
        progress(PipelineStage::RegionsCropped);

        let mut nationality: ModelReply<NationalityRecord> = ask_json(
            model,
            prompts::NATIONALITY_SYSTEM,
            prompts::NATIONALITY_USER,
            &nationality_crop.image,
            NATIONALITY_MAX_TOKENS,
        )?;
        if let Some(record) = nationality.parsed_mut() {
            SanityFilter::apply(record);
        }
        let flagged = needs_manual_review(&nationality);
        progress(PipelineStage::NationalityRead);

        let band_reply: ModelReply<BandReply> = ask_json(
            model,
            prompts::BAND_SYSTEM,
            prompts::BAND_USER,
            &band_crop.image,
            BAND_MAX_TOKENS,
        )?;
        let band = BandReading::from_reply(band_reply);
        let hints = FioHints {
            surname_hint: band.normalized.surname.clone(),
            initials_hint: band.normalized.initials.clone(),
        };
        progress(PipelineStage::BandRead);

        let fio_system = prompts::fio_system_prompt(
            &hints.surname_hint,
            &hints.initials_hint.name,
            &hints.initials_hint.patronymic,
        );
        let mut fio: ModelReply<FioRecord> = ask_json(
            model,
            &fio_system,
            prompts::FIO_USER,
            &head_crop.image,
            FIO_MAX_TOKENS,
        )?;
        progress(PipelineStage::FioRead);

        if let Some(record) = fio.parsed_mut() {
            record.hints = Some(hints.clone());
            ReconciliationEngine::new(self.options.enforce_initials)
                .apply(record, &hints.initials_hint);
        }
        progress(PipelineStage::Reconciled);

        let review = flagged.then(|| {
            ManualReviewRouter::new(outdir).route(&[
                front,
                list,
                &nationality_file,
                &head_file,
                &band_file,
            ])
        });
        progress(PipelineStage::ReviewRouted);

        let result = PipelineResult {
            inputs: PairInputs {
                front: file_name(front),
                list: file_name(list),
            },
            variant: VariantInfo {
                detected: variant,
                confidence: detection.confidence,
            },
            crops: CropSet {
                header_band: CropEntry {
                    box_percent: HEADER_BAND,
                    pad: 0.0,
                    pixels: detection.header_box,
                    file: None,
                },
                front_nationality: crop_entry(
                    regions.front.nationality,
                    pad,
                    &nationality_crop,
                    nationality_file,
                ),
                front_head_name: crop_entry(regions.front.head_name, pad, &head_crop, head_file),
                list_surname_band: crop_entry(
                    regions.list.surname_band,
                    pad,
                    &band_crop,
                    band_file,
                ),
            },
            llm: model.identity(),
            outputs: PipelineOutputs {
                nationality,
                right_band: band,
                fio,
            },
            flags: ResultFlags {
                needs_manual_review: flagged,
            },
            review,
        };
        progress(PipelineStage::Done);

        info!(%variant, needs_manual_review = flagged, "pair processed");
        Ok(result)
    }
}

/// Open a scan, rejecting missing or undecodable files.
pub fn load_page(path: &Path) -> Result<DynamicImage> {
    if !path.is_file() {
        return Err(KartkaError::InvalidInput(format!(
            "'{}' is not a readable file",
            path.display()
        )));
    }
    image::open(path).map_err(|e| KartkaError::image(path, e))
}

fn save_jpeg(image: &DynamicImage, path: &Path) -> Result<()> {
    let bytes = jpeg_bytes(image, CROP_JPEG_QUALITY)?;
    fs::write(path, bytes).map_err(|e| KartkaError::io(path, e))
}

fn save_overlay(page: &DynamicImage, boxes: &[PixelBox], path: &Path) -> Result<()> {
    let canvas = DynamicImage::ImageRgb8(draw_boxes(page, boxes));
    save_jpeg(&canvas, path)
}

fn crop_entry(rect: Rect, pad: f64, crop: &Crop, file: PathBuf) -> CropEntry {
    CropEntry {
        box_percent: rect,
        pad,
        pixels: crop.pixels,
        file: Some(file),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
