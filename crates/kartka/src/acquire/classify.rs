//! Page role classification for unlabeled scans.

use std::path::Path;

use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extraction::load_page;
use crate::llm::{ask_json, lenient, prompts, ModelReply, VisionModel};
use crate::persist::write_json_atomic;
use crate::region::{extract, Rect};

use super::pairing::discover_images;

const CLASSIFY_MAX_TOKENS: usize = 96;

/// Longest side of each sub-crop in the composite.
pub const MAX_SIDE: u32 = 768;

/// Top band with the printed title.
pub const HEADER_REGION: Rect = Rect::fixed(0.0, 0.0, 1.0, 0.15);

/// Left margin where the list page carries its column headings.
pub const SIDEBAR_REGION: Rect = Rect::fixed(0.0, 0.0, 0.25, 1.0);

/// File the directory classification is (re)written to.
pub const CLASSIFICATION_FILE: &str = "classification.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Front,
    List,
    Other,
}

impl PageType {
    /// Exact tag match; anything else is [`PageType::Other`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "front" => PageType::Front,
            "list" => PageType::List,
            _ => PageType::Other,
        }
    }
}

/// Page type call reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTypeReply {
    #[serde(rename = "type", default, deserialize_with = "lenient::tag_opt")]
    pub page_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub confidence: Option<f64>,
    pub reason: Option<String>,
}

impl ClassificationRecord {
    fn from_reply(reply: &ModelReply<PageTypeReply>) -> Self {
        match reply {
            ModelReply::Parsed(r) => Self {
                page_type: r.page_type.as_deref().map_or(PageType::Other, PageType::from_tag),
                confidence: r.confidence,
                reason: r.reason.clone(),
            },
            ModelReply::Malformed(m) => Self {
                page_type: PageType::Other,
                confidence: None,
                reason: Some(m.error.clone()),
            },
        }
    }

    fn failed(error: String) -> Self {
        Self {
            page_type: PageType::Other,
            confidence: None,
            reason: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub front: usize,
    pub list: usize,
    pub other: usize,
}

impl TypeCounts {
    fn add(&mut self, page_type: PageType) {
        match page_type {
            PageType::Front => self.front += 1,
            PageType::List => self.list += 1,
            PageType::Other => self.other += 1,
        }
    }
}

/// Classification of a directory: the per-file mapping plus its partition.
///
/// Also the shape of the progress file, which is complete once
/// `processed == total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryClassification {
    pub processed: usize,
    pub total: usize,
    pub counts: TypeCounts,
    pub updated_at: DateTime<Utc>,
    pub files: IndexMap<String, ClassificationRecord>,
    pub front: Vec<String>,
    pub list: Vec<String>,
    pub other: Vec<String>,
}

impl DirectoryClassification {
    fn new(total: usize) -> Self {
        Self {
            processed: 0,
            total,
            counts: TypeCounts::default(),
            updated_at: Utc::now(),
            files: IndexMap::new(),
            front: Vec::new(),
            list: Vec::new(),
            other: Vec::new(),
        }
    }

    fn record(&mut self, name: String, record: ClassificationRecord) {
        self.counts.add(record.page_type);
        match record.page_type {
            PageType::Front => self.front.push(name.clone()),
            PageType::List => self.list.push(name.clone()),
            PageType::Other => self.other.push(name.clone()),
        }
        self.files.insert(name, record);
        self.processed += 1;
        self.updated_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}

/// Shrink so the longest side is at most [`MAX_SIDE`].
fn bounded(image: DynamicImage) -> DynamicImage {
    if image.width().max(image.height()) <= MAX_SIDE {
        image
    } else {
        image.resize(MAX_SIDE, MAX_SIDE, FilterType::Triangle)
    }
}

/// Header band above the sidebar band on a white canvas.
pub fn composite(page: &DynamicImage) -> DynamicImage {
    let header = bounded(extract(page, &HEADER_REGION, 0.0).image).to_rgb8();
    let sidebar = bounded(extract(page, &SIDEBAR_REGION, 0.0).image).to_rgb8();

    let width = header.width().max(sidebar.width()).max(1);
    let height = (header.height() + sidebar.height()).max(1);
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    imageops::overlay(&mut canvas, &header, 0, 0);
    imageops::overlay(&mut canvas, &sidebar, 0, i64::from(header.height()));
    DynamicImage::ImageRgb8(canvas)
}

/// Classifies single scans as front page, list page or other.
pub struct PageClassifier<'a> {
    model: &'a dyn VisionModel,
}

impl<'a> PageClassifier<'a> {
    pub fn new(model: &'a dyn VisionModel) -> Self {
        Self { model }
    }

    pub fn classify(&self, page: &DynamicImage) -> Result<ClassificationRecord> {
        let reply: ModelReply<PageTypeReply> = ask_json(
            self.model,
            prompts::PAGE_TYPE_SYSTEM,
            prompts::PAGE_TYPE_USER,
            &composite(page),
            CLASSIFY_MAX_TOKENS,
        )?;
        Ok(ClassificationRecord::from_reply(&reply))
    }

    pub fn classify_file(&self, path: &Path) -> Result<ClassificationRecord> {
        self.classify(&load_page(path)?)
    }

    /// Classify every image in `dir`, rewriting `progress_file` after each.
    ///
    /// A file that cannot be read or classified is recorded as
    /// [`PageType::Other`] with the error as its reason.
    pub fn classify_directory(
        &self,
        dir: &Path,
        progress_file: Option<&Path>,
    ) -> Result<DirectoryClassification> {
        let images = discover_images(dir)?;
        let mut state = DirectoryClassification::new(images.len());
        if let Some(path) = progress_file {
            write_json_atomic(path, &state)?;
        }

        for path in &images {
            let name = file_key(path);
            let record = match self.classify_file(path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(file = %name, error = %e, "classification failed");
                    ClassificationRecord::failed(e.to_string())
                }
            };
            debug!(file = %name, page_type = ?record.page_type, "classified");
            state.record(name, record);
            if let Some(path) = progress_file {
                write_json_atomic(path, &state)?;
            }
        }

        info!(
            total = state.total,
            front = state.counts.front,
            list = state.counts.list,
            other = state.counts.other,
            "directory classified"
        );
        Ok(state)
    }
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
