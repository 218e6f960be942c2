//! Form variant detection from the printed header.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::llm::{ask_json, lenient, prompts, ModelReply, VisionModel};
use crate::region::{extract, PixelBox, Variant, HEADER_BAND};

const VARIANT_MAX_TOKENS: usize = 32;

/// Variant call reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantReply {
    #[serde(default, deserialize_with = "lenient::tag_opt")]
    pub variant: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub confidence: Option<f64>,
}

/// Outcome of variant detection.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDetection {
    pub variant: Variant,
    pub confidence: Option<f64>,
    pub header_box: PixelBox,
}

/// Reads the header band of a front page and names its layout.
pub struct VariantDetector<'a> {
    model: &'a dyn VisionModel,
}

impl<'a> VariantDetector<'a> {
    pub fn new(model: &'a dyn VisionModel) -> Self {
        Self { model }
    }

    /// Detect the variant of `front_page`.
    ///
    /// Anything other than an exact `ua` or `ru` answer, including a
    /// malformed reply, selects [`Variant::Ua`].
    pub fn detect(&self, front_page: &DynamicImage) -> Result<VariantDetection> {
        let header = extract(front_page, &HEADER_BAND, 0.0);
        let reply: ModelReply<VariantReply> = ask_json(
            self.model,
            prompts::VARIANT_SYSTEM,
            prompts::VARIANT_USER,
            &header.image,
            VARIANT_MAX_TOKENS,
        )?;

        let parsed = reply.parsed();
        let tag = parsed.and_then(|r| r.variant.as_deref());
        let variant = match tag.and_then(Variant::from_tag) {
            Some(v) => v,
            None => {
                debug!(answer = ?tag, "unrecognized variant answer, using ua");
                Variant::Ua
            }
        };
        let confidence = parsed.and_then(|r| r.confidence);

        info!(%variant, ?confidence, "variant detected");
        Ok(VariantDetection {
            variant,
            confidence,
            header_box: header.pixels,
        })
    }
}
