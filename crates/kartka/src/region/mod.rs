//! Page regions: where each field is expected, and how to cut it out.
//!
//! Regions are fractions of the page, so one config serves scans of any
//! resolution. Each form variant has its own set because the Ukrainian and
//! Russian printings place the nationality and name fields differently.

mod config;
mod extract;
mod overlay;

pub use config::{FrontRegions, ListRegions, Rect, RegionConfig, Variant, VariantRegions};
pub use extract::{extract, pixel_box, Crop, PixelBox};
pub use overlay::{draw_boxes, OUTLINE_WIDTH};

/// Header band used for variant detection. Independent of variant.
pub const HEADER_BAND: Rect = Rect::fixed(0.20, 0.03, 0.80, 0.13);
