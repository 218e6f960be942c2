//! Field extraction from one front/list pair.
//!
//! The pipeline detects the form variant, cuts three regions out of the two
//! pages and asks the model about each in a fixed order: nationality, then
//! the list-page surname band, then the front-page full name with the band
//! reading as hints. Deterministic rules then correct the nationality verdict
//! and arbitrate between the two initials readings.

mod initials;
mod nationality;
mod pipeline;
mod reconcile;
mod review;
mod variant;

pub use initials::{
    normalize_initial, BandReading, BandReply, InitialsPair, NormalizedBand, RawInitials,
    CANONICAL_ALPHABET, VARIANT_LETTER_MAP,
};
pub use nationality::{
    NationalityReason, NationalityRecord, SanityFilter, NON_TARGET_MARKERS, TARGET_MARKERS,
};
pub use pipeline::{
    load_page, CropEntry, CropSet, FieldExtractionPipeline, PairInputs, PipelineOutputs,
    PipelineResult, PipelineStage, ResultFlags, VariantInfo, CROP_JPEG_QUALITY,
};
pub use reconcile::{
    name_tokens, split_front_text, FioChecks, FioHints, FioRaw, FioRecord, ReconciliationEngine,
    Resolution,
};
pub use review::{needs_manual_review, ManualReviewRouter, ReviewOutcome, REVIEW_DIR, REVIEW_NOTE};
pub use variant::{VariantDetection, VariantDetector, VariantReply};
