//! Nationality reading and the deterministic marker override.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::lenient;

/// Marker roots that force a positive verdict. Checked first.
pub const TARGET_MARKERS: [&str; 3] = ["евр", "євр", "иуд"];

/// Marker roots that force a negative verdict.
pub const NON_TARGET_MARKERS: [&str; 28] = [
    "укр", "укра", "рус", "рос", "бел", "поля", "арм", "тат", "груз", "нем", "лат", "лит", "азер",
    "узб", "турк", "гре", "молд", "кара", "осет", "даг", "чеч", "болг", "кирг", "каз", "евен",
    "бур", "морд", "мар",
];

/// Why the verdict is what it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NationalityReason {
    ForcedTrueByMarker(String),
    ForcedFalseByMarker(String),
    AsReported,
}

/// Nationality call reply, later adjusted by [`SanityFilter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NationalityRecord {
    #[serde(default, deserialize_with = "lenient::bool_opt")]
    pub is_jewish: Option<bool>,

    /// The mark as the model transcribed it.
    #[serde(rename = "match", default, deserialize_with = "lenient::string_opt")]
    pub matched: Option<String>,

    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub confidence: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub reason: Option<NationalityReason>,
}

impl NationalityRecord {
    /// Negative verdict with less than full confidence.
    ///
    /// Missing confidence counts as zero; a missing verdict is not negative.
    pub fn is_uncertain_negative(&self) -> bool {
        self.is_jewish == Some(false) && self.confidence.unwrap_or(0.0) < 1.0
    }
}

/// Overrides the model's verdict when the transcribed mark is unambiguous.
pub struct SanityFilter;

impl SanityFilter {
    /// Apply the marker scan to `record`.
    ///
    /// Target markers win over non-target markers; within each list the first
    /// listed marker found wins. Without any marker the verdict is kept and
    /// annotated as self-reported. A record without `match` is untouched.
    pub fn apply(record: &mut NationalityRecord) {
        let normalized = match record.matched.as_deref() {
            Some(m) => m.trim().to_lowercase(),
            None => return,
        };
        if normalized.is_empty() {
            return;
        }

        if let Some(marker) = TARGET_MARKERS.iter().find(|m| normalized.contains(*m)) {
            record.is_jewish = Some(true);
            record.confidence = Some(1.0);
            record.reason = Some(NationalityReason::ForcedTrueByMarker(marker.to_string()));
            debug!(marker, "nationality forced true");
            return;
        }

        if let Some(marker) = NON_TARGET_MARKERS.iter().find(|m| normalized.contains(*m)) {
            record.is_jewish = Some(false);
            record.confidence = Some(1.0);
            record.reason = Some(NationalityReason::ForcedFalseByMarker(marker.to_string()));
            debug!(marker, "nationality forced false");
            return;
        }

        if record.reason.is_none() {
            record.reason = Some(NationalityReason::AsReported);
        }
    }
}
