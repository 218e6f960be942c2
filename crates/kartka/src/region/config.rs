//! Fractional regions per form variant.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KartkaError, Result};

/// Rectangle expressed as fractions of page width/height.
///
/// Always satisfies `0 <= x0 < x1 <= 1` and `0 <= y0 < y1 <= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Build a validated rectangle.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(x0) && in_unit(y0) && in_unit(x1) && in_unit(y1)) {
            return Err(KartkaError::RegionConfig(format!(
                "rectangle ({x0}, {y0}, {x1}, {y1}) has coordinates outside [0, 1]"
            )));
        }
        if x0 >= x1 || y0 >= y1 {
            return Err(KartkaError::RegionConfig(format!(
                "rectangle ({x0}, {y0}, {x1}, {y1}) is empty"
            )));
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    /// Constant constructor for built-in regions. Callers guarantee validity.
    pub(crate) const fn fixed(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl TryFrom<[f64; 4]> for Rect {
    type Error = KartkaError;

    fn try_from(v: [f64; 4]) -> Result<Self> {
        Rect::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [f64; 4] {
    fn from(r: Rect) -> Self {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

/// Printed layout of the family card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Ukrainian header ("СІМЕЙНА КАРТКА"). The more common layout.
    Ua,
    /// Russian header ("СЕМЕЙНАЯ КАРТА").
    Ru,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Ua => "ua",
            Variant::Ru => "ru",
        }
    }

    /// Recognize an exact variant tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ua" => Some(Variant::Ua),
            "ru" => Some(Variant::Ru),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regions on the front page (questionnaire side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontRegions {
    /// Handwritten nationality mark.
    pub nationality: Rect,
    /// Head-of-family full name band.
    #[serde(alias = "fio_head")]
    pub head_name: Rect,
}

/// Regions on the list page (family roster).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRegions {
    /// Surname and initials column; the first row is the head of household.
    pub surname_band: Rect,
}

/// All regions for one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRegions {
    #[serde(alias = "page1")]
    pub front: FrontRegions,
    #[serde(alias = "page2")]
    pub list: ListRegions,
}

/// Region rectangles for both variants. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub ua: VariantRegions,
    pub ru: VariantRegions,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            ua: VariantRegions {
                front: FrontRegions {
                    nationality: Rect::fixed(0.10, 0.32, 0.45, 0.46),
                    head_name: Rect::fixed(0.34, 0.33, 0.92, 0.48),
                },
                list: ListRegions {
                    surname_band: Rect::fixed(0.50, 0.12, 0.92, 0.88),
                },
            },
            ru: VariantRegions {
                front: FrontRegions {
                    nationality: Rect::fixed(0.08, 0.33, 0.48, 0.47),
                    head_name: Rect::fixed(0.33, 0.32, 0.92, 0.47),
                },
                list: ListRegions {
                    surname_band: Rect::fixed(0.50, 0.12, 0.92, 0.88),
                },
            },
        }
    }
}

impl RegionConfig {
    /// Regions for a variant.
    pub fn for_variant(&self, variant: Variant) -> &VariantRegions {
        match variant {
            Variant::Ua => &self.ua,
            Variant::Ru => &self.ru,
        }
    }

    /// Parse an override document. Both `ua` and `ru` must be present.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| KartkaError::RegionConfig(format!("not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| KartkaError::RegionConfig("expected a JSON object".to_string()))?;
        for variant in [Variant::Ua, Variant::Ru] {
            if !object.contains_key(variant.as_str()) {
                return Err(KartkaError::RegionConfig(format!(
                    "missing variant '{variant}'"
                )));
            }
        }

        serde_json::from_value(value).map_err(|e| KartkaError::RegionConfig(e.to_string()))
    }

    /// Load an override file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| KartkaError::io(path, e))?;
        Self::from_json(&text)
    }
}
