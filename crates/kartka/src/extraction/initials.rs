//! Initial-letter normalization and the list-page band reading.

use serde::{Deserialize, Serialize};

use crate::llm::{lenient, ModelReply};

/// Canonical (Russian) alphabet every initial is drawn from.
pub const CANONICAL_ALPHABET: &str = "АБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯ";

/// Ukrainian letters folded onto the canonical alphabet before selection.
pub const VARIANT_LETTER_MAP: [(char, char); 4] = [('І', 'И'), ('Ї', 'И'), ('Є', 'Е'), ('Ґ', 'Г')];

fn fold_variant_letter(ch: char) -> char {
    VARIANT_LETTER_MAP
        .iter()
        .find(|(from, _)| *from == ch)
        .map(|(_, to)| *to)
        .unwrap_or(ch)
}

/// Reduce `s` to its first canonical letter, or the empty string.
///
/// Uppercases, folds Ukrainian letters, then keeps the first character that
/// belongs to [`CANONICAL_ALPHABET`].
pub fn normalize_initial(s: &str) -> String {
    s.chars()
        .flat_map(char::to_uppercase)
        .map(fold_variant_letter)
        .find(|ch| CANONICAL_ALPHABET.contains(*ch))
        .map(String::from)
        .unwrap_or_default()
}

/// Initials as the model wrote them (any text, possibly absent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInitials {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub patronymic: Option<String>,
}

/// Normalized initials. Each slot is one canonical letter or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialsPair {
    pub name: String,
    pub patronymic: String,
}

impl InitialsPair {
    /// Normalize both slots.
    pub fn new(name: &str, patronymic: &str) -> Self {
        Self {
            name: normalize_initial(name),
            patronymic: normalize_initial(patronymic),
        }
    }

    pub fn from_raw(raw: Option<&RawInitials>) -> Self {
        match raw {
            Some(r) => Self::new(
                r.name.as_deref().unwrap_or_default(),
                r.patronymic.as_deref().unwrap_or_default(),
            ),
            None => Self::default(),
        }
    }

    /// True when the two pairs disagree on a slot both of them fill.
    pub fn conflicts_with(&self, other: &InitialsPair) -> bool {
        let slot = |a: &str, b: &str| !a.is_empty() && !b.is_empty() && a != b;
        slot(&self.name, &other.name) || slot(&self.patronymic, &other.patronymic)
    }
}

/// Band call reply: surname and initials from the first roster row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandReply {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub surname: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_none")]
    pub initials: Option<RawInitials>,
}

/// Band reading after normalization; these become the FIO call hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBand {
    pub surname: String,
    pub initials: InitialsPair,
}

/// Raw and normalized band output, as stored in the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandReading {
    pub raw: ModelReply<BandReply>,
    pub normalized: NormalizedBand,
}

impl BandReading {
    /// Normalize a band reply. A malformed reply yields empty hints.
    pub fn from_reply(raw: ModelReply<BandReply>) -> Self {
        let normalized = match raw.parsed() {
            Some(reply) => NormalizedBand {
                surname: reply.surname.clone().unwrap_or_default(),
                initials: InitialsPair::from_raw(reply.initials.as_ref()),
            },
            None => NormalizedBand::default(),
        };
        Self { raw, normalized }
    }
}
