//! Best-effort recovery of JSON objects from model text.
//!
//! Models wrap JSON in prose or code fences, or return nothing useful at all.
//! None of that is an error here: the caller gets either the parsed reply or
//! a [`MalformedReply`] holding the raw text.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Tag stored in [`MalformedReply::error`].
pub const BAD_JSON: &str = "bad_json";

/// Model text that could not be read as the expected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MalformedReply {
    pub error: String,
    pub raw_content: String,
}

impl MalformedReply {
    pub fn new(raw_content: impl Into<String>) -> Self {
        Self {
            error: BAD_JSON.to_string(),
            raw_content: raw_content.into(),
        }
    }
}

/// Outcome of one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelReply<T> {
    // Listed first so that deserializing a stored result does not read a
    // malformed marker as an all-optional reply.
    Malformed(MalformedReply),
    Parsed(T),
}

impl<T> ModelReply<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            ModelReply::Parsed(v) => Some(v),
            ModelReply::Malformed(_) => None,
        }
    }

    pub fn parsed_mut(&mut self) -> Option<&mut T> {
        match self {
            ModelReply::Parsed(v) => Some(v),
            ModelReply::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ModelReply::Malformed(_))
    }
}

/// Parse `text` as a `T`, recovering an embedded object when needed.
///
/// Tries the whole (trimmed) text, then the first balanced `{...}` span, then
/// the widest span from the first `{` to the last `}`.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> ModelReply<T> {
    let trimmed = text.trim();
    let candidates = [
        Some(trimmed),
        first_json_object(trimmed),
        widest_brace_span(trimmed),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Some(value) = parse_object::<T>(candidate) {
            return ModelReply::Parsed(value);
        }
    }

    ModelReply::Malformed(MalformedReply::new(text))
}

fn parse_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// First balanced `{...}` span, honoring JSON string literals and escapes.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn widest_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Field deserializers that tolerate the usual model sloppiness
/// (`"0.9"` for `0.9`, `"false"` for `false`, wrong types as absent).
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn bool_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// Any nested shape; a value of the wrong shape is treated as absent.
    pub fn or_none<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: serde::de::DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::deserialize(d)?).ok())
    }

    /// Tag strings kept verbatim, so that only an exact answer matches.
    /// Empty text and the literal `"null"` are absent.
    pub fn tag_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.is_empty() && s != "null" => Some(s),
            _ => None,
        })
    }

    /// Strings, with the literal `"null"` and empty text treated as absent.
    pub fn string_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() || t.eq_ignore_ascii_case("null") {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            _ => None,
        })
    }
}
