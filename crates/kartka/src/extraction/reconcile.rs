//! Front-page full name reading and its reconciliation with the list page.
//!
//! The FIO call sees the list-page surname and initials only as soft hints.
//! Afterwards the transcribed front-page line is split into tokens; if the
//! initials derived from it disagree with the list page, the front-page
//! tokens are taken as the answer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::lenient;

use super::initials::{normalize_initial, InitialsPair};

static NAME_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\p{Alphabetic}+(?:-\p{Alphabetic}+)*").expect("valid name token regex")
});

/// Verbatim transcription of the name line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FioRaw {
    #[serde(default, alias = "fio_left", deserialize_with = "lenient::string_opt")]
    pub front_text: Option<String>,
}

/// Hints the FIO call was given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FioHints {
    #[serde(default)]
    pub surname_hint: String,
    #[serde(default)]
    pub initials_hint: InitialsPair,
}

/// How a reconciled record was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    PreferFrontDueToInitialsConflict,
    OkOrNoConflict,
}

/// Record of the reconciliation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FioChecks {
    pub initials_provided: InitialsPair,
    /// `None` when the front text did not split into three tokens.
    pub initials_derived_from_front: Option<InitialsPair>,
    pub resolution: Resolution,
}

/// Head-of-family full name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FioRecord {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub surname: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub patronymic: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_none")]
    pub raw: Option<FioRaw>,
    #[serde(default, deserialize_with = "lenient::or_none")]
    pub hints: Option<FioHints>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub surname_source: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub confidence: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub checks: Option<FioChecks>,
}

impl FioRecord {
    pub fn front_text(&self) -> Option<&str> {
        self.raw.as_ref().and_then(|r| r.front_text.as_deref())
    }
}

/// Alphabetic runs of `text`; hyphenated names stay one token.
pub fn name_tokens(text: &str) -> Vec<&str> {
    NAME_TOKEN.find_iter(text).map(|m| m.as_str()).collect()
}

/// `(surname, name, patronymic)` when `text` has at least three tokens.
pub fn split_front_text(text: &str) -> Option<(&str, &str, &str)> {
    match name_tokens(text).as_slice() {
        [surname, name, patronymic, ..] => Some((*surname, *name, *patronymic)),
        _ => None,
    }
}

/// Arbitrates between the front-page name and the list-page initials.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine {
    strict_patronymic: bool,
}

impl ReconciliationEngine {
    /// `strict_patronymic` enables [`enforce_initials`](Self::enforce_initials)
    /// in [`apply`](Self::apply).
    pub fn new(strict_patronymic: bool) -> Self {
        Self { strict_patronymic }
    }

    /// Run the optional strict check, then reconcile.
    pub fn apply(&self, fio: &mut FioRecord, provided: &InitialsPair) {
        if self.strict_patronymic {
            Self::enforce_initials(fio, provided);
        }
        Self::reconcile(fio, provided);
    }

    /// Null a patronymic that does not begin with the provided initial.
    pub fn enforce_initials(fio: &mut FioRecord, provided: &InitialsPair) {
        if provided.patronymic.is_empty() {
            return;
        }
        let keep = fio
            .patronymic
            .as_deref()
            .is_none_or(|p| normalize_initial(p) == provided.patronymic);
        if !keep {
            debug!(
                patronymic = ?fio.patronymic,
                initial = %provided.patronymic,
                "patronymic dropped"
            );
            fio.patronymic = None;
        }
    }

    /// Compare initials derived from the front text with `provided`.
    ///
    /// Never fails; the decision is recorded in `fio.checks`.
    pub fn reconcile(fio: &mut FioRecord, provided: &InitialsPair) {
        let front = fio.front_text().map(str::to_owned).unwrap_or_default();
        let tokens = split_front_text(&front);
        let derived = tokens.map(|(_, name, patronymic)| InitialsPair::new(name, patronymic));

        let resolution = match (tokens, &derived) {
            (Some((surname, name, patronymic)), Some(d)) if d.conflicts_with(provided) => {
                fio.surname = Some(surname.to_string());
                fio.name = Some(name.to_string());
                if !patronymic.is_empty() {
                    fio.patronymic = Some(patronymic.to_string());
                }
                debug!(front = %front, "initials conflict, front page preferred");
                Resolution::PreferFrontDueToInitialsConflict
            }
            _ => Resolution::OkOrNoConflict,
        };

        fio.checks = Some(FioChecks {
            initials_provided: provided.clone(),
            initials_derived_from_front: derived,
            resolution,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{parse_reply, ModelReply};

    fn record(front: &str) -> FioRecord {
        FioRecord {
            surname: Some("Иваненко".into()),
            name: Some("Павел".into()),
            patronymic: Some("Семенович".into()),
            raw: Some(FioRaw {
                front_text: Some(front.into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_tokens_keep_hyphenated_names() {
        assert_eq!(
            name_tokens("Гольд-Берг, Исаак  Моисеевич."),
            vec!["Гольд-Берг", "Исаак", "Моисеевич"]
        );
        assert!(split_front_text("Иванов Петро").is_none());
    }

    #[test]
    fn test_no_conflict() {
        let mut fio = record("Иванов Петро Степанович");
        ReconciliationEngine::reconcile(&mut fio, &InitialsPair::new("П", "С"));
        let checks = fio.checks.unwrap();
        assert_eq!(checks.resolution, Resolution::OkOrNoConflict);
        assert_eq!(checks.initials_derived_from_front, Some(InitialsPair::new("П", "С")));
        assert_eq!(fio.surname.as_deref(), Some("Иваненко"));
    }

    #[test]
    fn test_conflict_prefers_front() {
        let mut fio = record("Иванов Петро Степанович");
        ReconciliationEngine::reconcile(&mut fio, &InitialsPair::new("М", "С"));
        assert_eq!(
            fio.checks.as_ref().map(|c| c.resolution),
            Some(Resolution::PreferFrontDueToInitialsConflict)
        );
        assert_eq!(fio.surname.as_deref(), Some("Иванов"));
        assert_eq!(fio.name.as_deref(), Some("Петро"));
        assert_eq!(fio.patronymic.as_deref(), Some("Степанович"));
    }

    #[test]
    fn test_ukrainian_letters_do_not_conflict() {
        let mut fio = record("Левін Ісак Єфимович");
        ReconciliationEngine::reconcile(&mut fio, &InitialsPair::new("И", "Е"));
        assert_eq!(
            fio.checks.map(|c| c.resolution),
            Some(Resolution::OkOrNoConflict)
        );
    }

    #[test]
    fn test_unsplittable_text() {
        let mut fio = record("неразборчиво");
        let before = fio.surname.clone();
        ReconciliationEngine::reconcile(&mut fio, &InitialsPair::new("М", "С"));
        let checks = fio.checks.as_ref().unwrap();
        assert_eq!(checks.resolution, Resolution::OkOrNoConflict);
        assert!(checks.initials_derived_from_front.is_none());
        assert_eq!(fio.surname, before);
    }

    #[test]
    fn test_enforce_initials() {
        let mut fio = record("");
        ReconciliationEngine::enforce_initials(&mut fio, &InitialsPair::new("П", "М"));
        assert!(fio.patronymic.is_none());

        let mut fio = record("");
        ReconciliationEngine::enforce_initials(&mut fio, &InitialsPair::new("П", "С"));
        assert_eq!(fio.patronymic.as_deref(), Some("Семенович"));

        let mut fio = record("");
        ReconciliationEngine::enforce_initials(&mut fio, &InitialsPair::new("П", ""));
        assert_eq!(fio.patronymic.as_deref(), Some("Семенович"));
    }

    #[test]
    fn test_strict_mode_runs_before_reconcile() {
        let mut fio = record("Иванов Петро");
        ReconciliationEngine::new(true).apply(&mut fio, &InitialsPair::new("П", "М"));
        assert!(fio.patronymic.is_none());
        assert!(fio.checks.is_some());
    }

    #[test]
    fn test_reply_accepts_legacy_raw_key() {
        let reply: ModelReply<FioRecord> = parse_reply(
            r#"{"surname": "Кац", "name": "Борис", "patronymic": "null",
                "raw": {"fio_left": "Кац Борис"}, "confidence": "0.8"}"#,
        );
        let fio = reply.parsed().unwrap();
        assert_eq!(fio.front_text(), Some("Кац Борис"));
        assert!(fio.patronymic.is_none());
        assert_eq!(fio.confidence, Some(0.8));
    }

    #[test]
    fn test_resolution_serialization() {
        let json = serde_json::to_string(&Resolution::PreferFrontDueToInitialsConflict).unwrap();
        assert_eq!(json, "\"prefer-front-due-to-initials-conflict\"");
    }
}
