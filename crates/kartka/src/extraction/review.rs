//! Manual review routing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::ModelReply;

use super::nationality::NationalityRecord;

/// Holding area name, relative to a pair's output directory.
pub const REVIEW_DIR: &str = "manual_review";

/// Marker note written into the holding area.
pub const REVIEW_NOTE: &str = "Flagged for manual review: is_jewish=false & confidence<1.0\n";

/// True iff the record is a negative verdict with less than full confidence.
///
/// A malformed reply carries no verdict and is not flagged.
pub fn needs_manual_review(nationality: &ModelReply<NationalityRecord>) -> bool {
    nationality
        .parsed()
        .is_some_and(NationalityRecord::is_uncertain_negative)
}

/// What the router managed to do. Failures end up in `advisories`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub dir: PathBuf,
    pub copied: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<String>,
}

/// Copies a flagged record's inputs and crops into the holding area.
pub struct ManualReviewRouter {
    dir: PathBuf,
}

impl ManualReviewRouter {
    /// Router for the holding area under `outdir`.
    pub fn new(outdir: impl AsRef<Path>) -> Self {
        Self {
            dir: outdir.as_ref().join(REVIEW_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `files` and write the marker note. Best effort: nothing here
    /// returns an error.
    pub fn route(&self, files: &[&Path]) -> ReviewOutcome {
        let mut outcome = ReviewOutcome {
            dir: self.dir.clone(),
            ..Default::default()
        };

        if let Err(e) = fs::create_dir_all(&self.dir) {
            outcome.advise(format!("cannot create {}: {e}", self.dir.display()));
            return outcome;
        }

        for src in files.iter().filter(|p| p.exists()) {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dst = self.dir.join(name);
            match fs::copy(src, &dst) {
                Ok(_) => outcome.copied.push(dst),
                Err(e) => outcome.advise(format!("copy {} failed: {e}", src.display())),
            }
        }

        if let Err(e) = fs::write(self.dir.join("README.txt"), REVIEW_NOTE) {
            outcome.advise(format!("cannot write review note: {e}"));
        }

        info!(dir = %self.dir.display(), copied = outcome.copied.len(), "routed to manual review");
        outcome
    }
}

impl ReviewOutcome {
    fn advise(&mut self, message: String) {
        warn!("{message}");
        self.advisories.push(message);
    }
}
