//! Batch processing of many pairs.
//!
//! Every pair gets its own output directory under the batch root, so pairs
//! never share files and can run on separate threads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::acquire::{
    discover_images, pair_nearest_following, pair_sorted, PageClassifier, Pair, PairingMode,
    CLASSIFICATION_FILE,
};
use crate::error::{KartkaError, Result};
use crate::extraction::{FieldExtractionPipeline, REVIEW_DIR};
use crate::persist::write_json_atomic;

/// Per-pair result file name.
pub const RESULT_FILE: &str = "result.json";

/// Consolidated batch report file name.
pub const BATCH_FILE: &str = "batch.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Completed {
        pair: Pair,
        result_file: PathBuf,
        needs_manual_review: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        advisories: Vec<String>,
    },
    Failed {
        pair: Pair,
        error: String,
    },
}

impl BatchItem {
    pub fn pair(&self) -> &Pair {
        match self {
            BatchItem::Completed { pair, .. } | BatchItem::Failed { pair, .. } => pair,
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, BatchItem::Completed { needs_manual_review: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub count: usize,
    pub completed: usize,
    pub failed: usize,
    pub flagged: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    fn from_items(items: Vec<BatchItem>, started_at: DateTime<Utc>) -> Self {
        let failed = items
            .iter()
            .filter(|i| matches!(i, BatchItem::Failed { .. }))
            .count();
        Self {
            count: items.len(),
            completed: items.len() - failed,
            failed,
            flagged: items.iter().filter(|i| i.is_flagged()).count(),
            started_at,
            finished_at: Utc::now(),
            items,
        }
    }
}

/// Runs the extraction pipeline over a sequence of pairs.
pub struct BatchRunner {
    pipeline: FieldExtractionPipeline,
    concurrency: usize,
}

impl BatchRunner {
    /// Sequential runner.
    pub fn new(pipeline: FieldExtractionPipeline) -> Self {
        Self {
            pipeline,
            concurrency: 1,
        }
    }

    /// Process up to `workers` pairs at once.
    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    pub fn pipeline(&self) -> &FieldExtractionPipeline {
        &self.pipeline
    }

    /// Find the pairs in `input_dir`.
    ///
    /// Classified mode labels every image first, writing its progress to
    /// `outdir/classification.json`.
    pub fn discover(
        &self,
        input_dir: &Path,
        mode: PairingMode,
        outdir: &Path,
    ) -> Result<Vec<Pair>> {
        match mode {
            PairingMode::Sorted => Ok(pair_sorted(&discover_images(input_dir)?)),
            PairingMode::Classified => {
                let classifier = PageClassifier::new(self.pipeline.model());
                let progress = outdir.join(CLASSIFICATION_FILE);
                let labels = classifier.classify_directory(input_dir, Some(&progress))?;
                let paths = |names: &[String]| -> Vec<PathBuf> {
                    names.iter().map(|n| input_dir.join(n)).collect()
                };
                Ok(pair_nearest_following(&paths(&labels.front), &paths(&labels.list)))
            }
        }
    }

    /// Process `pairs` and write the consolidated report to `outdir/batch.json`.
    pub fn run(&self, pairs: &[Pair], outdir: &Path) -> Result<BatchReport> {
        self.run_with_progress(pairs, outdir, &|_, _| {})
    }

    /// Like [`run`](Self::run); `progress(done, total)` is called after each pair.
    pub fn run_with_progress(
        &self,
        pairs: &[Pair],
        outdir: &Path,
        progress: &(dyn Fn(usize, usize) + Sync),
    ) -> Result<BatchReport> {
        fs::create_dir_all(outdir).map_err(|e| KartkaError::io(outdir, e))?;
        let started_at = Utc::now();
        let total = pairs.len();
        let workers = self.concurrency.min(total.max(1));

        let items = if workers <= 1 {
            pairs
                .iter()
                .enumerate()
                .map(|(n, pair)| {
                    let item = self.process(pair, outdir);
                    progress(n + 1, total);
                    item
                })
                .collect()
        } else {
            self.process_parallel(pairs, outdir, workers, progress)?
        };

        let report = BatchReport::from_items(items, started_at);
        write_json_atomic(&outdir.join(BATCH_FILE), &report)?;
        info!(
            count = report.count,
            failed = report.failed,
            flagged = report.flagged,
            "batch finished"
        );
        Ok(report)
    }

    fn process_parallel(
        &self,
        pairs: &[Pair],
        outdir: &Path,
        workers: usize,
        progress: &(dyn Fn(usize, usize) + Sync),
    ) -> Result<Vec<BatchItem>> {
        let next = AtomicUsize::new(0);
        let done = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<BatchItem>>> = Mutex::new(vec![None; pairs.len()]);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let n = next.fetch_add(1, Ordering::SeqCst);
                        let Some(pair) = pairs.get(n) else {
                            break;
                        };
                        let item = self.process(pair, outdir);
                        if let Ok(mut slots) = slots.lock() {
                            slots[n] = Some(item);
                        }
                        progress(done.fetch_add(1, Ordering::SeqCst) + 1, pairs.len());
                    }
                });
            }
        });

        let slots = slots
            .into_inner()
            .map_err(|_| KartkaError::Job("batch worker panicked".to_string()))?;
        slots
            .into_iter()
            .zip(pairs)
            .map(|(slot, pair)| {
                slot.ok_or_else(|| {
                    KartkaError::Job(format!("no result recorded for {}", pair.dir_name()))
                })
            })
            .collect()
    }

    fn process(&self, pair: &Pair, outdir: &Path) -> BatchItem {
        let pair_dir = outdir.join(pair.dir_name());
        match self.process_pair(pair, &pair_dir, outdir) {
            Ok(item) => item,
            Err(e) => {
                warn!(pair = %pair.dir_name(), error = %e, "pair failed");
                BatchItem::Failed {
                    pair: pair.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn process_pair(&self, pair: &Pair, pair_dir: &Path, outdir: &Path) -> Result<BatchItem> {
        let result = self.pipeline.run(&pair.front, &pair.list, pair_dir)?;
        let result_file = pair_dir.join(RESULT_FILE);
        write_json_atomic(&result_file, &result)?;

        let mut advisories = result
            .review
            .as_ref()
            .map(|r| r.advisories.clone())
            .unwrap_or_default();
        if result.needs_manual_review() {
            let dst = outdir.join(REVIEW_DIR).join(pair.dir_name());
            if let Err(e) = copy_files(pair_dir, &dst) {
                let message = format!("review copy for {} failed: {e}", pair.dir_name());
                warn!("{message}");
                advisories.push(message);
            }
        }

        Ok(BatchItem::Completed {
            pair: pair.clone(),
            result_file,
            needs_manual_review: result.needs_manual_review(),
            advisories,
        })
    }
}

/// Copy the regular files of `src` (not subdirectories) into `dst`.
fn copy_files(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let path = entry?.path();
        if let (true, Some(name)) = (path.is_file(), path.file_name()) {
            fs::copy(&path, dst.join(name))?;
        }
    }
    Ok(())
}
