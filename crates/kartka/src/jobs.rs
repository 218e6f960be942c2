//! Background jobs with progress reporting.
//!
//! A job is a blocking closure (a pipeline run or a batch) moved onto
//! tokio's blocking pool. The closure reports progress through a
//! [`ProgressReporter`]; anyone holding the job id can read the latest
//! [`JobProgress`] from the registry, and the spawner awaits the result
//! through its [`JobHandle`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{KartkaError, Result};
use crate::extraction::PipelineStage;

/// Session identifier.
pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub status: JobStatus,
    pub percent: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobProgress {
    fn new(status: JobStatus, percent: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            percent,
            message: message.into(),
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Write side of a job's progress channel, handed to the job closure.
pub struct ProgressReporter {
    tx: watch::Sender<JobProgress>,
}

impl ProgressReporter {
    /// Publish a running update. `percent` is capped at 99 until the job ends.
    pub fn report(&self, percent: u8, message: impl Into<String>) {
        self.tx
            .send_replace(JobProgress::new(JobStatus::Running, percent.min(99), message));
    }

    /// Publish a pipeline state.
    pub fn stage(&self, stage: PipelineStage) {
        let message = serde_json::to_value(stage)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        self.report(stage.percent(), message);
    }

    /// Publish `done` of `total` work items.
    pub fn items(&self, done: usize, total: usize) {
        let percent = if total == 0 { 0 } else { done * 100 / total };
        self.report(u8::try_from(percent).unwrap_or(99), format!("{done}/{total}"));
    }

    fn finish(&self, error: Option<String>) {
        let status = if error.is_some() {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        let mut progress = JobProgress::new(status, 100, "done");
        if let Some(e) = error {
            progress.message = "failed".to_string();
            progress.error = Some(e);
        }
        self.tx.send_replace(progress);
    }
}

struct JobEntry {
    kind: String,
    created_at: DateTime<Utc>,
    progress: watch::Receiver<JobProgress>,
}

/// Summary of a registered job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub progress: JobProgress,
}

/// Result slot and progress feed of one spawned job.
pub struct JobHandle<T> {
    pub id: JobId,
    progress: watch::Receiver<JobProgress>,
    join: JoinHandle<Result<T>>,
    finish_delivered: bool,
}

impl<T> JobHandle<T> {
    /// Latest progress.
    pub fn progress(&self) -> JobProgress {
        self.progress.borrow().clone()
    }

    /// Wait for the next progress update.
    ///
    /// The final Completed or Failed update is always returned exactly once,
    /// even when the job finished before this was first called. `None`
    /// follows it.
    pub async fn next_progress(&mut self) -> Option<JobProgress> {
        if self.finish_delivered {
            return None;
        }
        if !self.progress.borrow().status.is_finished() {
            self.progress.changed().await.ok()?;
        }
        let update = self.progress.borrow_and_update().clone();
        self.finish_delivered = update.status.is_finished();
        Some(update)
    }

    /// Wait for the job's result.
    pub async fn wait(self) -> Result<T> {
        self.join
            .await
            .map_err(|e| KartkaError::Job(format!("job {} did not complete: {e}", self.id)))?
    }
}

/// Concurrent table of jobs keyed by session id.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and start `work` on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn spawn<T, F>(&self, kind: impl Into<String>, work: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&ProgressReporter) -> Result<T> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let kind = kind.into();
        let (tx, rx) = watch::channel(JobProgress::new(JobStatus::Queued, 0, "queued"));

        self.jobs.write().await.insert(
            id,
            JobEntry {
                kind: kind.clone(),
                created_at: Utc::now(),
                progress: rx.clone(),
            },
        );
        debug!(%id, kind = %kind, "job registered");

        let join = tokio::task::spawn_blocking(move || {
            let reporter = ProgressReporter { tx };
            reporter.report(0, "running");
            let result = work(&reporter);
            match &result {
                Ok(_) => reporter.finish(None),
                Err(e) => {
                    warn!(%id, kind = %kind, error = %e, "job failed");
                    reporter.finish(Some(e.to_string()));
                }
            }
            result
        });

        JobHandle {
            id,
            progress: rx,
            join,
            finish_delivered: false,
        }
    }

    /// Latest progress of job `id`.
    pub async fn progress(&self, id: JobId) -> Option<JobProgress> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).map(|entry| entry.progress.borrow().clone())
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.read().await;
        let mut infos: Vec<JobInfo> = jobs
            .iter()
            .map(|(id, entry)| JobInfo {
                id: *id,
                kind: entry.kind.clone(),
                created_at: entry.created_at,
                progress: entry.progress.borrow().clone(),
            })
            .collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    /// Drop finished jobs from the table. Returns how many were removed.
    pub async fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| !entry.progress.borrow().status.is_finished());
        before - jobs.len()
    }

    pub async fn remove(&self, id: JobId) -> bool {
        self.jobs.write().await.remove(&id).is_some()
    }
}
