//! Resumable, rate-limited download of numbered scan sequences.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::error::{KartkaError, Result};

/// Placeholder replaced by the sequence index.
pub const INDEX_PLACEHOLDER: &str = "{i}";

/// Suffix of the sidecar file a download streams into.
pub const PART_SUFFIX: &str = ".part";

/// One invocation of the downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJob {
    /// First index, inclusive.
    pub start: u64,
    /// Last index, inclusive.
    pub end: u64,
    /// URL with one `{i}` placeholder.
    pub url_template: String,
    pub dest_dir: PathBuf,
    pub user_agent: String,
    /// Delay bounds in seconds, applied after every item.
    pub sleep_min: f64,
    pub sleep_max: f64,
    pub timeout_secs: u64,
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Continue from an existing `.part` file with a byte-range request.
    pub resume: bool,
}

impl DownloadJob {
    pub fn new(
        start: u64,
        end: u64,
        url_template: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            start,
            end,
            url_template: url_template.into(),
            dest_dir: dest_dir.into(),
            user_agent: concat!("kartka/", env!("CARGO_PKG_VERSION")).to_string(),
            sleep_min: 1.0,
            sleep_max: 3.0,
            timeout_secs: 60,
            retries: 3,
            resume: true,
        }
    }

    pub fn with_delay(mut self, min: f64, max: f64) -> Self {
        self.sleep_min = min;
        self.sleep_max = max;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(KartkaError::InvalidInput(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.url_template.matches(INDEX_PLACEHOLDER).count() != 1 {
            return Err(KartkaError::InvalidInput(format!(
                "URL template must contain exactly one {INDEX_PLACEHOLDER} placeholder"
            )));
        }
        let finite = self.sleep_min.is_finite() && self.sleep_max.is_finite();
        if !(finite && self.sleep_min >= 0.0 && self.sleep_min <= self.sleep_max) {
            return Err(KartkaError::InvalidInput(format!(
                "invalid delay range [{}, {}]",
                self.sleep_min, self.sleep_max
            )));
        }
        Ok(())
    }

    pub fn url_for(&self, index: u64) -> String {
        self.url_template.replace(INDEX_PLACEHOLDER, &index.to_string())
    }

    fn delay(&self) -> Duration {
        let secs = self.sleep_min + fastrand::f64() * (self.sleep_max - self.sleep_min);
        Duration::from_secs_f64(secs)
    }
}

/// File name a URL is saved under: its last path segment, without query.
pub fn target_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Classified HTTP status of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// 200: the whole body, from offset zero.
    Full,
    /// 206: the requested byte range.
    Partial,
    /// 416: the requested range starts past the end.
    RangeNotSatisfiable,
    Other(u16),
}

impl FetchStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => FetchStatus::Full,
            206 => FetchStatus::Partial,
            416 => FetchStatus::RangeNotSatisfiable,
            other => FetchStatus::Other(other),
        }
    }
}

pub struct FetchResponse {
    pub status: FetchStatus,
    pub body: Box<dyn Read + Send>,
}

/// Source of remote bytes.
pub trait Transport: Send + Sync {
    /// GET `url`, asking for bytes from `range_start` onwards when set.
    fn get(&self, url: &str, range_start: Option<u64>) -> Result<FetchResponse>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| KartkaError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn for_job(job: &DownloadJob) -> Result<Self> {
        Self::new(&job.user_agent, Duration::from_secs(job.timeout_secs))
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, range_start: Option<u64>) -> Result<FetchResponse> {
        let mut request = self.client.get(url);
        if let Some(offset) = range_start {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let response = request
            .send()
            .map_err(|e| KartkaError::Http(format!("GET {url} failed: {e}")))?;
        let status = FetchStatus::from_code(response.status().as_u16());
        Ok(FetchResponse {
            status,
            body: Box::new(response),
        })
    }
}

/// Per-index failure kept in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub index: u64,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<DownloadFailure>,
}

enum ItemOutcome {
    Downloaded,
    Skipped,
}

/// Fetches `[start, end]` into the destination, one index at a time.
pub struct ResumableDownloader<T: Transport> {
    transport: T,
}

impl ResumableDownloader<HttpTransport> {
    /// Downloader over HTTP configured from `job`.
    pub fn http(job: &DownloadJob) -> Result<Self> {
        Ok(Self::new(HttpTransport::for_job(job)?))
    }
}

impl<T: Transport> ResumableDownloader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Run `job`. Only an invalid job or an unusable destination is an
    /// error; per-index failures are collected in the report.
    pub fn run(&self, job: &DownloadJob) -> Result<DownloadReport> {
        job.validate()?;
        fs::create_dir_all(&job.dest_dir).map_err(|e| KartkaError::io(&job.dest_dir, e))?;

        let mut report = DownloadReport::default();
        for index in job.start..=job.end {
            let url = job.url_for(index);
            let _span = info_span!("download", index, url = %url).entered();

            match self.fetch_with_retries(job, &url) {
                Ok(ItemOutcome::Downloaded) => report.downloaded += 1,
                Ok(ItemOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(error = %e, "giving up");
                    report.failed += 1;
                    report.errors.push(DownloadFailure {
                        index,
                        url: url.clone(),
                        error: e.to_string(),
                    });
                }
            }

            let delay = job.delay();
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            "download finished"
        );
        Ok(report)
    }

    fn fetch_with_retries(&self, job: &DownloadJob, url: &str) -> Result<ItemOutcome> {
        let name = target_name(url)
            .ok_or_else(|| KartkaError::InvalidInput(format!("URL '{url}' has no file name")))?;
        let target = job.dest_dir.join(name);
        if target.is_file() {
            debug!(file = %target.display(), "already present");
            return Ok(ItemOutcome::Skipped);
        }
        let part = job.dest_dir.join(format!("{name}{PART_SUFFIX}"));

        let attempts = job.retries.saturating_add(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.fetch_once(url, &part, job.resume) {
                Ok(()) => {
                    fs::rename(&part, &target).map_err(|e| KartkaError::io(&target, e))?;
                    debug!(file = %target.display(), attempt, "downloaded");
                    return Ok(ItemOutcome::Downloaded);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "attempt failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| KartkaError::Http(format!("no attempt made for {url}"))))
    }

    /// One attempt: stream `url` into `part`, resuming when possible.
    fn fetch_once(&self, url: &str, part: &Path, resume: bool) -> Result<()> {
        let existing = if resume {
            fs::metadata(part).map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        let mut range = (existing > 0).then_some(existing);
        let mut response = self.transport.get(url, range)?;
        if response.status == FetchStatus::RangeNotSatisfiable && range.is_some() {
            debug!(offset = existing, "range not satisfiable, refetching from zero");
            range = None;
            response = self.transport.get(url, None)?;
        }

        let append = match (response.status, range) {
            (FetchStatus::Partial, Some(_)) => true,
            (FetchStatus::Full, _) | (FetchStatus::Partial, None) => false,
            (FetchStatus::RangeNotSatisfiable, _) => {
                return Err(KartkaError::Http(format!("HTTP 416 for {url}")));
            }
            (FetchStatus::Other(code), _) => {
                let reason = StatusCode::from_u16(code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unexpected status");
                return Err(KartkaError::Http(format!("HTTP {code} {reason} for {url}")));
            }
        };
        if range.is_some() && !append {
            debug!("server ignored range, restarting from zero");
        }

        let mut file = open_part(part, append)?;
        io::copy(&mut response.body, &mut file).map_err(|e| KartkaError::io(part, e))?;
        file.sync_all().map_err(|e| KartkaError::io(part, e))?;
        Ok(())
    }
}

fn open_part(part: &Path, append: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(part).map_err(|e| KartkaError::io(part, e))
}
