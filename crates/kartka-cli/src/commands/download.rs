//! Download command - fetch a numbered range of scans.

use std::path::PathBuf;

use colored::Colorize;
use kartka::{DownloadJob, ResumableDownloader};

pub struct DownloadArgs {
    pub start: u64,
    pub end: u64,
    pub url_template: String,
    pub dest: PathBuf,
    pub sleep_min: f64,
    pub sleep_max: f64,
    pub retries: u32,
    pub timeout: u64,
    pub resume: bool,
}

pub fn run(args: DownloadArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut job = DownloadJob::new(args.start, args.end, args.url_template, args.dest)
        .with_delay(args.sleep_min, args.sleep_max)
        .with_retries(args.retries)
        .with_resume(args.resume);
    job.timeout_secs = args.timeout;
    job.validate()?;

    println!(
        "{} {}..={} into {}",
        "Downloading".cyan().bold(),
        job.start,
        job.end,
        job.dest_dir.display().to_string().white()
    );
    if verbose {
        println!("  template: {}", job.url_template);
    }

    let report = ResumableDownloader::http(&job)?.run(&job)?;

    println!();
    println!(
        "{} downloaded, {} skipped, {} failed",
        report.downloaded.to_string().green().bold(),
        report.skipped.to_string().white(),
        report.failed.to_string().red()
    );
    for failure in &report.errors {
        println!("  {} {}: {}", "failed".red(), failure.index, failure.error);
    }

    Ok(())
}
