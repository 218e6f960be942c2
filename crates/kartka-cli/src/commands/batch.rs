//! Batch command - process every pair in a directory as a background job.

use std::path::PathBuf;

use colored::Colorize;
use kartka::{BatchItem, BatchRunner, FieldExtractionPipeline, JobRegistry, PairingMode};

use crate::cli::{ModelArgs, PipelineArgs};

pub fn run(
    dir: PathBuf,
    args: PipelineArgs,
    classified: bool,
    workers: usize,
    model_args: &ModelArgs,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Directory not found: {}", dir.display()).into());
    }

    let options = super::pipeline_options(&args)?;
    let model = super::build_model(model_args)?;
    let runner =
        BatchRunner::new(FieldExtractionPipeline::new(model, options)).with_concurrency(workers);
    let mode = if classified {
        PairingMode::Classified
    } else {
        PairingMode::Sorted
    };
    let outdir = args.outdir.clone();

    println!(
        "{} {} ({:?} pairing)",
        "Processing".cyan().bold(),
        dir.display().to_string().white(),
        mode
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(async {
        let registry = JobRegistry::new();
        let mut handle = registry
            .spawn("batch", move |progress| {
                progress.report(0, "discovering pairs");
                let pairs = runner.discover(&dir, mode, &outdir)?;
                runner.run_with_progress(&pairs, &outdir, &|done, total| {
                    progress.items(done, total)
                })
            })
            .await;

        while let Some(update) = handle.next_progress().await {
            if verbose || update.status.is_finished() {
                println!("  {:>3}% {}", update.percent, update.message);
            }
        }
        handle.wait().await
    })?;

    println!();
    for item in &report.items {
        match item {
            BatchItem::Completed {
                pair,
                needs_manual_review,
                advisories,
                ..
            } => {
                let mark = if *needs_manual_review {
                    "review".red().bold()
                } else {
                    "ok".green()
                };
                let fallback = if pair.fallback { " (fallback pairing)" } else { "" };
                println!("  {:8} {}{}", mark, pair.dir_name(), fallback.yellow());
                for advisory in advisories {
                    println!("           {} {}", "warning:".yellow(), advisory);
                }
            }
            BatchItem::Failed { pair, error } => {
                println!("  {:8} {}: {}", "failed".red(), pair.dir_name(), error);
            }
        }
    }

    println!();
    println!(
        "Processed {} pairs ({} completed, {} failed, {} flagged for review)",
        report.count.to_string().white().bold(),
        report.completed.to_string().green(),
        report.failed.to_string().red(),
        report.flagged.to_string().yellow()
    );
    println!(
        "{} {}",
        "Saved to".green().bold(),
        args.outdir.join(kartka::batch::BATCH_FILE).display().to_string().white()
    );

    Ok(())
}
