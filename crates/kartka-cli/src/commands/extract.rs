//! Extract command - process one front/list pair.

use std::path::PathBuf;

use colored::Colorize;
use kartka::batch::RESULT_FILE;
use kartka::extraction::Resolution;
use kartka::persist::write_json_atomic;
use kartka::FieldExtractionPipeline;

use crate::cli::{ModelArgs, PipelineArgs};

pub fn run(
    front: PathBuf,
    list: PathBuf,
    args: PipelineArgs,
    json: bool,
    model_args: &ModelArgs,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = super::pipeline_options(&args)?;
    let model = super::build_model(model_args)?;
    let pipeline = FieldExtractionPipeline::new(model, options);

    if !json {
        println!(
            "{} {} + {}",
            "Extracting".cyan().bold(),
            front.display().to_string().white(),
            list.display().to_string().white()
        );
    }

    let result = pipeline.run_with_progress(&front, &list, &args.outdir, &|stage| {
        if verbose && !json {
            println!("  {:>3}% {:?}", stage.percent(), stage);
        }
    })?;

    let result_path = args.outdir.join(RESULT_FILE);
    write_json_atomic(&result_path, &result)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!(
        "Variant: {} (confidence {})",
        result.variant.detected.to_string().white().bold(),
        result
            .variant
            .confidence
            .map_or("n/a".to_string(), |c| format!("{c:.2}"))
    );

    match result.outputs.nationality.parsed() {
        Some(n) => println!(
            "Nationality: match {:?}, is_jewish {:?}, confidence {:?}",
            n.matched.as_deref().unwrap_or(""),
            n.is_jewish,
            n.confidence
        ),
        None => println!("Nationality: {}", "unreadable reply".yellow()),
    }

    let band = &result.outputs.right_band.normalized;
    println!(
        "List page: {} {}.{}.",
        band.surname, band.initials.name, band.initials.patronymic
    );

    match result.outputs.fio.parsed() {
        Some(fio) => {
            println!(
                "Head of family: {} {} {}",
                fio.surname.as_deref().unwrap_or("?").white().bold(),
                fio.name.as_deref().unwrap_or("?").white().bold(),
                fio.patronymic.as_deref().unwrap_or("-").white().bold()
            );
            if let Some(checks) = &fio.checks {
                if checks.resolution == Resolution::PreferFrontDueToInitialsConflict {
                    println!("  {}", "initials conflict: front page preferred".yellow());
                }
            }
        }
        None => println!("Head of family: {}", "unreadable reply".yellow()),
    }

    println!();
    if result.needs_manual_review() {
        println!("{}", "Flagged for manual review".red().bold());
        if let Some(review) = &result.review {
            for advisory in &review.advisories {
                println!("  {} {}", "warning:".yellow(), advisory);
            }
        }
    }
    println!(
        "{} {}",
        "Saved to".green().bold(),
        result_path.display().to_string().white()
    );

    Ok(())
}
