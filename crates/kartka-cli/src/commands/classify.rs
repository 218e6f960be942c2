//! Classify command - label every scan in a directory.

use std::path::PathBuf;

use colored::Colorize;
use kartka::acquire::CLASSIFICATION_FILE;
use kartka::{PageClassifier, PageType};

use crate::cli::ModelArgs;

pub fn run(
    dir: PathBuf,
    output: Option<PathBuf>,
    model_args: &ModelArgs,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Directory not found: {}", dir.display()).into());
    }
    let output = output.unwrap_or_else(|| dir.join(CLASSIFICATION_FILE));
    let model = super::build_model(model_args)?;

    println!(
        "{} {}",
        "Classifying".cyan().bold(),
        dir.display().to_string().white()
    );

    let classification =
        PageClassifier::new(model.as_ref()).classify_directory(&dir, Some(&output))?;

    if verbose {
        println!();
        for (name, record) in &classification.files {
            let label = match record.page_type {
                PageType::Front => "front".green(),
                PageType::List => "list".blue(),
                PageType::Other => "other".yellow(),
            };
            println!(
                "  {:30} {:6} {}",
                name,
                label,
                record.reason.as_deref().unwrap_or("")
            );
        }
    }

    println!();
    println!(
        "Classified {} files ({} front, {} list, {} other)",
        classification.total.to_string().white().bold(),
        classification.counts.front.to_string().green(),
        classification.counts.list.to_string().blue(),
        classification.counts.other.to_string().yellow()
    );
    println!(
        "{} {}",
        "Saved to".green().bold(),
        output.display().to_string().white()
    );

    Ok(())
}
