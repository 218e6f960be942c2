//! Kartka CLI - census family card extraction.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kartka=debug,kartka_cli=debug,warn"
    } else {
        "kartka=info,kartka_cli=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            front,
            list,
            pipeline,
            json,
        } => commands::extract::run(front, list, pipeline, json, &cli.model, cli.verbose),

        Commands::Batch {
            dir,
            pipeline,
            classified,
            workers,
        } => commands::batch::run(dir, pipeline, classified, workers, &cli.model, cli.verbose),

        Commands::Classify { dir, output } => {
            commands::classify::run(dir, output, &cli.model, cli.verbose)
        }

        Commands::Download {
            start,
            end,
            url_template,
            dest,
            sleep_min,
            sleep_max,
            retries,
            timeout,
            no_resume,
        } => commands::download::run(
            commands::download::DownloadArgs {
                start,
                end,
                url_template,
                dest,
                sleep_min,
                sleep_max,
                retries,
                timeout,
                resume: !no_resume,
            },
            cli.verbose,
        ),

        Commands::Regions { file } => commands::regions::run(file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
