//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Kartka: vision-model field extraction for 1926 census family cards
#[derive(Parser)]
#[command(name = "kartka")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

/// Model endpoint overrides. Unset values come from LLM_ENDPOINT,
/// LLM_MODEL and OPENAI_API_KEY, then built-in defaults.
#[derive(Args, Clone, Default)]
pub struct ModelArgs {
    /// Chat completions endpoint URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Vision model identifier
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// API key sent as bearer token
    #[arg(long, global = true)]
    pub api_key: Option<String>,
}

/// Options shared by the single-pair and batch commands.
#[derive(Args, Clone)]
pub struct PipelineArgs {
    /// Output directory
    #[arg(short, long, default_value = "./out")]
    pub outdir: PathBuf,

    /// Padding around each region, as a fraction of page size
    #[arg(long, default_value_t = kartka::config::DEFAULT_PAD)]
    pub pad: f64,

    /// Save overlay images with the region outlines
    #[arg(long)]
    pub overlay: bool,

    /// Null the patronymic when it does not start with the list-page initial
    #[arg(long)]
    pub enforce_initials: bool,

    /// JSON file with per-variant regions (ua/ru) overriding the defaults
    #[arg(long, value_name = "FILE")]
    pub regions: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract fields from one front/list pair
    Extract {
        /// Front page scan (questionnaire side)
        #[arg(value_name = "FRONT")]
        front: PathBuf,

        /// List page scan (family roster)
        #[arg(value_name = "LIST")]
        list: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract fields from every pair in a directory
    Batch {
        /// Directory with scans
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Classify pages first and pair by nearest following name
        #[arg(long)]
        classified: bool,

        /// Number of pairs processed at once
        #[arg(short, long, default_value = "1")]
        workers: usize,
    },

    /// Classify every scan in a directory as front, list or other
    Classify {
        /// Directory with scans
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Progress/result file (default: <DIR>/classification.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download a numbered range of scans
    Download {
        /// First index (inclusive)
        #[arg(long)]
        start: u64,

        /// Last index (inclusive)
        #[arg(long)]
        end: u64,

        /// URL with one {i} placeholder for the index
        #[arg(long)]
        url_template: String,

        /// Destination directory
        #[arg(long)]
        dest: PathBuf,

        /// Minimum delay between files, in seconds
        #[arg(long, default_value = "1.0")]
        sleep_min: f64,

        /// Maximum delay between files, in seconds
        #[arg(long, default_value = "3.0")]
        sleep_max: f64,

        /// Extra attempts per file
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Request timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// Always start over instead of resuming partial files
        #[arg(long)]
        no_resume: bool,
    },

    /// Print the region configuration as JSON
    Regions {
        /// Validate and print an override file instead of the defaults
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}
