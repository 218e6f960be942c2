//! Regions command - show the region configuration.

use std::path::PathBuf;

use kartka::RegionConfig;

pub fn run(file: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match file {
        Some(path) => RegionConfig::load(&path)?,
        None => RegionConfig::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
