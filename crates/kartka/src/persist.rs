//! Atomic JSON state files.
//!
//! Every document is staged in a temporary file next to its target and then
//! renamed over it, so readers never observe a half-written file.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{KartkaError, Result};

/// Write `value` as pretty JSON to `path`, replacing it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| KartkaError::io(parent, e))?;

    let staged = NamedTempFile::new_in(parent).map_err(|e| KartkaError::io(parent, e))?;
    {
        let mut writer = BufWriter::new(staged.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| KartkaError::io(path, e))?;
    }
    staged.persist(path).map_err(|e| {
        KartkaError::Persistence(format!("cannot replace '{}': {}", path.display(), e.error))
    })?;
    Ok(())
}

/// Read a JSON document written by [`write_json_atomic`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path).map_err(|e| KartkaError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
