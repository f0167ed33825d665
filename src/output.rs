//! The module responsible for writing output data to disk.
use anyhow::{Context, Result, ensure};
use std::fs;
use std::path::Path;

pub mod metadata;

/// Create a directory (and its parents) if it doesn't already exist
pub fn create_output_directory(output_dir: &Path) -> Result<()> {
    if output_dir.is_dir() {
        // already exists
        return Ok(());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))
}

/// Check that a file some external tool was meant to produce exists and isn't empty
pub fn ensure_nonempty_file(file_path: &Path) -> Result<()> {
    let metadata = fs::metadata(file_path)
        .with_context(|| format!("Expected output was not created: {}", file_path.display()))?;
    ensure!(
        metadata.is_file() && metadata.len() > 0,
        "Expected output is empty: {}",
        file_path.display()
    );

    Ok(())
}

/// Remove a file left over from a previous run, if there is one
pub fn remove_stale_file(file_path: &Path) -> Result<()> {
    if file_path.is_file() {
        fs::remove_file(file_path)
            .with_context(|| format!("Could not remove {}", file_path.display()))?;
    }

    Ok(())
}
