//! Output file helpers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jwalk::WalkDir;
use rayon::prelude::*;

/// A file to be written, relative to some output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// `/`-separated path relative to the output directory.
    pub filename: String,
    pub content: Vec<u8>,
}

impl OutputFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// Write `content` to `path`, creating parent directories. Existing files are
/// overwritten.
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Write all `files` under `out_dir` in parallel. Returns the number written.
pub fn write_files(out_dir: &Path, files: &[OutputFile]) -> Result<usize> {
    files
        .par_iter()
        .try_for_each(|file| write_file(&out_dir.join(&file.filename), &file.content))?;
    Ok(files.len())
}

/// Recursively copy `src` into `dest`. A missing `src` copies nothing.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }

    let files: Vec<PathBuf> = WalkDir::new(src)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .collect();

    files.par_iter().try_for_each(|path| -> Result<()> {
        let relative = path.strip_prefix(src)?;
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &target)
            .with_context(|| format!("failed to copy {}", path.display()))?;
        Ok(())
    })?;
    Ok(files.len())
}
