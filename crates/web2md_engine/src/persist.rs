use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Extension of every document written by the pipeline.
pub const MARKDOWN_EXTENSION: &str = "md";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path:?} unusable: {source}")]
    OutputDir { path: PathBuf, source: io::Error },
    #[error("output path {0:?} exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Where a document ends up: `{directory}/{filename}.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub directory: PathBuf,
    pub filename: String,
}

impl OutputTarget {
    pub fn new(directory: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{MARKDOWN_EXTENSION}", self.filename))
    }
}

/// Ensure output directory exists; create it and any missing parents.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(PersistError::NotADirectory(dir.to_path_buf()));
        }
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| PersistError::OutputDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `content` to the target by writing a temp file in the same
/// directory and renaming it over the destination. A failed write leaves
/// neither a partial document nor the temp file behind.
pub fn write_document(target: &OutputTarget, content: &str) -> Result<PathBuf, PersistError> {
    ensure_output_dir(&target.directory)?;

    let path = target.path();
    let write_err = |source: io::Error| PersistError::Write {
        path: path.clone(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(&target.directory).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.as_file_mut().sync_all().map_err(write_err)?;

    // persist() replaces an existing file on every platform tempfile supports.
    tmp.persist(&path).map_err(|e| write_err(e.error))?;
    Ok(path)
}
