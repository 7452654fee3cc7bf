//! Output files that only appear once fully written.

use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::PrepError;

/// Creates a temporary file next to `path` so the final rename stays on the
/// same file system. Missing parent directories are created.
pub fn staging_file(path: &Path) -> Result<NamedTempFile, PrepError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    std::fs::create_dir_all(&dir)?;

    Ok(NamedTempFile::new_in(dir)?)
}

/// Moves a staged file into place at `path`, replacing any previous file.
pub fn persist(file: NamedTempFile, path: &Path) -> Result<(), PrepError> {
    file.persist(path).map_err(|e| PrepError::Io(e.error))?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
