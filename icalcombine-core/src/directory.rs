//! Download/export directory checks and listing.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CombineError, CombineResult};

/// Create `dir` if it is missing and verify that it is writable.
///
/// Writability is probed by creating (and immediately dropping) a temp file
/// inside the directory, so permission bits, read-only mounts and ACLs are
/// all covered.
pub fn prepare(dir: &Path) -> CombineResult<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|_| CombineError::DirectoryNotWritable(dir.to_path_buf()))?;
        info!("Created missing directory: {}", dir.display());
    }

    if !dir.is_dir() {
        return Err(CombineError::DirectoryNotWritable(dir.to_path_buf()));
    }

    tempfile::tempfile_in(dir).map_err(|e| {
        debug!("Write probe in {} failed: {e}", dir.display());
        CombineError::DirectoryNotWritable(dir.to_path_buf())
    })?;

    Ok(())
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn list_files(dir: &Path) -> CombineResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// File names for log output.
pub fn display_names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}
