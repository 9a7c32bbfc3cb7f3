//! Startup discovery of cacheable files.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::error::ScanError;

/// Returns true when `filename` contains any of `extensions` as a substring.
///
/// This is deliberately looser than a suffix check: `report.html.bak`
/// matches `.html`.
pub fn matches_extension<S: AsRef<str>>(filename: &str, extensions: &[S]) -> bool {
    extensions
        .iter()
        .any(|ext| filename.contains(ext.as_ref()))
}

/// Walk `root` and collect every file whose name matches `extensions`.
///
/// Directories are always descended into. Symlinks are not followed as
/// directories, but a link that resolves to a regular file is kept under its
/// own name. The walk is iterative and yields entries in file-name order
/// within each directory. The first I/O error aborts the whole scan.
pub fn scan<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| ScanError::Walk {
            root: root.to_path_buf(),
            source,
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        // Dangling links and links to directories.
        if file_type.is_symlink() && !entry.path().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if matches_extension(&name, extensions) {
            files.push(entry.into_path());
        }
    }

    debug!(
        target = "vitrine::cache::scanner",
        root = %root.display(),
        matched = files.len(),
        "Asset scan complete"
    );

    Ok(files)
}
