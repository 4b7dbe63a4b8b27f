use std::{fs, io::{Cursor, Read, Seek}, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::ArchiveError;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Open an in-memory zip archive, rejecting it if any member path escapes its root.
pub(crate) fn open_zip(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("failed to read zip archive")?;
    validate_members(&mut archive)?;
    Ok(archive)
}

/// Check every member path before anything is written.
/// A single member escaping the destination rejects the whole archive.
fn validate_members<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i)
            .with_context(|| format!("failed to read zip entry #{i}"))?;
        if file.enclosed_name().is_none() {
            return Err(ArchiveError::UnsafePath { member: file.name().to_string() }.into());
        }
    }
    Ok(())
}

/// Extracts the given in-memory `.zip` to the target directory.
pub(crate) fn extract_zip(bytes: &[u8], dest_dir: &Path) -> Result<()> {
    let mut archive = open_zip(bytes)?;

    ensure_dir_exists(dest_dir)?;
    archive.extract(dest_dir)
        .with_context(|| format!("failed to extract archive to {}", dest_dir.display()))?;

    Ok(())
}

/// Return the first file under `root` (sorted, recursive) whose extension matches, if any.
pub(crate) fn find_first_file(root: &Path, extension: &str) -> Option<PathBuf> {
    let mut matches = WalkDir::new(root).into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension)))
        .collect::<Vec<_>>();
    matches.sort();
    matches.into_iter().next()
}
