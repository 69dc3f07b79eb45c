//! Snapshot files
//!
//! A new snapshot never overwrites an old one: the previous file is first renamed to
//! `<stem>-<unix seconds>.<ext>` next to it, or `<stem>-<unix seconds>-<n>.<ext>` when
//! that name is already taken.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::predict::{Predictor, SharedPredictor};
use crate::{RecommenderError, Result};

const DEFAULT_EXTENSION: &str = "network";

fn stem_and_extension(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    (stem, ext)
}

/// Backup name for `path` stamped with `timestamp`
pub fn backup_path(path: &Path, timestamp: i64) -> PathBuf {
    let (stem, ext) = stem_and_extension(path);
    path.with_file_name(format!("{}-{}.{}", stem, timestamp, ext))
}

/// First backup name for `timestamp` that no existing file uses
fn free_backup_path(path: &Path, timestamp: i64) -> PathBuf {
    let mut candidate = backup_path(path, timestamp);
    let (stem, ext) = stem_and_extension(path);
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}-{}-{}.{}", stem, timestamp, n, ext));
        n += 1;
    }
    candidate
}

/// Move an existing snapshot out of the way.
///
/// Best effort: failures are logged and `None` is returned.
pub fn rotate_snapshot(path: &Path) -> Option<PathBuf> {
    rotate_snapshot_at(path, chrono::Utc::now().timestamp())
}

fn rotate_snapshot_at(path: &Path, timestamp: i64) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }
    let backup = free_backup_path(path, timestamp);
    match std::fs::rename(path, &backup) {
        Ok(()) => {
            log::info!("Moved previous network to {}", backup.display());
            Some(backup)
        }
        Err(e) => {
            log::warn!(
                "Failed to move old network {} to {}: {}",
                path.display(),
                backup.display(),
                e
            );
            None
        }
    }
}

/// Rotate any previous snapshot and write the predictor's current state to `path`
pub fn write_snapshot<P: Predictor>(predictor: &SharedPredictor<P>, path: &Path) -> Result<Option<PathBuf>> {
    let rotated = rotate_snapshot(path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            RecommenderError::Export(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }

    let file = File::create(path).map_err(|e| {
        RecommenderError::Export(format!("failed to open the output {}: {}", path.display(), e))
    })?;
    let mut writer = BufWriter::new(file);
    predictor.export(&mut writer)?;
    writer
        .into_inner()
        .map_err(|e| RecommenderError::Export(e.to_string()))?
        .sync_all()
        .map_err(|e| RecommenderError::Export(format!("failed to close the output file: {}", e)))?;

    log::info!("Saved network to {}", path.display());
    Ok(rotated)
}
