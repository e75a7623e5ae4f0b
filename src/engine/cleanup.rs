// Bulk file removal with user-visible progress, plus the temp-file sweep
// that keeps the store from silting up with halves of interrupted work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ResourceConfig;
use crate::progress::ProgressSink;

/// Deletes a list of files, reporting each one. Returns true when every
/// deletion succeeded. Pauses every few files to keep the executor fair.
pub async fn delete_files(files: &[PathBuf], progress: &ProgressSink) -> bool {
    if files.is_empty() {
        info!("nothing to delete");
        progress.emit(100, 100, Some("Nothing to delete"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        return true;
    }

    info!("deleting {} files", files.len());
    let mut deleted = 0usize;
    let mut failed = 0usize;

    for (i, path) in files.iter().enumerate() {
        let percent = ((i + 1) * 100 / files.len()) as i32;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.emit(
            percent,
            100,
            Some(&format!("Deleting {} ({}/{})", name, i + 1, files.len())),
        );

        match std::fs::remove_file(path) {
            Ok(()) => {
                deleted += 1;
                debug!("deleted {}", path.display());
            }
            Err(err) => {
                failed += 1;
                warn!("failed to delete {}: {err}", path.display());
            }
        }

        if i % 3 == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    info!("deletion done: {} removed, {} failed", deleted, failed);
    let message = if failed == 0 {
        format!("Deleted {deleted} files")
    } else {
        format!("Deleted {deleted}, failed {failed}")
    };
    progress.emit(100, 100, Some(&message));
    tokio::time::sleep(Duration::from_millis(800)).await;

    failed == 0
}

/// Removes the packed blob and every animation frame file, legacy variants
/// included. The packed blob always goes first; a stale pack must never
/// outlive the frames it was built from.
pub async fn delete_frame_files(config: &ResourceConfig, progress: &ProgressSink) -> bool {
    info!("removing animation frame files");

    if std::fs::remove_file(config.packed_path()).is_ok() {
        info!("removed packed file {}", config.packed_path().display());
    }

    progress.emit(0, 100, Some("Removing old animation frames..."));

    let mut existing = Vec::new();
    for i in 1..=config.image.frame_count {
        let bin = config.frame_path(i);
        if bin.exists() {
            existing.push(bin);
        }
        let legacy = config.frame_legacy_path(i);
        if legacy.exists() {
            existing.push(legacy);
        }
    }

    if existing.is_empty() {
        info!("no frame files to remove");
        progress.emit(100, 100, Some("Nothing to remove, preparing download..."));
        tokio::time::sleep(Duration::from_millis(300)).await;
        return true;
    }

    delete_files(&existing, progress).await
}

pub async fn delete_logo_files(config: &ResourceConfig, progress: &ProgressSink) -> bool {
    info!("removing logo files");
    progress.emit(0, 100, Some("Removing old logo..."));

    let mut existing = Vec::new();
    for path in [config.logo_path(), config.logo_legacy_path()] {
        if path.exists() {
            existing.push(path);
        }
    }

    if existing.is_empty() {
        progress.emit(100, 100, Some("Nothing to remove, preparing download..."));
        tokio::time::sleep(Duration::from_millis(300)).await;
        return true;
    }

    delete_files(&existing, progress).await
}

pub async fn delete_emoticon_files(config: &ResourceConfig, progress: &ProgressSink) -> bool {
    info!("removing emoticon files");
    progress.emit(0, 100, Some("Removing old emoticons..."));

    let existing: Vec<PathBuf> = (0..crate::config::EMOTICON_FILENAMES.len())
        .map(|slot| config.emoticon_path(slot))
        .filter(|p| p.exists())
        .collect();

    if existing.is_empty() {
        progress.emit(100, 100, Some("Nothing to remove, preparing download..."));
        tokio::time::sleep(Duration::from_millis(300)).await;
        return true;
    }

    delete_files(&existing, progress).await
}

/// Silently removes every frame file. Used by the full reset path.
pub fn clear_all_frames(config: &ResourceConfig) -> usize {
    let mut removed = 0usize;
    for i in 1..=config.image.frame_count {
        if std::fs::remove_file(config.frame_path(i)).is_ok() {
            removed += 1;
        }
        if std::fs::remove_file(config.frame_legacy_path(i)).is_ok() {
            removed += 1;
        }
    }
    info!("cleared {} frame files", removed);
    removed
}

/// Removes temp-suffixed leftovers and zero-byte JSON husks from one
/// directory. Returns files removed and bytes freed.
pub fn sweep_temporary(dir: &Path) -> (usize, u64) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot open {} for sweeping: {err}", dir.display());
            return (0, 0);
        }
    };

    let mut removed = 0usize;
    let mut freed = 0u64;

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        let mut stale = false;
        if name.len() > 4 {
            stale = name.ends_with(".tmp")
                || name.ends_with(".bak")
                || name.ends_with(".old")
                || name.contains(".temp")
                || name.contains('~');
        }
        if !stale && name.contains(".json") {
            if let Ok(meta) = entry.metadata() {
                if meta.len() == 0 {
                    debug!("sweeping empty cache file {}", name);
                    stale = true;
                }
            }
        }

        if stale {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    freed += size;
                    debug!("swept {}", name);
                }
                Err(err) => warn!("failed to sweep {}: {err}", name),
            }
        }
    }

    if removed > 0 {
        info!("swept {} temp files from {} ({} bytes)", removed, dir.display(), freed);
    }
    (removed, freed)
}

/// Removes the fixed set of scratch files earlier runs may have left at
/// known locations.
pub fn sweep_known_temps(config: &ResourceConfig) -> usize {
    let base = &config.filesystem.base_path;
    let mut candidates = vec![base.join("temp_packed.rgb"), base.join("downloading.tmp")];
    for part in 0..4 {
        candidates.push(config.image_dir().join(format!("packed_part_{part}.rgb")));
    }

    let mut removed = 0usize;
    for path in candidates {
        if std::fs::remove_file(&path).is_ok() {
            removed += 1;
            debug!("removed known temp {}", path.display());
        }
    }
    removed
}
