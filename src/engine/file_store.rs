// Local store lifecycle. The resource root is mounted (verified writable)
// before anything touches it; a hopelessly corrupt root can be wiped and
// recreated instead of failing forever.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sysinfo::Disks;
use tracing::{debug, info, warn};

use crate::config::ResourceConfig;
use crate::engine::cleanup;
use crate::error::{ResourceResult, StorageError};

const PROBE_FILENAME: &str = ".mount_probe";

pub struct FileStore {
    config: Arc<ResourceConfig>,
    mounted: AtomicBool,
}

impl FileStore {
    pub fn new(config: Arc<ResourceConfig>) -> Self {
        Self {
            config,
            mounted: AtomicBool::new(false),
        }
    }

    /// Makes the resource root usable: the directory exists and a probe
    /// file can be written. When the root is unusable and wiping is
    /// allowed, clears it and tries once more. Idempotent.
    pub fn mount(&self) -> ResourceResult<()> {
        if self.mounted.load(Ordering::SeqCst) {
            warn!("store already mounted");
            return Ok(());
        }

        let base = self.config.filesystem.base_path.clone();
        info!("mounting resource store at {}", base.display());

        if let Err(err) = self.try_prepare(&base) {
            warn!("mount attempt failed: {err}");
            if !self.config.filesystem.wipe_on_mount_failure {
                return Err(StorageError::MountFailed(err.to_string()).into());
            }
            info!("wiping resource root and retrying");
            let _ = std::fs::remove_dir_all(&base);
            self.try_prepare(&base)
                .map_err(|err| StorageError::MountFailed(err.to_string()))?;
        }

        let free = self.free_space();
        if free == u64::MAX {
            info!("store mounted, free space unknown");
        } else {
            info!("store mounted, {} bytes free", free);
        }

        self.mounted.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn try_prepare(&self, base: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(base)?;
        let probe = base.join(PROBE_FILENAME);
        std::fs::write(&probe, b"ok")?;
        std::fs::remove_file(&probe)?;
        Ok(())
    }

    pub fn unmount(&self) {
        if self.mounted.swap(false, Ordering::SeqCst) {
            info!("store unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn ensure_mounted(&self) -> Result<(), StorageError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(StorageError::NotMounted)
        }
    }

    pub fn ensure_dir(&self, path: &Path) -> Result<(), StorageError> {
        self.ensure_mounted()?;
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    /// Free bytes on the disk holding the resource root. Picks the disk
    /// whose mount point is the longest prefix of the root path. No match
    /// reads as unlimited so a probe-less host never starves downloads.
    pub fn free_space(&self) -> u64 {
        let disks = Disks::new_with_refreshed_list();
        let base = &self.config.filesystem.base_path;

        let mut best: Option<(usize, u64)> = None;
        for disk in disks.list() {
            let mount = disk.mount_point();
            if base.starts_with(mount) {
                let depth = mount.components().count();
                if best.map_or(true, |(d, _)| depth >= d) {
                    best = Some((depth, disk.available_space()));
                }
            }
        }

        match best {
            Some((_, available)) => {
                debug!("free space at {}: {} bytes", base.display(), available);
                available
            }
            None => {
                debug!("no disk matches {}, treating space as ample", base.display());
                u64::MAX
            }
        }
    }

    /// Best-effort space recovery: sweeps temp leftovers from every
    /// directory the engine writes to. Returns bytes freed.
    pub fn reclaim_space(&self) -> u64 {
        info!("reclaiming space");
        let mut freed = 0u64;
        for dir in [
            self.config.filesystem.base_path.clone(),
            self.config.image_dir(),
            self.config.emoticon_dir(),
        ] {
            let (_, bytes) = cleanup::sweep_temporary(&dir);
            freed += bytes;
        }
        let known = cleanup::sweep_known_temps(&self.config);
        if known > 0 {
            debug!("removed {} known temp files", known);
        }
        info!("reclaimed {} bytes", freed);
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_at(dir: &Path) -> FileStore {
        let mut config = ResourceConfig::default();
        config.filesystem.base_path = dir.join("resources");
        FileStore::new(Arc::new(config))
    }

    #[test]
    fn mount_creates_root_and_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());

        assert!(!store.is_mounted());
        store.mount().unwrap();
        assert!(store.is_mounted());
        assert!(dir.path().join("resources").is_dir());

        // Second mount is a no-op.
        store.mount().unwrap();

        store.unmount();
        assert!(store.ensure_mounted().is_err());
    }

    #[test]
    fn reclaim_sweeps_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());
        store.mount().unwrap();

        let base = dir.path().join("resources");
        std::fs::write(base.join("leftover.tmp"), b"xxxx").unwrap();
        std::fs::write(base.join("frames.json"), b"").unwrap();
        std::fs::write(base.join("keep.bin"), b"data").unwrap();

        let freed = store.reclaim_space();
        assert_eq!(freed, 4);
        assert!(!base.join("leftover.tmp").exists());
        assert!(!base.join("frames.json").exists());
        assert!(base.join("keep.bin").exists());
    }
}
