use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

/// Magic tag at the start of a binary image container ("BIMG" read as LE u32).
pub const BINARY_IMAGE_MAGIC: u32 = 0x4249_4D47;

/// Container layout version this engine reads and writes.
pub const BINARY_IMAGE_VERSION: u32 = 1;

/// Fixed size of the binary container header in bytes.
pub const CONTAINER_HEADER_SIZE: usize = 32;

/// Upper bound accepted for a container payload (sanity check, ~200 KB).
pub const MAX_CONTAINER_DATA_SIZE: u32 = 200_000;

/// Fixed emoticon file names, slot order is part of the manifest contract.
pub const EMOTICON_FILENAMES: [&str; 6] = [
    "happy.bin",
    "sad.bin",
    "angry.bin",
    "surprised.bin",
    "calm.bin",
    "shy.bin",
];

/// Fallback emoticon URLs used when the manifest omits the emoji section.
pub const DEFAULT_EMOTICON_URLS: [&str; 6] = [
    "https://imgbad.xmduzhong.com/i/2025/10/27/h50yza_0001.bin",
    "https://imgbad.xmduzhong.com/i/2025/10/27/h5ghmi_0001.bin",
    "https://imgbad.xmduzhong.com/i/2025/10/27/h4cm5f_0001.bin",
    "https://imgbad.xmduzhong.com/i/2025/10/27/h5qw39_0001.bin",
    "https://imgbad.xmduzhong.com/i/2025/10/27/h4uokk_0001.bin",
    "https://imgbad.xmduzhong.com/i/2025/10/27/h5lop1_0001.bin",
];

/// Settings key holding the persisted display mode.
pub const DISPLAY_MODE_KEY: &str = "display_mode";

/// Network tuning for manifest fetches and file downloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum attempts per file.
    pub retry_count: u32,
    /// Base retry delay; actual delay is this times the attempt number.
    pub retry_delay_ms: u64,
    /// Write-buffer capacity for streamed downloads in bytes.
    pub buffer_size: usize,
    /// Pause between files in a batch.
    pub connection_delay_ms: u64,
    /// Settle delay after the connectivity precondition passes.
    pub stabilize_ms: u64,
    /// Reuse TCP connections across requests.
    pub keep_alive: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry_count: 3,
            retry_delay_ms: 3_000,
            buffer_size: 16 * 1024,
            connection_delay_ms: 200,
            stabilize_ms: 300,
            keep_alive: true,
        }
    }
}

/// Free-memory thresholds gating downloads and preloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Below this the download write buffer shrinks to a quarter.
    pub allocation_threshold: u64,
    /// Below this the download write buffer shrinks to a half; also the
    /// re-check cadence in bytes while streaming.
    pub download_threshold: u64,
    /// Minimum free memory to start a preload session.
    pub preload_threshold: u64,
    /// Hard floor checked before and during each download.
    pub download_floor: u64,
    /// Hard floor checked between preloaded frames.
    pub preload_floor: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            allocation_threshold: 150 * 1024,
            download_threshold: 250 * 1024,
            preload_threshold: 400 * 1024,
            download_floor: 100_000,
            preload_floor: 200_000,
        }
    }
}

/// On-disk layout of the resource store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    /// Root of the resource store.
    pub base_path: PathBuf,
    /// Subdirectory for animation frames, logo and the packed blob.
    pub image_subdir: String,
    /// Subdirectory for emoticon sprites.
    pub emoticon_subdir: String,
    pub logo_filename: String,
    pub packed_filename: String,
    /// Wipe and recreate the root when the mount probe fails.
    pub wipe_on_mount_failure: bool,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/resources"),
            image_subdir: "images".to_string(),
            emoticon_subdir: "emoticons".to_string(),
            logo_filename: "logo.bin".to_string(),
            packed_filename: "packed.rgb".to_string(),
            wipe_on_mount_failure: true,
        }
    }
}

/// Pixel geometry shared by frames, the logo and emoticons.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Number of animation frames the store holds.
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    /// 2 for RGB565, 3 for RGB888.
    pub bytes_per_pixel: u32,
    /// Attempt packed-blob loading before per-frame files.
    pub packed_loading: bool,
    /// Convert legacy hex-array files to containers when encountered.
    pub legacy_conversion: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            frame_count: 9,
            width: 240,
            height: 240,
            bytes_per_pixel: 2, // RGB565
            packed_loading: true,
            legacy_conversion: true,
        }
    }
}

/// Preload pacing and guard cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Audio/idle state is consulted every this many frames.
    pub audio_check_interval: u32,
    /// Delay between consecutive frame loads.
    pub load_delay_ms: u64,
    /// Emit a progress event every this many frames.
    pub progress_update_interval: u32,
    /// Wall-clock budget per session in milliseconds, 0 means unlimited.
    pub time_budget_ms: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            audio_check_interval: 3,
            load_delay_ms: 10,
            progress_update_interval: 2,
            time_budget_ms: 0,
        }
    }
}

/// Top-level configuration for the resource engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub network: NetworkConfig,
    pub memory: MemoryConfig,
    pub filesystem: FilesystemConfig,
    pub image: ImageConfig,
    pub preload: PreloadConfig,
}

impl ResourceConfig {
    /// Byte size of one frame at the configured geometry.
    pub fn frame_size(&self) -> usize {
        (self.image.width * self.image.height * self.image.bytes_per_pixel) as usize
    }

    /// Byte size of the packed blob holding every frame.
    pub fn packed_size(&self) -> u64 {
        self.frame_size() as u64 * u64::from(self.image.frame_count)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.filesystem.base_path.join(&self.filesystem.image_subdir)
    }

    pub fn emoticon_dir(&self) -> PathBuf {
        self.filesystem.base_path.join(&self.filesystem.emoticon_subdir)
    }

    /// Path of a frame file; `index` is 1-based.
    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.image_dir().join(format!("output_{index:04}.bin"))
    }

    /// Legacy hex-array variant of a frame file; `index` is 1-based.
    pub fn frame_legacy_path(&self, index: u32) -> PathBuf {
        self.image_dir().join(format!("output_{index:04}.h"))
    }

    pub fn logo_path(&self) -> PathBuf {
        self.image_dir().join(&self.filesystem.logo_filename)
    }

    /// Legacy hex-array logo kept for migration.
    pub fn logo_legacy_path(&self) -> PathBuf {
        self.image_dir().join("logo.h")
    }

    pub fn packed_path(&self) -> PathBuf {
        self.image_dir().join(&self.filesystem.packed_filename)
    }

    /// Path of an emoticon sprite; `slot` is 0-based manifest order.
    pub fn emoticon_path(&self, slot: usize) -> PathBuf {
        self.emoticon_dir().join(EMOTICON_FILENAMES[slot])
    }

    pub fn image_url_cache_path(&self) -> PathBuf {
        self.filesystem.base_path.join("image_urls.json")
    }

    pub fn logo_url_cache_path(&self) -> PathBuf {
        self.filesystem.base_path.join("logo_url.json")
    }

    pub fn emoticon_url_cache_path(&self) -> PathBuf {
        self.filesystem.base_path.join("emoticon_urls.json")
    }

    /// Checks tuning values against their working ranges, logging each
    /// violation. Returns false if any value is out of range.
    pub fn validate(&self) -> bool {
        let mut ok = true;
        if !(5_000..=60_000).contains(&self.network.timeout_ms) {
            warn!("network.timeout_ms {} outside 5000..=60000", self.network.timeout_ms);
            ok = false;
        }
        if !(1..=10).contains(&self.network.retry_count) {
            warn!("network.retry_count {} outside 1..=10", self.network.retry_count);
            ok = false;
        }
        if !(4_096..=32_768).contains(&self.network.buffer_size) {
            warn!("network.buffer_size {} outside 4096..=32768", self.network.buffer_size);
            ok = false;
        }
        if self.image.frame_count == 0 || self.image.frame_count > 20 {
            warn!("image.frame_count {} outside 1..=20", self.image.frame_count);
            ok = false;
        }
        if self.image.bytes_per_pixel != 2 && self.image.bytes_per_pixel != 3 {
            warn!("image.bytes_per_pixel {} is neither RGB565 nor RGB888", self.image.bytes_per_pixel);
            ok = false;
        }
        if self.preload.audio_check_interval == 0 {
            warn!("preload.audio_check_interval must be nonzero");
            ok = false;
        }
        ok
    }
}
