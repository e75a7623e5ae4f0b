//! Seams to the host device. The engine never talks to hardware or system
//! services directly; everything it needs from the outside world comes
//! through these traits.

mod host;

pub use host::{
    AlwaysIdle, AlwaysOnline, FixedMemory, JsonSettingsStore, LoggingSystemControl,
    SysinfoMemoryMonitor,
};

use std::path::PathBuf;
use std::sync::Arc;

/// Answers whether the device is busy with the user right now.
pub trait DeviceActivity: Send + Sync {
    fn is_idle(&self) -> bool;
    fn is_audio_queue_empty(&self) -> bool;
}

/// Answers whether the network is reachable at all. Cheap to call; the
/// downloader consults it before and during every transfer.
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Reports free memory for the allocation guards.
pub trait MemoryMonitor: Send + Sync {
    fn free_bytes(&self) -> u64;
}

/// A small persistent key-value store for engine settings.
pub trait SettingsStore: Send + Sync {
    fn get_int(&self, key: &str, default: i64) -> i64;
    fn set_int(&self, key: &str, value: i64);
}

/// Receives the restart request issued after a successful rebuild of the
/// packed blob. What "restart" means is the embedder's decision.
pub trait SystemControl: Send + Sync {
    fn request_restart(&self);
}

/// Bundle of every seam, passed to the engine on construction.
#[derive(Clone)]
pub struct Platform {
    pub activity: Arc<dyn DeviceActivity>,
    pub connectivity: Arc<dyn Connectivity>,
    pub memory: Arc<dyn MemoryMonitor>,
    pub settings: Arc<dyn SettingsStore>,
    pub system: Arc<dyn SystemControl>,
}

impl Platform {
    /// Default bundle for a hosted OS: always idle, always online, sysinfo
    /// memory readings, JSON-file settings, log-only restart handling.
    pub fn host(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            activity: Arc::new(AlwaysIdle),
            connectivity: Arc::new(AlwaysOnline),
            memory: Arc::new(SysinfoMemoryMonitor::new()),
            settings: Arc::new(JsonSettingsStore::new(settings_path)),
            system: Arc::new(LoggingSystemControl::new()),
        }
    }
}
