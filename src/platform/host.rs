use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use sysinfo::System;
use tracing::{info, warn};

use super::{Connectivity, DeviceActivity, MemoryMonitor, SettingsStore, SystemControl};

/// Device activity stub for hosts without an interaction model.
pub struct AlwaysIdle;

impl DeviceActivity for AlwaysIdle {
    fn is_idle(&self) -> bool {
        true
    }

    fn is_audio_queue_empty(&self) -> bool {
        true
    }
}

/// Connectivity stub for hosts with permanent network access.
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Memory monitor backed by the `sysinfo` crate, refreshed on every read.
pub struct SysinfoMemoryMonitor {
    system: Mutex<System>,
}

impl SysinfoMemoryMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoMemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMonitor for SysinfoMemoryMonitor {
    fn free_bytes(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.available_memory()
    }
}

/// Memory monitor reporting a settable fixed value. Useful for embedders
/// with their own accounting and for exercising the pressure guards.
pub struct FixedMemory {
    bytes: AtomicU64,
}

impl FixedMemory {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
        }
    }

    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryMonitor for FixedMemory {
    fn free_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Settings persisted as a single flat JSON object.
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Mutex<HashMap<String, i64>>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!("settings file {} unreadable: {err}", path.display());
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn persist(&self, values: &HashMap<String, i64>) {
        match serde_json::to_string(values) {
            Ok(text) => {
                if let Err(err) = std::fs::write(&self.path, text) {
                    warn!("failed to persist settings to {}: {err}", self.path.display());
                }
            }
            Err(err) => warn!("failed to serialize settings: {err}"),
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values.lock().get(key).copied().unwrap_or(default)
    }

    fn set_int(&self, key: &str, value: i64) {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);
        self.persist(&values);
    }
}

/// Records a restart request and logs it. Hosted processes rarely want the
/// engine rebooting them; embedders wire their own handler instead.
pub struct LoggingSystemControl {
    requested: AtomicBool,
}

impl LoggingSystemControl {
    pub fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
        }
    }

    pub fn restart_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl Default for LoggingSystemControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemControl for LoggingSystemControl {
    fn request_restart(&self) {
        info!("restart requested after resource rebuild");
        self.requested.store(true, Ordering::Release);
    }
}
