// Background frame preloading. One session at a time walks the frame
// indices in ascending order, giving way to user-facing work (audio
// activity, memory pressure, a time budget, an explicit cancel) instead of
// competing with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ResourceConfig;
use crate::error::{MemoryError, ResourceResult, StateError};
use crate::platform::{DeviceActivity, MemoryMonitor};
use crate::progress::ProgressSink;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Every index was visited.
    Completed,
    Cancelled,
    /// Stopped because audio playback needs the device.
    AudioYield,
    TimeBudgetExceeded,
    MemoryExhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct PreloadReport {
    pub outcome: PreloadOutcome,
    pub loaded: u32,
    pub total: u32,
}

impl PreloadReport {
    /// Partial progress still counts as useful work.
    pub fn useful(&self) -> bool {
        self.outcome == PreloadOutcome::Completed || self.loaded > 0
    }
}

pub struct Preloader {
    config: Arc<ResourceConfig>,
    activity: Arc<dyn DeviceActivity>,
    memory: Arc<dyn MemoryMonitor>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl Preloader {
    pub fn new(
        config: Arc<ResourceConfig>,
        activity: Arc<dyn DeviceActivity>,
        memory: Arc<dyn MemoryMonitor>,
    ) -> Self {
        Self {
            config,
            activity,
            memory,
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Visible preload: progress events flow, the configured time budget
    /// applies (zero means unlimited).
    pub async fn preload_remaining<L, C>(
        &self,
        total: u32,
        load: L,
        check: C,
        progress: &ProgressSink,
    ) -> ResourceResult<PreloadReport>
    where
        L: FnMut(u32) -> bool,
        C: Fn(u32) -> bool,
    {
        let budget = self.config.preload.time_budget_ms;
        self.run(false, budget, total, load, check, progress).await
    }

    /// Silent preload: no progress surface, no audio yielding, a caller
    /// supplied time budget. Used right after boot while the UI is idle.
    pub async fn preload_silent<L, C>(
        &self,
        total: u32,
        load: L,
        check: C,
        time_budget_ms: u64,
    ) -> ResourceResult<PreloadReport>
    where
        L: FnMut(u32) -> bool,
        C: Fn(u32) -> bool,
    {
        let progress = ProgressSink::disabled();
        self.run(true, time_budget_ms, total, load, check, &progress)
            .await
    }

    /// Flags the running session to stop. Non-blocking; the session notices
    /// at its next index.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Polls until the running session ends. Zero timeout waits forever.
    /// Returns false when the timeout expired first.
    pub async fn wait_for_finish(&self, timeout_ms: u64) -> bool {
        let deadline =
            (timeout_ms != 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));
        while self.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
        }
        true
    }

    async fn run<L, C>(
        &self,
        silent: bool,
        time_budget_ms: u64,
        total: u32,
        load: L,
        check: C,
        progress: &ProgressSink,
    ) -> ResourceResult<PreloadReport>
    where
        L: FnMut(u32) -> bool,
        C: Fn(u32) -> bool,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(StateError::PreloadAlreadyRunning.into());
        }
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();

        let result = self
            .session(silent, time_budget_ms, total, load, check, progress, token)
            .await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn session<L, C>(
        &self,
        silent: bool,
        time_budget_ms: u64,
        total: u32,
        mut load: L,
        check: C,
        progress: &ProgressSink,
        token: CancellationToken,
    ) -> ResourceResult<PreloadReport>
    where
        L: FnMut(u32) -> bool,
        C: Fn(u32) -> bool,
    {
        let free = self.memory.free_bytes();
        if !silent {
            info!("preload starting, free memory {} bytes", free);
        }
        let threshold = self.config.memory.preload_threshold;
        if free < threshold {
            warn!("not enough memory to preload: {} < {}", free, threshold);
            return Err(MemoryError::BelowFloor {
                free,
                required: threshold,
            }
            .into());
        }

        if !silent {
            progress.emit(0, total as i32, Some("Preparing image preload..."));
        }

        let start = Instant::now();
        let budget =
            (time_budget_ms != 0).then(|| Duration::from_millis(time_budget_ms));
        let interval = self.config.preload.audio_check_interval;
        let report_every = self.config.preload.progress_update_interval.max(1);
        let mut loaded = 0u32;

        for index in 1..=total {
            // Per-frame progress is throttled; stop and completion
            // announcements always go out.
            let announce = !silent && index % report_every == 0;
            if token.is_cancelled() {
                info!("preload cancelled at image {}", index);
                self.announce_stop(silent, progress, loaded, total, "Preload cancelled")
                    .await;
                return Ok(self.report(PreloadOutcome::Cancelled, loaded, total));
            }

            if !silent && interval != 0 && index % interval == 0 {
                if !self.activity.is_audio_queue_empty() || !self.activity.is_idle() {
                    warn!("audio activity detected, yielding preload");
                    self.announce_stop(
                        silent,
                        progress,
                        loaded,
                        total,
                        "Preload interrupted: audio activity",
                    )
                    .await;
                    return Ok(self.report(PreloadOutcome::AudioYield, loaded, total));
                }
            }

            if let Some(budget) = budget {
                if start.elapsed() >= budget {
                    info!("preload time budget exhausted at image {}", index);
                    self.announce_stop(
                        silent,
                        progress,
                        loaded,
                        total,
                        "Preload time budget exhausted",
                    )
                    .await;
                    return Ok(self.report(PreloadOutcome::TimeBudgetExceeded, loaded, total));
                }
            }

            let free = self.memory.free_bytes();
            if free < self.config.memory.preload_floor {
                warn!("memory ran low during preload: {} bytes", free);
                self.announce_stop(silent, progress, loaded, total, "Preload stopped: low memory")
                    .await;
                return Ok(self.report(PreloadOutcome::MemoryExhausted, loaded, total));
            }

            if check(index) {
                loaded += 1;
                if announce {
                    progress.emit(
                        loaded as i32,
                        total as i32,
                        Some(&format!("Image {index} already loaded, skipping...")),
                    );
                }
                continue;
            }

            if !silent {
                info!("preloading image {}/{}", index, total);
            }
            if announce {
                progress.emit(
                    loaded as i32,
                    total as i32,
                    Some(&format!("Preloading image {index}/{total}")),
                );
            }

            if load(index) {
                loaded += 1;
                if announce {
                    progress.emit(
                        loaded as i32,
                        total as i32,
                        Some(&format!("Image {index} preloaded")),
                    );
                }
            } else {
                warn!("preloading image {} failed, continuing", index);
                if announce {
                    progress.emit(
                        loaded as i32,
                        total as i32,
                        Some(&format!("Image {index} failed, moving on")),
                    );
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.preload.load_delay_ms)).await;
        }

        if !silent {
            info!(
                "preload finished, {}/{} loaded, {} bytes free",
                loaded,
                total,
                self.memory.free_bytes()
            );
            let message = if loaded == total {
                "All images preloaded".to_string()
            } else {
                format!("Preload finished: {loaded}/{total} images")
            };
            progress.emit(loaded as i32, total as i32, Some(&message));
            tokio::time::sleep(Duration::from_millis(200)).await;
            progress.emit(loaded as i32, total as i32, None);
        }

        Ok(self.report(PreloadOutcome::Completed, loaded, total))
    }

    async fn announce_stop(
        &self,
        silent: bool,
        progress: &ProgressSink,
        loaded: u32,
        total: u32,
        message: &str,
    ) {
        if silent {
            return;
        }
        progress.emit(loaded as i32, total as i32, Some(message));
        tokio::time::sleep(Duration::from_millis(200)).await;
        progress.emit(loaded as i32, total as i32, None);
    }

    fn report(&self, outcome: PreloadOutcome, loaded: u32, total: u32) -> PreloadReport {
        PreloadReport {
            outcome,
            loaded,
            total,
        }
    }
}
