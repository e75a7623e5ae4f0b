// The orchestration facade. Owns the store, the staleness check, the
// downloader, the loader and the preloader, and keeps the in-memory frame
// array every consumer renders from.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{ResourceConfig, DISPLAY_MODE_KEY, EMOTICON_FILENAMES};
use crate::engine::cleanup;
use crate::engine::downloader::{DownloadTask, Downloader};
use crate::engine::file_store::FileStore;
use crate::engine::loader::FrameLoader;
use crate::engine::preload::Preloader;
use crate::engine::url_cache;
use crate::engine::version::{needs_update, LocalUrlRecord, RemoteManifest, VersionChecker};
use crate::error::{FormatError, ResourceResult, StateError, StorageError};
use crate::format;
use crate::platform::Platform;
use crate::progress::ProgressSink;
use crate::source::AssetFetcher;

/// What the display loop should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Animated,
    StaticLogo,
    Emoticon,
}

impl DisplayMode {
    pub fn from_setting(value: i64) -> Self {
        match value {
            1 => DisplayMode::StaticLogo,
            2 => DisplayMode::Emoticon,
            _ => DisplayMode::Animated,
        }
    }

    pub fn as_setting(self) -> i64 {
        match self {
            DisplayMode::Animated => 0,
            DisplayMode::StaticLogo => 1,
            DisplayMode::Emoticon => 2,
        }
    }
}

/// The six emoticon sprites, in on-disk slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emoticon {
    Happy,
    Sad,
    Angry,
    Surprised,
    Calm,
    Shy,
}

impl Emoticon {
    pub const ALL: [Emoticon; 6] = [
        Emoticon::Happy,
        Emoticon::Sad,
        Emoticon::Angry,
        Emoticon::Surprised,
        Emoticon::Calm,
        Emoticon::Shy,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn filename(self) -> &'static str {
        EMOTICON_FILENAMES[self.slot()]
    }
}

/// Per-class result of an update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassOutcome {
    /// The local copy was already current.
    Current,
    Updated,
    Failed,
}

/// What one `check_and_update` call accomplished.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOutcome {
    pub frames: ClassOutcome,
    pub logo: ClassOutcome,
    pub emoticons: ClassOutcome,
    pub pack_rebuilt: bool,
    pub restart_requested: bool,
}

impl UpdateOutcome {
    fn current() -> Self {
        Self {
            frames: ClassOutcome::Current,
            logo: ClassOutcome::Current,
            emoticons: ClassOutcome::Current,
            pack_rebuilt: false,
            restart_requested: false,
        }
    }

    pub fn up_to_date(&self) -> bool {
        self.frames == ClassOutcome::Current
            && self.logo == ClassOutcome::Current
            && self.emoticons == ClassOutcome::Current
            && !self.pack_rebuilt
    }

    /// True when no requested class failed.
    pub fn fully_applied(&self) -> bool {
        self.frames != ClassOutcome::Failed
            && self.logo != ClassOutcome::Failed
            && self.emoticons != ClassOutcome::Failed
    }
}

#[derive(Default)]
struct ManagerState {
    initialized: bool,
    frames: Vec<Option<Bytes>>,
    logo: Option<Bytes>,
    cached_dynamic_urls: Vec<String>,
    cached_static_url: Option<String>,
    cached_emoticon_urls: Vec<String>,
    has_valid_frames: bool,
    has_valid_logo: bool,
    has_valid_emoticons: bool,
    /// Set when a check concluded everything is current; the next check
    /// short-circuits without network traffic. Cleared by `clear_all_resources`.
    fresh: bool,
}

pub struct ResourceManager {
    config: Arc<ResourceConfig>,
    store: FileStore,
    downloader: Downloader,
    checker: VersionChecker,
    loader: FrameLoader,
    preloader: Preloader,
    platform: Platform,
    state: RwLock<ManagerState>,
    download_progress: Mutex<ProgressSink>,
    preload_progress: Mutex<ProgressSink>,
}

impl ResourceManager {
    pub fn new(config: ResourceConfig, fetcher: Arc<dyn AssetFetcher>, platform: Platform) -> Self {
        let config = Arc::new(config);
        Self {
            store: FileStore::new(config.clone()),
            downloader: Downloader::new(
                config.clone(),
                fetcher.clone(),
                platform.connectivity.clone(),
                platform.memory.clone(),
            ),
            checker: VersionChecker::new(fetcher),
            loader: FrameLoader::new(config.clone()),
            preloader: Preloader::new(
                config.clone(),
                platform.activity.clone(),
                platform.memory.clone(),
            ),
            platform,
            config,
            state: RwLock::new(ManagerState::default()),
            download_progress: Mutex::new(ProgressSink::disabled()),
            preload_progress: Mutex::new(ProgressSink::disabled()),
        }
    }

    pub fn set_download_progress(&self, sink: ProgressSink) {
        *self.download_progress.lock() = sink;
    }

    pub fn set_preload_progress(&self, sink: ProgressSink) {
        *self.preload_progress.lock() = sink;
    }

    /// Mounts the store, reads the URL records, probes which resource
    /// classes are locally complete and opportunistically loads them.
    pub fn initialize(&self) -> ResourceResult<()> {
        info!("initializing resource manager");

        if !self.config.validate() {
            warn!("configuration has out-of-range values, continuing with them");
        }

        self.store.mount()?;
        self.store.ensure_dir(&self.config.image_dir())?;
        self.store.ensure_dir(&self.config.emoticon_dir())?;
        self.store.reclaim_space();

        let dynamic_urls = url_cache::read_url_list(&self.config.image_url_cache_path());
        let static_url = url_cache::read_single_url(&self.config.logo_url_cache_path());
        let emoticon_urls = url_cache::read_url_list(&self.config.emoticon_url_cache_path());
        info!(
            "local url records: {} animation, logo {}, {} emoticon",
            dynamic_urls.len(),
            if static_url.is_some() { "set" } else { "unset" },
            emoticon_urls.len()
        );

        let frames_ok = self.probe_frames();
        let logo_ok =
            self.config.logo_path().exists() || self.config.logo_legacy_path().exists();
        let emoticons_ok = self.probe_emoticons();
        if emoticons_ok {
            info!("emoticon files present");
        } else {
            warn!("emoticon files missing or incomplete");
        }

        {
            let mut state = self.state.write();
            state.cached_dynamic_urls = dynamic_urls;
            state.cached_static_url = static_url;
            state.cached_emoticon_urls = emoticon_urls;
            state.has_valid_frames = frames_ok;
            state.has_valid_logo = logo_ok;
            state.has_valid_emoticons = emoticons_ok;
            state.frames = vec![None; self.config.image.frame_count as usize];
            state.initialized = true;
        }

        if frames_ok || logo_ok {
            self.load_image_data();
        }

        let mode =
            DisplayMode::from_setting(self.platform.settings.get_int(DISPLAY_MODE_KEY, 0));
        info!("display mode {:?}", mode);
        Ok(())
    }

    /// Compares local state against the server manifest and brings every
    /// stale class up to date. A manifest fetch failure degrades to
    /// local-validity checking only. When frames or logo changed and all
    /// requested classes applied, rebuilds the packed file and requests a
    /// restart.
    pub async fn check_and_update(&self, manifest_url: &str) -> ResourceResult<UpdateOutcome> {
        self.ensure_initialized()?;

        if self.state.read().fresh {
            info!("resources already verified, skipping server check");
            return Ok(UpdateOutcome::current());
        }

        info!("checking resources against server");

        let (mut need_frames, mut need_logo, mut need_emoticons, local) = {
            let state = self.state.read();
            (
                !state.has_valid_frames,
                !state.has_valid_logo,
                !state.has_valid_emoticons,
                LocalUrlRecord {
                    dynamic_urls: state.cached_dynamic_urls.clone(),
                    static_url: state.cached_static_url.clone(),
                    emoticon_urls: state.cached_emoticon_urls.clone(),
                },
            )
        };

        let mut server: Option<RemoteManifest> = None;
        match self.checker.check_server(manifest_url).await {
            Ok(manifest) => {
                let staleness = needs_update(&manifest, &local);
                need_frames |= staleness.dynamic_changed;
                need_logo |= staleness.static_changed;
                need_emoticons |= staleness.emoticons_changed;
                server = Some(manifest);
            }
            Err(err) => {
                warn!("manifest check failed, falling back to local validity: {err}");
            }
        }

        if !need_frames && !need_logo && !need_emoticons {
            info!("all resources are current");
            if !self.packed_file_ok() {
                info!("packed file missing or wrong size, rebuilding");
                let rebuilt = self.build_and_restart().await;
                let mut outcome = UpdateOutcome::current();
                outcome.pack_rebuilt = rebuilt;
                outcome.restart_requested = rebuilt;
                self.state.write().fresh = rebuilt;
                return Ok(outcome);
            }
            self.state.write().fresh = true;
            return Ok(UpdateOutcome::current());
        }

        let mut outcome = UpdateOutcome::current();
        if need_frames {
            outcome.frames = if self.download_frames(server.as_ref()).await {
                ClassOutcome::Updated
            } else {
                ClassOutcome::Failed
            };
        }
        if need_logo {
            outcome.logo = if self.download_logo(server.as_ref()).await {
                ClassOutcome::Updated
            } else {
                ClassOutcome::Failed
            };
        }
        if need_emoticons {
            outcome.emoticons = if self.download_emoticons(server.as_ref()).await {
                ClassOutcome::Updated
            } else {
                ClassOutcome::Failed
            };
        }

        if outcome.fully_applied() {
            if need_frames || need_logo {
                info!("all downloads finished, building packed file");
                let rebuilt = self.build_and_restart().await;
                outcome.pack_rebuilt = rebuilt;
                outcome.restart_requested = rebuilt;
                self.state.write().fresh = rebuilt;
            } else {
                self.state.write().fresh = true;
            }
        }

        Ok(outcome)
    }

    /// Loads one frame into its slot if it is not resident yet. Returns
    /// whether the frame is loaded afterwards; an out-of-range index is
    /// reported as false, matching the query semantics.
    pub fn load_image_on_demand(&self, index: u32) -> ResourceResult<bool> {
        self.ensure_initialized()?;
        if index == 0 || index > self.config.image.frame_count {
            return Ok(false);
        }
        if self.is_image_loaded(index) {
            return Ok(true);
        }
        Ok(self.load_frame_into_slot(index))
    }

    pub fn is_image_loaded(&self, index: u32) -> bool {
        if index == 0 {
            return false;
        }
        let state = self.state.read();
        state
            .frames
            .get(index as usize - 1)
            .is_some_and(|slot| slot.is_some())
    }

    /// Resident frame data, 1-based. Cheap to clone.
    pub fn frame(&self, index: u32) -> Option<Bytes> {
        if index == 0 {
            return None;
        }
        let state = self.state.read();
        state.frames.get(index as usize - 1).cloned().flatten()
    }

    pub fn logo(&self) -> Option<Bytes> {
        self.state.read().logo.clone()
    }

    /// Reads one emoticon sprite from disk. Sprites are raw frames; any
    /// other size means the file is damaged.
    pub fn load_emoticon(&self, emoticon: Emoticon) -> ResourceResult<Bytes> {
        self.ensure_initialized()?;
        let path = self.config.emoticon_path(emoticon.slot());
        let expected = self.config.frame_size() as u64;

        let meta = std::fs::metadata(&path).map_err(StorageError::from)?;
        if meta.len() != expected {
            warn!(
                "emoticon {} has wrong size: {} bytes",
                emoticon.filename(),
                meta.len()
            );
            return Err(FormatError::WrongFrameSize {
                path,
                actual: meta.len(),
                expected,
            }
            .into());
        }

        let data = std::fs::read(&path).map_err(StorageError::from)?;
        debug!("loaded emoticon {}", emoticon.filename());
        Ok(Bytes::from(data))
    }

    /// Spawns a visible preload session over the frame array.
    pub fn start_preload(self: &Arc<Self>) -> ResourceResult<()> {
        self.ensure_initialized()?;
        if self.preloader.is_running() {
            return Err(StateError::PreloadAlreadyRunning.into());
        }

        let mgr = Arc::clone(self);
        tokio::spawn(async move {
            let total = mgr.config.image.frame_count;
            let progress = mgr.preload_progress.lock().clone();
            let result = mgr
                .preloader
                .preload_remaining(
                    total,
                    |i| mgr.load_frame_into_slot(i),
                    |i| mgr.is_image_loaded(i),
                    &progress,
                )
                .await;
            match result {
                Ok(report) => info!(
                    "preload ended: {:?}, {}/{} loaded",
                    report.outcome, report.loaded, report.total
                ),
                Err(err) => warn!("preload did not run: {err}"),
            }
        });
        Ok(())
    }

    /// Spawns a silent preload session bounded by `time_budget_ms`
    /// (zero means unlimited).
    pub fn start_silent_preload(self: &Arc<Self>, time_budget_ms: u64) -> ResourceResult<()> {
        self.ensure_initialized()?;
        if self.preloader.is_running() {
            return Err(StateError::PreloadAlreadyRunning.into());
        }

        let mgr = Arc::clone(self);
        tokio::spawn(async move {
            let total = mgr.config.image.frame_count;
            let result = mgr
                .preloader
                .preload_silent(
                    total,
                    |i| mgr.load_frame_into_slot(i),
                    |i| mgr.is_image_loaded(i),
                    time_budget_ms,
                )
                .await;
            match result {
                Ok(report) => debug!(
                    "silent preload ended: {:?}, {}/{} loaded",
                    report.outcome, report.loaded, report.total
                ),
                Err(err) => debug!("silent preload did not run: {err}"),
            }
        });
        Ok(())
    }

    pub fn cancel_preload(&self) {
        self.preloader.cancel();
    }

    pub fn is_preloading(&self) -> bool {
        self.preloader.is_running()
    }

    pub async fn wait_for_preload(&self, timeout_ms: u64) -> bool {
        self.preloader.wait_for_finish(timeout_ms).await
    }

    /// Deletes every frame file, the packed blob and the animation and
    /// logo URL records, and drops all resident image data. Emoticons are
    /// left alone.
    pub async fn clear_all_resources(&self) -> ResourceResult<()> {
        self.ensure_initialized()?;
        info!("clearing all image resources");

        self.preloader.cancel();
        self.preloader.wait_for_finish(0).await;

        cleanup::clear_all_frames(&self.config);
        for path in [
            self.config.image_url_cache_path(),
            self.config.logo_url_cache_path(),
            self.config.packed_path(),
        ] {
            let _ = std::fs::remove_file(path);
        }

        let mut state = self.state.write();
        state.has_valid_frames = false;
        state.has_valid_logo = false;
        state.cached_dynamic_urls.clear();
        state.cached_static_url = None;
        state.frames = vec![None; self.config.image.frame_count as usize];
        state.logo = None;
        state.fresh = false;
        Ok(())
    }

    /// Drops the freshness latch so the next `check_and_update` consults
    /// the server again. For hosts that learn out-of-band that the
    /// manifest moved (e.g. a push notification).
    pub fn invalidate_check(&self) {
        self.state.write().fresh = false;
    }

    pub fn display_mode(&self) -> ResourceResult<DisplayMode> {
        self.ensure_initialized()?;
        let value = self.platform.settings.get_int(DISPLAY_MODE_KEY, 0);
        Ok(DisplayMode::from_setting(value))
    }

    pub fn set_display_mode(&self, mode: DisplayMode) -> ResourceResult<()> {
        self.ensure_initialized()?;
        self.platform.settings.set_int(DISPLAY_MODE_KEY, mode.as_setting());
        info!("display mode set to {:?}", mode);
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), StateError> {
        if self.state.read().initialized {
            Ok(())
        } else {
            Err(StateError::NotInitialized)
        }
    }

    /// Counts frames present from index 1 upward; a gap invalidates the
    /// rest. With `legacy_conversion` on, a `.h` frame with no `.bin`
    /// sibling is migrated on the spot so old installs survive the format
    /// change.
    fn probe_frames(&self) -> bool {
        let total = self.config.image.frame_count;
        let mut count = 0u32;

        for i in 1..=total {
            let bin = self.config.frame_path(i);
            if bin.exists() {
                count += 1;
                continue;
            }

            let legacy = self.config.frame_legacy_path(i);
            if self.config.image.legacy_conversion && legacy.exists() {
                match format::convert_hex_to_container(
                    &legacy,
                    &bin,
                    self.config.image.width,
                    self.config.image.height,
                ) {
                    Ok(_) => {
                        info!("migrated legacy frame {}", i);
                        count += 1;
                        continue;
                    }
                    Err(err) => {
                        warn!("failed to migrate {}: {err}", legacy.display());
                        break;
                    }
                }
            }
            break;
        }

        info!("local animation frames: {}/{}", count, total);
        count >= total
    }

    fn probe_emoticons(&self) -> bool {
        let expected = self.config.frame_size() as u64;
        for slot in 0..EMOTICON_FILENAMES.len() {
            let path = self.config.emoticon_path(slot);
            match std::fs::metadata(&path) {
                Ok(meta) if meta.len() == expected => {}
                _ => return false,
            }
        }
        true
    }

    /// Fills the in-memory array from disk: logo first, then the packed
    /// blob if it loads, otherwise just the first two frames eagerly with
    /// the rest left to on-demand loading and the preloader.
    fn load_image_data(&self) {
        let free = self.platform.memory.free_bytes();
        info!("free memory before image load: {} bytes", free);
        if free < self.config.memory.allocation_threshold {
            warn!("not enough memory, skipping image load");
            return;
        }

        let frame_count = self.config.image.frame_count;
        let mut state = self.state.write();
        state.frames = vec![None; frame_count as usize];
        state.logo = None;

        if state.has_valid_logo {
            match self.loader.load_logo() {
                Ok(data) => {
                    info!("logo loaded: {} bytes", data.len());
                    state.logo = Some(data);
                }
                Err(err) => warn!("logo load failed: {err}"),
            }
        }

        if state.has_valid_frames {
            if self.config.image.packed_loading {
                match format::packed::load_packed(
                    &self.config.packed_path(),
                    self.config.frame_size(),
                    frame_count,
                ) {
                    Ok(frames) => {
                        info!("all animation frames loaded from packed file");
                        state.frames = frames.into_iter().map(Some).collect();
                        return;
                    }
                    Err(err) => debug!("packed file unavailable: {err}"),
                }
            }

            let mut present = 0u32;
            for i in 1..=frame_count {
                if self.config.frame_path(i).exists() {
                    present += 1;
                } else {
                    break;
                }
            }
            if present < frame_count {
                warn!("local frame files incomplete, marking invalid");
                state.has_valid_frames = false;
                return;
            }

            // Quick start: the first two frames now, the rest later.
            info!("eagerly loading the first two frames");
            for i in 1..=2u32.min(frame_count) {
                match self.loader.load_image(&self.config.frame_path(i)) {
                    Ok(data) => state.frames[i as usize - 1] = Some(data),
                    Err(err) => warn!("frame {} load failed: {err}", i),
                }
            }
        }
    }

    fn load_frame_into_slot(&self, index: u32) -> bool {
        if index == 0 || index > self.config.image.frame_count {
            return false;
        }
        match self.loader.load_image(&self.config.frame_path(index)) {
            Ok(data) => {
                self.state.write().frames[index as usize - 1] = Some(data);
                true
            }
            Err(err) => {
                warn!("loading frame {} failed: {err}", index);
                false
            }
        }
    }

    fn packed_file_ok(&self) -> bool {
        std::fs::metadata(self.config.packed_path())
            .map(|meta| meta.len() == self.config.packed_size())
            .unwrap_or(false)
    }

    async fn download_frames(&self, server: Option<&RemoteManifest>) -> bool {
        let Some(manifest) = server else {
            error!("no server manifest, cannot download animation frames");
            return false;
        };
        if manifest.dynamic_urls.is_empty() {
            error!("no animation urls to download");
            return false;
        }

        info!("downloading animation frames");

        // Frame files are about to change underneath the preloader.
        self.preloader.cancel();
        self.preloader.wait_for_finish(0).await;

        let progress = self.download_progress.lock().clone();
        cleanup::delete_frame_files(&self.config, &progress).await;
        progress.emit(0, 100, Some("Downloading animation frames..."));

        let tasks: Vec<DownloadTask> = manifest
            .dynamic_urls
            .iter()
            .take(self.config.image.frame_count as usize)
            .enumerate()
            .map(|(i, url)| DownloadTask {
                url: url.clone(),
                destination: self.config.frame_path(i as u32 + 1),
            })
            .collect();

        let report = self
            .downloader
            .download_batch(&tasks, &progress, "animation frames")
            .await;
        if !report.success() {
            error!(
                "animation download failed: {}/{} files failed, aborted {}",
                report.failed, report.total, report.aborted
            );
            return false;
        }

        if let Err(err) =
            url_cache::write_url_list(&self.config.image_url_cache_path(), &manifest.dynamic_urls)
        {
            warn!("saving animation url record failed: {err}");
        }
        {
            let mut state = self.state.write();
            state.cached_dynamic_urls = manifest.dynamic_urls.clone();
            state.has_valid_frames = true;
        }
        self.load_image_data();

        progress.emit(100, 100, Some("Download complete"));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        true
    }

    async fn download_logo(&self, server: Option<&RemoteManifest>) -> bool {
        let Some(manifest) = server else {
            error!("no server manifest, cannot download logo");
            return false;
        };
        if manifest.static_url.is_empty() {
            error!("no logo url to download");
            return false;
        }

        info!("downloading logo");

        let progress = self.download_progress.lock().clone();
        cleanup::delete_logo_files(&self.config, &progress).await;
        progress.emit(0, 100, Some("Downloading logo..."));

        if let Err(err) = self
            .downloader
            .download_file(
                &manifest.static_url,
                &self.config.logo_path(),
                0,
                1,
                &progress,
                "logo",
            )
            .await
        {
            error!("logo download failed: {err}");
            return false;
        }

        if let Err(err) =
            url_cache::write_single_url(&self.config.logo_url_cache_path(), &manifest.static_url)
        {
            warn!("saving logo url record failed: {err}");
        }
        {
            let mut state = self.state.write();
            state.cached_static_url = Some(manifest.static_url.clone());
            state.has_valid_logo = true;
        }
        match self.loader.load_logo() {
            Ok(data) => self.state.write().logo = Some(data),
            Err(err) => warn!("logo reload failed: {err}"),
        }

        progress.emit(100, 100, Some("Download complete"));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        true
    }

    async fn download_emoticons(&self, server: Option<&RemoteManifest>) -> bool {
        let Some(manifest) = server else {
            error!("no server manifest, cannot download emoticons");
            return false;
        };
        if manifest.emoticon_urls.len() != EMOTICON_FILENAMES.len() {
            error!(
                "unexpected emoticon url count: {} (expected {})",
                manifest.emoticon_urls.len(),
                EMOTICON_FILENAMES.len()
            );
            return false;
        }

        info!("downloading emoticons");

        let progress = self.download_progress.lock().clone();
        progress.emit(0, 100, Some("Downloading emoticons..."));
        cleanup::delete_emoticon_files(&self.config, &progress).await;
        progress.emit(0, 100, Some("Downloading emoticons..."));

        if let Err(err) = self.store.ensure_dir(&self.config.emoticon_dir()) {
            warn!("emoticon directory unavailable: {err}");
        }

        let tasks: Vec<DownloadTask> = manifest
            .emoticon_urls
            .iter()
            .enumerate()
            .map(|(slot, url)| DownloadTask {
                url: url.clone(),
                destination: self.config.emoticon_path(slot),
            })
            .collect();

        let report = self
            .downloader
            .download_batch(&tasks, &progress, "emoticons")
            .await;
        if !report.success() {
            error!(
                "emoticon download failed: {}/{} files failed, aborted {}",
                report.failed, report.total, report.aborted
            );
            return false;
        }

        if let Err(err) = url_cache::write_url_list(
            &self.config.emoticon_url_cache_path(),
            &manifest.emoticon_urls,
        ) {
            warn!("saving emoticon url record failed: {err}");
        }
        {
            let mut state = self.state.write();
            state.cached_emoticon_urls = manifest.emoticon_urls.clone();
            state.has_valid_emoticons = true;
        }

        progress.emit(100, 100, Some("Download complete"));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        true
    }

    /// Streams every frame into the packed blob and, on success, asks the
    /// host to restart so the next boot fast-loads from it.
    async fn build_and_restart(&self) -> bool {
        let sources: Vec<PathBuf> = (1..=self.config.image.frame_count)
            .map(|i| self.config.frame_path(i))
            .collect();

        let progress = self.download_progress.lock().clone();
        match format::packed::build_packed(
            &sources,
            &self.config.packed_path(),
            self.config.frame_size(),
            &progress,
        )
        .await
        {
            Ok(()) => {
                info!("packed file built, requesting restart");
                tokio::time::sleep(Duration::from_millis(3000)).await;
                self.platform.system.request_restart();
                true
            }
            Err(err) => {
                error!("packed build failed: {err}");
                false
            }
        }
    }
}
