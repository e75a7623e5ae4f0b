// Engine orchestration: staleness checks, downloads, the packed rebuild
// and the preload loop.

pub mod cleanup;
pub mod downloader;
pub mod file_store;
pub mod loader;
pub mod manager;
pub mod preload;
pub mod url_cache;
pub mod version;

pub use downloader::{BatchReport, DownloadTask, Downloader};
pub use file_store::FileStore;
pub use loader::FrameLoader;
pub use manager::{ClassOutcome, DisplayMode, Emoticon, ResourceManager, UpdateOutcome};
pub use preload::{PreloadOutcome, PreloadReport, Preloader};
pub use version::{LocalUrlRecord, RemoteManifest, StalenessReport, VersionChecker};
