// Bounded image-resource cache engine. Keeps a fixed set of binary image
// assets (animation frames, a logo, emoticon sprites) synchronized with a
// remote manifest, stored locally and preloaded into memory for
// near-zero-latency access.

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod platform;
pub mod progress;
pub mod source;

pub use config::ResourceConfig;
pub use engine::{ClassOutcome, DisplayMode, Emoticon, ResourceManager, UpdateOutcome};
pub use error::{
    FormatError, MemoryError, NetworkError, ResourceError, ResourceResult, StateError,
    StorageError,
};
pub use platform::Platform;
pub use progress::{ProgressEvent, ProgressSink};
pub use source::{AssetFetcher, HttpFetcher};

use std::sync::Once;

use tracing::info;
use tracing_subscriber::EnvFilter;

static INIT_TRACING: Once = Once::new();

/// Installs the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        info!("resource engine tracing initialized");
    });
}
