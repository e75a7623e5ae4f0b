// Manifest fetch and staleness detection. The server document is the source
// of truth; comparison against the local URL records is purely positional,
// no timestamps or hashes involved.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::DEFAULT_EMOTICON_URLS;
use crate::error::{FormatError, ResourceResult};
use crate::source::AssetFetcher;

/// Parsed server manifest. Immutable once built; `emoticon_urls` always
/// holds six entries, falling back to the stock set when the manifest has
/// no usable emoji section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteManifest {
    pub dynamic_urls: Vec<String>,
    pub static_url: String,
    pub emoticon_urls: Vec<String>,
}

/// Local counterpart of the manifest, reassembled from the URL records.
#[derive(Debug, Clone, Default)]
pub struct LocalUrlRecord {
    pub dynamic_urls: Vec<String>,
    pub static_url: Option<String>,
    pub emoticon_urls: Vec<String>,
}

/// Which resource classes the server says moved.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalenessReport {
    pub dynamic_changed: bool,
    pub static_changed: bool,
    pub emoticons_changed: bool,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default, rename = "dyn")]
    dynamic: Vec<String>,
    #[serde(default)]
    sta: String,
    #[serde(default)]
    emoji: Option<RawEmoji>,
}

#[derive(Deserialize)]
struct RawEmoji {
    #[serde(default)]
    happy: String,
    #[serde(default)]
    sad: String,
    #[serde(default)]
    angry: String,
    #[serde(default)]
    surprised: String,
    #[serde(default)]
    calm: String,
    #[serde(default)]
    shy: String,
}

impl RawEmoji {
    /// Slot order is fixed by the sprite layout on disk.
    fn to_slots(&self) -> Option<Vec<String>> {
        let slots = [
            &self.happy,
            &self.sad,
            &self.angry,
            &self.surprised,
            &self.calm,
            &self.shy,
        ];
        if slots.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(slots.into_iter().cloned().collect())
    }
}

impl RemoteManifest {
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let raw: RawManifest = serde_json::from_str(text)
            .map_err(|e| FormatError::MalformedManifest(e.to_string()))?;

        let emoticon_urls = match raw.emoji.as_ref().and_then(RawEmoji::to_slots) {
            Some(slots) => slots,
            None => {
                warn!("manifest has no usable emoji section, using default urls");
                DEFAULT_EMOTICON_URLS.iter().map(|s| s.to_string()).collect()
            }
        };

        Ok(Self {
            dynamic_urls: raw.dynamic,
            static_url: raw.sta,
            emoticon_urls,
        })
    }
}

pub struct VersionChecker {
    fetcher: Arc<dyn AssetFetcher>,
}

impl VersionChecker {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { fetcher }
    }

    /// One GET against the manifest endpoint.
    pub async fn check_server(&self, manifest_url: &str) -> ResourceResult<RemoteManifest> {
        let body = self.fetcher.get_text(manifest_url).await?;
        let manifest = RemoteManifest::parse(&body)?;
        info!(
            "manifest: {} frame urls, logo {}",
            manifest.dynamic_urls.len(),
            if manifest.static_url.is_empty() { "absent" } else { "present" }
        );
        Ok(manifest)
    }
}

/// Positional URL comparison per resource class. An empty server-side class
/// is server silence, never a change signal.
pub fn needs_update(server: &RemoteManifest, local: &LocalUrlRecord) -> StalenessReport {
    let mut report = StalenessReport::default();

    if server.dynamic_urls.is_empty() {
        warn!("server returned no frame urls");
    } else if local.dynamic_urls.len() != server.dynamic_urls.len() {
        info!(
            "frame url count moved: local {}, server {}",
            local.dynamic_urls.len(),
            server.dynamic_urls.len()
        );
        report.dynamic_changed = true;
    } else if local
        .dynamic_urls
        .iter()
        .zip(&server.dynamic_urls)
        .any(|(a, b)| a != b)
    {
        info!("frame urls changed");
        report.dynamic_changed = true;
    }

    if server.static_url.is_empty() {
        warn!("server returned no logo url");
    } else if local.static_url.as_deref() != Some(server.static_url.as_str()) {
        info!("logo url changed");
        report.static_changed = true;
    }

    if local.emoticon_urls != server.emoticon_urls {
        info!("emoticon urls changed");
        report.emoticons_changed = true;
    }

    report
}
