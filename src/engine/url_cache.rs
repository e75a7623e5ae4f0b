// Persisted URL records: one tiny JSON file per resource class, holding the
// URLs that were last downloaded and applied. Staleness detection compares
// these against the live manifest.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ResourceResult;

#[derive(Serialize, Deserialize)]
struct UrlListRecord {
    #[serde(rename = "dyn")]
    urls: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct SingleUrlRecord {
    sta: String,
}

/// Reads a `{"dyn": [..]}` record. A missing or unreadable file is an
/// empty list; that reads as "never applied" to the staleness logic.
pub fn read_url_list(path: &Path) -> Vec<String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            debug!("no url record at {}", path.display());
            return Vec::new();
        }
    };
    match serde_json::from_str::<UrlListRecord>(&text) {
        Ok(record) => record.urls,
        Err(err) => {
            warn!("corrupt url record {}: {err}", path.display());
            Vec::new()
        }
    }
}

pub fn write_url_list(path: &Path, urls: &[String]) -> ResourceResult<()> {
    let record = UrlListRecord {
        urls: urls.to_vec(),
    };
    let text = serde_json::to_string(&record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, text)?;
    debug!("saved {} urls to {}", urls.len(), path.display());
    Ok(())
}

/// Reads a `{"sta": ".."}` record; `None` when absent or unreadable.
pub fn read_single_url(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<SingleUrlRecord>(&text) {
        Ok(record) if !record.sta.is_empty() => Some(record.sta),
        Ok(_) => None,
        Err(err) => {
            warn!("corrupt url record {}: {err}", path.display());
            None
        }
    }
}

pub fn write_single_url(path: &Path, url: &str) -> ResourceResult<()> {
    let record = SingleUrlRecord {
        sta: url.to_string(),
    };
    let text = serde_json::to_string(&record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, text)?;
    Ok(())
}
