// Streaming file downloader: bounded retries, adaptive buffering, guard
// re-checks while the body streams in.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::ResourceConfig;
use crate::error::{MemoryError, NetworkError, ResourceError, ResourceResult};
use crate::platform::{Connectivity, MemoryMonitor};
use crate::progress::{blended_percent, PercentGate, ProgressSink};
use crate::source::AssetFetcher;

/// One file to fetch and where to put it.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
}

/// What a batch run did. `aborted` means the consecutive-failure limit
/// tripped and the tail of the batch was never attempted.
#[derive(Debug)]
pub struct BatchReport {
    pub total: usize,
    pub failed: usize,
    pub aborted: bool,
}

impl BatchReport {
    /// The batch counts as a success while fewer than half the files
    /// failed and the abort limit never tripped.
    pub fn success(&self) -> bool {
        !self.aborted && (self.failed == 0 || self.failed < self.total / 2)
    }
}

pub struct Downloader {
    config: Arc<ResourceConfig>,
    fetcher: Arc<dyn AssetFetcher>,
    connectivity: Arc<dyn Connectivity>,
    memory: Arc<dyn MemoryMonitor>,
}

impl Downloader {
    pub fn new(
        config: Arc<ResourceConfig>,
        fetcher: Arc<dyn AssetFetcher>,
        connectivity: Arc<dyn Connectivity>,
        memory: Arc<dyn MemoryMonitor>,
    ) -> Self {
        Self {
            config,
            fetcher,
            connectivity,
            memory,
        }
    }

    /// Downloads one file with bounded retries. A partial file never
    /// survives a failed attempt. `file_index`/`total_files` position the
    /// file inside a batch for blended progress; pass `0`/`1` for a
    /// standalone file.
    pub async fn download_file(
        &self,
        url: &str,
        destination: &Path,
        file_index: usize,
        total_files: usize,
        progress: &ProgressSink,
        label: &str,
    ) -> ResourceResult<()> {
        let net = &self.config.network;
        let mem = &self.config.memory;
        let filename = display_name(destination);

        let free = self.memory.free_bytes();
        if free < mem.download_floor {
            error!("not enough memory to download: {} bytes free", free);
            progress.emit(0, 100, Some("Not enough memory, download failed"));
            return Err(MemoryError::BelowFloor {
                free,
                required: mem.download_floor,
            }
            .into());
        }

        let mut attempt = 0u32;
        let mut last_err: ResourceError = NetworkError::Unreachable.into();

        while attempt < net.retry_count {
            if !self.connectivity.is_connected() {
                warn!("network down before downloading {}", filename);
                progress.emit(0, 100, Some("Network disconnected, waiting..."));
                tokio::time::sleep(Duration::from_millis(net.stabilize_ms)).await;
                attempt += 1;
                last_err = NetworkError::Unreachable.into();
                continue;
            }

            if attempt > 0 {
                progress.emit(
                    0,
                    100,
                    Some(&format!(
                        "Retrying {} ({}/{})",
                        filename,
                        attempt + 1,
                        net.retry_count
                    )),
                );
            }

            match self
                .stream_attempt(url, destination, file_index, total_files, progress, label)
                .await
            {
                Ok(()) => {
                    let boundary = if total_files > 1 {
                        ((file_index + 1) * 100 / total_files) as i32
                    } else {
                        100
                    };
                    progress.emit(boundary, 100, Some(label));
                    info!("downloaded {} ({}/{})", filename, file_index + 1, total_files);
                    return Ok(());
                }
                Err(err) => {
                    let _ = std::fs::remove_file(destination);
                    if is_terminal(&err) {
                        error!("download of {} failed terminally: {}", filename, err);
                        progress.emit(0, 100, Some(&format!("Download {filename} failed")));
                        return Err(err);
                    }
                    attempt += 1;
                    warn!("download of {} failed (attempt {}): {}", filename, attempt, err);
                    last_err = err;
                    if attempt < net.retry_count {
                        progress.emit(
                            0,
                            100,
                            Some(&format!(
                                "Download {} failed, retrying ({}/{})",
                                filename, attempt, net.retry_count
                            )),
                        );
                        tokio::time::sleep(Duration::from_millis(
                            net.retry_delay_ms * u64::from(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        error!("download of {} failed, retry limit reached", filename);
        progress.emit(0, 100, Some(&format!("Download {filename} failed")));
        Err(last_err)
    }

    async fn stream_attempt(
        &self,
        url: &str,
        destination: &Path,
        file_index: usize,
        total_files: usize,
        progress: &ProgressSink,
        label: &str,
    ) -> ResourceResult<()> {
        let net = &self.config.network;
        let mem = &self.config.memory;

        let mut resp = self.fetcher.get(url).await?;
        let content_length = resp.content_length.unwrap_or(0);
        if content_length == 0 {
            error!("server reported no length for {}", url);
            return Err(NetworkError::UnknownLength.into());
        }
        debug!("downloading {} bytes from {}", content_length, url);

        // Shrink the write buffer under memory pressure.
        let free = self.memory.free_bytes();
        let capacity = if free < mem.allocation_threshold {
            net.buffer_size / 4
        } else if free < mem.download_threshold {
            net.buffer_size / 2
        } else {
            net.buffer_size
        }
        .max(1);

        let mut file = File::create(destination)?;
        let mut write_buf: Vec<u8> = Vec::with_capacity(capacity);
        let mut total_read: u64 = 0;
        let mut since_check: u64 = 0;
        let mut gate = PercentGate::new();
        let pace = Duration::from_millis(net.stabilize_ms / 100);

        loop {
            if since_check >= mem.download_threshold {
                since_check = 0;
                let free = self.memory.free_bytes();
                if free < mem.allocation_threshold {
                    warn!("memory low mid-download, aborting");
                    return Err(MemoryError::BelowFloor {
                        free,
                        required: mem.allocation_threshold,
                    }
                    .into());
                }
                if !self.connectivity.is_connected() {
                    error!("network lost mid-download");
                    return Err(NetworkError::Unreachable.into());
                }
            }

            let Some(chunk) = resp.body.next_chunk().await? else {
                if total_read < content_length {
                    warn!("download incomplete: {}/{} bytes", total_read, content_length);
                    return Err(NetworkError::Truncated {
                        received: total_read,
                        expected: content_length,
                    }
                    .into());
                }
                break;
            };

            write_buf.extend_from_slice(&chunk);
            if write_buf.len() >= capacity {
                file.write_all(&write_buf)?;
                write_buf.clear();
            }

            total_read += chunk.len() as u64;
            since_check += chunk.len() as u64;

            let file_percent = (total_read * 100 / content_length) as i32;
            let total_percent = if total_files > 1 {
                blended_percent(file_index, file_percent, total_files)
            } else {
                file_percent
            };
            if gate.accept(total_percent, false) {
                progress.emit(total_percent, 100, Some(label));
                if file_percent % 25 == 0 || file_percent == 100 {
                    debug!(
                        "progress: file {}/{} {}%, overall {}%",
                        file_index + 1,
                        total_files,
                        file_percent,
                        total_percent
                    );
                }
            }

            if !pace.is_zero() {
                tokio::time::sleep(pace).await;
            }
        }

        if !write_buf.is_empty() {
            file.write_all(&write_buf)?;
        }
        file.flush()?;
        Ok(())
    }

    /// Downloads files strictly in order, pausing between them. More than
    /// three consecutive failures abandon the rest of the batch.
    pub async fn download_batch(
        &self,
        tasks: &[DownloadTask],
        progress: &ProgressSink,
        label: &str,
    ) -> BatchReport {
        let mut failed = 0usize;
        let mut consecutive = 0usize;

        for (i, task) in tasks.iter().enumerate() {
            let result = self
                .download_file(
                    &task.url,
                    &task.destination,
                    i,
                    tasks.len(),
                    progress,
                    label,
                )
                .await;

            match result {
                Ok(()) => consecutive = 0,
                Err(err) => {
                    failed += 1;
                    consecutive += 1;
                    warn!(
                        "batch item {}/{} failed: {}",
                        i + 1,
                        tasks.len(),
                        err
                    );
                    if consecutive > 3 {
                        error!("too many consecutive failures, stopping batch");
                        return BatchReport {
                            total: tasks.len(),
                            failed,
                            aborted: true,
                        };
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.network.connection_delay_ms))
                .await;
        }

        BatchReport {
            total: tasks.len(),
            failed,
            aborted: false,
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_terminal(err: &ResourceError) -> bool {
    match err {
        ResourceError::Network(net) => !net.is_transient(),
        // Mid-file storage and memory trouble gets the partial file deleted
        // and another attempt; only hopeless network answers end early.
        ResourceError::Storage(_) | ResourceError::Memory(_) => false,
        _ => true,
    }
}
