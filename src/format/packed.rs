use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::error::{FormatError, MemoryError, ResourceError, ResourceResult, StorageError};
use crate::progress::ProgressSink;

const PACK_CHUNK: usize = 4 * 1024;
const WRITE_RETRIES: u32 = 3;

/// Concatenates validated frame files into one packed blob.
///
/// Every source must be exactly `frame_size` bytes before anything is
/// written. Any failure past that point deletes the partial output so a
/// truncated pack can never be mistaken for a valid one.
pub async fn build_packed(
    sources: &[PathBuf],
    output: &Path,
    frame_size: usize,
    progress: &ProgressSink,
) -> ResourceResult<()> {
    info!("building packed file {}", output.display());

    for source in sources {
        let meta = std::fs::metadata(source)?;
        if meta.len() != frame_size as u64 {
            return Err(FormatError::WrongFrameSize {
                path: source.clone(),
                actual: meta.len(),
                expected: frame_size as u64,
            }
            .into());
        }
    }

    let _ = std::fs::remove_file(output);
    progress.emit(0, 100, Some("Verifying resources..."));

    let total_bytes = frame_size * sources.len();
    let mut processed = 0usize;
    let mut last_percent = -1i32;
    let mut buf = vec![0u8; PACK_CHUNK];
    let mut out = File::create(output)?;

    for (i, source) in sources.iter().enumerate() {
        let mut input = match File::open(source) {
            Ok(f) => f,
            Err(e) => {
                error!("cannot open source frame {}: {e}", source.display());
                return abort(output, e.into());
            }
        };

        let mut remaining = frame_size;
        while remaining > 0 {
            let want = remaining.min(PACK_CHUNK);
            let got = match input.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) => return abort(output, e.into()),
            };
            if got == 0 {
                error!("source frame {} shorter than expected", i + 1);
                return abort(
                    output,
                    StorageError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "source frame truncated",
                    ))
                    .into(),
                );
            }

            if let Err(e) = write_with_retry(&mut out, &buf[..got], i).await {
                return abort(output, e);
            }

            remaining -= got;
            processed += got;

            let percent = ((processed * 100 / total_bytes) as i32).min(100);
            if percent != last_percent {
                progress.emit(percent, 100, Some("Verifying resources..."));
                last_percent = percent;
            }
        }
    }

    out.flush()?;
    drop(out);
    info!("packed file built: {} frames", sources.len());

    progress.emit(100, 100, Some("Resources verified"));
    tokio::time::sleep(Duration::from_millis(500)).await;
    progress.finish();
    Ok(())
}

async fn write_with_retry(out: &mut File, data: &[u8], frame_index: usize) -> ResourceResult<()> {
    let mut last_err: Option<io::Error> = None;
    for attempt in 0..WRITE_RETRIES {
        match out.write_all(data) {
            Ok(()) => return Ok(()),
            Err(e) => {
                if e.kind() == io::ErrorKind::StorageFull {
                    error!("out of space while packing frame {}", frame_index + 1);
                    return Err(StorageError::OutOfSpace.into());
                }
                warn!("frame {} write retry {}", frame_index + 1, attempt + 1);
                last_err = Some(e);
                let _ = out.flush();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
    error!("frame {} write failed", frame_index + 1);
    Err(match last_err {
        Some(e) => StorageError::from(e).into(),
        None => StorageError::Io(io::Error::other("write failed")).into(),
    })
}

fn abort(output: &Path, err: ResourceError) -> ResourceResult<()> {
    let _ = std::fs::remove_file(output);
    Err(err)
}

/// Loads every frame from a packed blob in one pass. A short read releases
/// everything read so far and fails; callers never observe a half-loaded
/// set.
pub fn load_packed(path: &Path, frame_size: usize, frame_count: u32) -> ResourceResult<Vec<Bytes>> {
    let mut file = File::open(path)?;
    let mut frames = Vec::with_capacity(frame_count as usize);

    for i in 0..frame_count {
        let mut frame = Vec::new();
        frame
            .try_reserve_exact(frame_size)
            .map_err(|_| MemoryError::AllocationFailed(frame_size))?;
        frame.resize(frame_size, 0);

        if let Err(e) = file.read_exact(&mut frame) {
            error!("packed read failed at frame {}: {e}", i + 1);
            return Err(e.into());
        }
        frames.push(Bytes::from(frame));
    }

    info!("loaded {} frames from packed file", frame_count);
    Ok(frames)
}
