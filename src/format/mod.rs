// Image container formats: a tagged binary container, raw frame dumps and
// the legacy C hex-array text files kept for migration.

pub mod container;
pub mod hex_array;
pub mod packed;

pub use container::ContainerHeader;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::config::{BINARY_IMAGE_MAGIC, CONTAINER_HEADER_SIZE};
use crate::error::{FormatError, ResourceResult, StorageError};

/// What a resource file turned out to be. All loading decisions flow from
/// this one classification.
#[derive(Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Header-carrying binary container.
    Tagged(ContainerHeader),
    /// Headerless pixel dump, loaded whole.
    Raw,
    /// Legacy C source text with a hex byte array.
    LegacyHex,
}

/// Classifies a file on disk without decoding it.
///
/// A file whose size equals the raw frame size is taken as a raw dump
/// before any header probe; a failed magic check also degrades to raw so
/// that pre-container files keep loading.
pub fn classify_file(path: &Path, raw_frame_size: u64) -> Result<ContainerFormat, StorageError> {
    if path.extension().is_some_and(|ext| ext == "h") {
        return Ok(ContainerFormat::LegacyHex);
    }

    let meta = std::fs::metadata(path)?;
    if meta.len() == raw_frame_size {
        return Ok(ContainerFormat::Raw);
    }
    if meta.len() < CONTAINER_HEADER_SIZE as u64 {
        return Ok(ContainerFormat::Raw);
    }

    let mut file = File::open(path)?;
    let mut head = [0u8; CONTAINER_HEADER_SIZE];
    file.read_exact(&mut head)?;

    match ContainerHeader::parse(&head) {
        Ok(header) if header.magic == BINARY_IMAGE_MAGIC => Ok(ContainerFormat::Tagged(header)),
        _ => Ok(ContainerFormat::Raw),
    }
}

/// Rewrites a legacy hex-array source file as a tagged binary container.
/// Returns the payload size written.
pub fn convert_hex_to_container(
    src: &Path,
    dst: &Path,
    width: u32,
    height: u32,
) -> ResourceResult<usize> {
    info!("converting {} to {}", src.display(), dst.display());

    let text = std::fs::read(src).map_err(StorageError::from)?;
    let payload = hex_array::decode_hex_array(&text)?;
    if payload.is_empty() {
        return Err(FormatError::MalformedHexArray("empty array body".into()).into());
    }

    let header = ContainerHeader::new(width, height, payload.len() as u32);
    let mut out = File::create(dst).map_err(StorageError::from)?;
    out.write_all(&header.encode()).map_err(StorageError::from)?;
    out.write_all(&payload).map_err(StorageError::from)?;
    out.flush().map_err(StorageError::from)?;

    info!("conversion done, {} payload bytes", payload.len());
    Ok(payload.len())
}
