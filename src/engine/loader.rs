// Single-image loading: classification plus the decode ladder that keeps
// every historical file format readable.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{ResourceConfig, CONTAINER_HEADER_SIZE};
use crate::error::{FormatError, MemoryError, ResourceResult, StorageError};
use crate::format::{self, ContainerFormat, ContainerHeader};

pub struct FrameLoader {
    config: Arc<ResourceConfig>,
}

impl FrameLoader {
    pub fn new(config: Arc<ResourceConfig>) -> Self {
        Self { config }
    }

    /// Loads one image file, whatever its format. Tagged containers are
    /// validated hard; an unrecognized header degrades to a raw whole-file
    /// read so pre-container files keep working.
    pub fn load_image(&self, path: &Path) -> ResourceResult<Bytes> {
        match format::classify_file(path, self.config.frame_size() as u64)? {
            ContainerFormat::Tagged(header) => self.load_container(path, header),
            ContainerFormat::Raw => self.load_raw(path),
            ContainerFormat::LegacyHex => self.load_legacy(path),
        }
    }

    /// Loads the logo, preferring the tagged file and falling back to the
    /// legacy source format.
    pub fn load_logo(&self) -> ResourceResult<Bytes> {
        let primary = self.config.logo_path();
        match self.load_image(&primary) {
            Ok(data) => Ok(data),
            Err(err) => {
                let legacy = self.config.logo_legacy_path();
                if legacy.exists() {
                    debug!("logo fallback to {}", legacy.display());
                    self.load_image(&legacy)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn load_container(&self, path: &Path, header: ContainerHeader) -> ResourceResult<Bytes> {
        header.validate()?;

        let mut file = File::open(path).map_err(StorageError::from)?;
        file.seek(SeekFrom::Start(CONTAINER_HEADER_SIZE as u64))
            .map_err(StorageError::from)?;

        let size = header.data_size as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| MemoryError::AllocationFailed(size))?;
        data.resize(size, 0);
        file.read_exact(&mut data).map_err(StorageError::from)?;

        info!(
            "loaded tagged image {} ({} bytes, {}x{})",
            path.display(),
            size,
            header.width,
            header.height
        );
        Ok(Bytes::from(data))
    }

    fn load_raw(&self, path: &Path) -> ResourceResult<Bytes> {
        let meta = std::fs::metadata(path).map_err(StorageError::from)?;
        let size = meta.len() as usize;
        if size == 0 {
            return Err(FormatError::WrongFrameSize {
                path: path.to_path_buf(),
                actual: 0,
                expected: self.config.frame_size() as u64,
            }
            .into());
        }

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| MemoryError::AllocationFailed(size))?;
        let mut file = File::open(path).map_err(StorageError::from)?;
        file.read_to_end(&mut data).map_err(StorageError::from)?;

        if data.len() != size {
            warn!(
                "raw image {} changed size during read: {}/{}",
                path.display(),
                data.len(),
                size
            );
        }
        debug!("loaded raw image {} ({} bytes)", path.display(), data.len());
        Ok(Bytes::from(data))
    }

    fn load_legacy(&self, path: &Path) -> ResourceResult<Bytes> {
        let text = std::fs::read(path).map_err(StorageError::from)?;
        let payload = format::hex_array::decode_hex_array(&text)?;
        if payload.is_empty() {
            return Err(FormatError::MalformedHexArray("empty array body".into()).into());
        }
        info!(
            "loaded legacy image {} ({} bytes)",
            path.display(),
            payload.len()
        );
        Ok(Bytes::from(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_with_frame_size() -> (tempfile::TempDir, FrameLoader, usize) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ResourceConfig::default();
        config.filesystem.base_path = dir.path().to_path_buf();
        let size = config.frame_size();
        (dir, FrameLoader::new(Arc::new(config)), size)
    }

    #[test]
    fn raw_sized_file_loads_whole() {
        let (dir, loader, size) = loader_with_frame_size();
        let path = dir.path().join("frame.bin");
        std::fs::write(&path, vec![0xAB; size]).unwrap();

        let data = loader.load_image(&path).unwrap();
        assert_eq!(data.len(), size);
        assert_eq!(data[0], 0xAB);
    }

    #[test]
    fn tagged_container_loads_payload_only() {
        let (dir, loader, _) = loader_with_frame_size();
        let path = dir.path().join("frame.bin");

        let payload = vec![0x5A; 1000];
        let header = ContainerHeader::new(240, 240, payload.len() as u32);
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&payload);
        std::fs::write(&path, bytes).unwrap();

        let data = loader.load_image(&path).unwrap();
        assert_eq!(data.len(), payload.len());
        assert!(data.iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn bad_magic_degrades_to_raw() {
        let (dir, loader, _) = loader_with_frame_size();
        let path = dir.path().join("frame.bin");

        let mut bytes = vec![0u8; 64];
        bytes[0] = 0xDE;
        std::fs::write(&path, &bytes).unwrap();

        let data = loader.load_image(&path).unwrap();
        assert_eq!(data.len(), 64);
    }

    #[test]
    fn unsupported_version_is_a_hard_error() {
        let (dir, loader, _) = loader_with_frame_size();
        let path = dir.path().join("frame.bin");

        let mut header = ContainerHeader::new(240, 240, 16);
        header.version = 9;
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, bytes).unwrap();

        let err = loader.load_image(&path).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ResourceError::Format(FormatError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn short_container_payload_fails() {
        let (dir, loader, _) = loader_with_frame_size();
        let path = dir.path().join("frame.bin");

        let header = ContainerHeader::new(240, 240, 4096);
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[0u8; 100]);
        std::fs::write(&path, bytes).unwrap();

        assert!(loader.load_image(&path).is_err());
    }

    #[test]
    fn legacy_hex_file_decodes() {
        let (dir, loader, _) = loader_with_frame_size();
        let path = dir.path().join("frame.h");
        std::fs::write(&path, b"const unsigned char img[2] = { 0x12, 0x34 };").unwrap();

        let data = loader.load_image(&path).unwrap();
        assert_eq!(&data[..], &[0x34, 0x12]);
    }

    #[test]
    fn logo_falls_back_to_legacy_file() {
        let (dir, loader, _) = loader_with_frame_size();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(
            dir.path().join("images/logo.h"),
            b"const unsigned char logo[2] = { 0xAA, 0xBB };",
        )
        .unwrap();

        let data = loader.load_logo().unwrap();
        assert_eq!(&data[..], &[0xBB, 0xAA]);
    }
}
