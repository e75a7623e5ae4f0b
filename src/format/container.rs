use crate::config::{
    BINARY_IMAGE_MAGIC, BINARY_IMAGE_VERSION, CONTAINER_HEADER_SIZE, MAX_CONTAINER_DATA_SIZE,
};
use crate::error::FormatError;

/// Fixed 32-byte header in front of a tagged image payload. All fields are
/// little-endian on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub magic: u32,
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub data_size: u32,
    pub reserved: [u32; 3],
}

impl ContainerHeader {
    pub fn new(width: u32, height: u32, data_size: u32) -> Self {
        Self {
            magic: BINARY_IMAGE_MAGIC,
            version: BINARY_IMAGE_VERSION,
            width,
            height,
            data_size,
            reserved: [0; 3],
        }
    }

    /// Reads a header from the first 32 bytes. Only the length is checked
    /// here; magic and version policy belong to the caller.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < CONTAINER_HEADER_SIZE {
            return Err(FormatError::TruncatedHeader);
        }
        let word = |i: usize| {
            u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        Ok(Self {
            magic: word(0),
            version: word(1),
            width: word(2),
            height: word(3),
            data_size: word(4),
            reserved: [word(5), word(6), word(7)],
        })
    }

    pub fn encode(&self) -> [u8; CONTAINER_HEADER_SIZE] {
        let mut out = [0u8; CONTAINER_HEADER_SIZE];
        let words = [
            self.magic,
            self.version,
            self.width,
            self.height,
            self.data_size,
            self.reserved[0],
            self.reserved[1],
            self.reserved[2],
        ];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        out
    }

    /// Enforces the decode policy: a recognized magic must carry a
    /// supported version and a sane payload size.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic != BINARY_IMAGE_MAGIC {
            return Err(FormatError::BadMagic(self.magic));
        }
        if self.version != BINARY_IMAGE_VERSION {
            return Err(FormatError::UnsupportedVersion(self.version));
        }
        if self.data_size == 0 || self.data_size > MAX_CONTAINER_DATA_SIZE {
            return Err(FormatError::DataSizeOutOfRange(self.data_size));
        }
        Ok(())
    }
}
