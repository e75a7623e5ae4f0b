use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type ResourceResult<T> = Result<T, ResourceError>;

/// Top-level error for every engine operation, split by subsystem.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    State(#[from] StateError),
}

impl From<io::Error> for ResourceError {
    fn from(err: io::Error) -> Self {
        Self::Storage(StorageError::from(err))
    }
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("network unreachable")]
    Unreachable,

    #[error("request timed out")]
    Timeout,

    #[error("server returned status {0}")]
    HttpStatus(u16),

    #[error("response carries no content length")]
    UnknownLength,

    #[error("body truncated: received {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

impl NetworkError {
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unreachable
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Transient failures are worth another attempt inside the retry budget.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable | Self::Timeout | Self::Truncated { .. } | Self::Transport(_)
        ) || matches!(self, Self::HttpStatus(status) if *status >= 500)
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("free memory {free} below required {required} bytes")]
    BelowFloor { free: u64, required: u64 },

    #[error("failed to allocate {0} bytes")]
    AllocationFailed(usize),
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad container magic {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),

    #[error("file shorter than the container header")]
    TruncatedHeader,

    #[error("container payload size {0} out of range")]
    DataSizeOutOfRange(u32),

    #[error("{path}: {actual} bytes where {expected} were expected")]
    WrongFrameSize {
        path: PathBuf,
        actual: u64,
        expected: u64,
    },

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("malformed hex array: {0}")]
    MalformedHexArray(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("resource store is not mounted")]
    NotMounted,

    #[error("mount failed: {0}")]
    MountFailed(String),

    #[error("storage out of space")]
    OutOfSpace,

    #[error("io error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::StorageFull {
            Self::OutOfSpace
        } else {
            Self::Io(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("a preload session is already running")]
    PreloadAlreadyRunning,

    #[error("engine is not initialized")]
    NotInitialized,
}
