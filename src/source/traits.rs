use async_trait::async_trait;
use bytes::Bytes;

use crate::error::NetworkError;

/// A successfully opened GET response. The body has not been read yet.
pub struct FetchResponse {
    /// Value of the Content-Length header, when the server sent one.
    pub content_length: Option<u64>,
    pub body: Box<dyn AssetStream>,
}

/// Incremental body reader. Chunk sizes are whatever the transport
/// delivers; callers do their own buffering.
#[async_trait]
pub trait AssetStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, NetworkError>;
}

/// HTTP GET abstraction the engine downloads through. Implementations
/// resolve to `Ok` only for 2xx responses; any other status is a
/// `NetworkError::HttpStatus`.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, NetworkError>;

    /// Fetches a small text resource in one piece (manifest documents).
    async fn get_text(&self, url: &str) -> Result<String, NetworkError> {
        let mut resp = self.get(url).await?;
        let mut buf = Vec::new();
        while let Some(chunk) = resp.body.next_chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
