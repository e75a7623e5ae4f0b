use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use super::traits::{AssetFetcher, AssetStream, FetchResponse};
use crate::config::NetworkConfig;
use crate::error::NetworkError;

/// Reqwest-backed fetcher. Carries a set of identity headers applied to
/// every request; headers can be swapped at runtime (e.g. after the device
/// re-registers).
pub struct HttpFetcher {
    client: Client,
    headers: RwLock<HashMap<String, String>>,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self, NetworkError> {
        let mut builder = Client::builder().timeout(Duration::from_millis(config.timeout_ms));
        if !config.keep_alive {
            builder = builder.pool_max_idle_per_host(0);
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            headers: RwLock::new(HashMap::new()),
        })
    }

    /// Sets the identity headers sent with every request.
    pub fn set_identity(&self, device_id: &str, client_id: &str, user_agent: &str) {
        let mut headers = self.headers.write();
        if !device_id.is_empty() {
            headers.insert("Device-Id".to_string(), device_id.to_string());
        }
        if !client_id.is_empty() {
            headers.insert("Client-Id".to_string(), client_id.to_string());
        }
        headers.insert("User-Agent".to_string(), user_agent.to_string());
    }

    pub fn set_header(&self, name: &str, value: &str) {
        self.headers
            .write()
            .insert(name.to_string(), value.to_string());
    }

    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let headers = self.headers.read().clone();
        let mut req = self.client.get(url);
        for (k, v) in &headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, NetworkError> {
        let resp = self
            .build_request(url)
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(&e))?;

        let status = resp.status();
        debug!("http get status={} url={}", status.as_u16(), url);
        if !status.is_success() {
            warn!("http get failed status={} url={}", status.as_u16(), url);
            return Err(NetworkError::HttpStatus(status.as_u16()));
        }

        Ok(FetchResponse {
            content_length: resp.content_length(),
            body: Box::new(HttpBody { resp }),
        })
    }
}

struct HttpBody {
    resp: Response,
}

#[async_trait]
impl AssetStream for HttpBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, NetworkError> {
        self.resp
            .chunk()
            .await
            .map_err(|e| NetworkError::from_reqwest(&e))
    }
}
