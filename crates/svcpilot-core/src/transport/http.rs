//! Local status endpoint probe used outside the native runtime.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;

use crate::error::TransportError;

use super::{HttpProbe, ProbeResponse};

/// Probes `<base_url><path>` with caching disabled.
#[derive(Debug, Clone)]
pub struct LocalApiProbe {
    client: reqwest::Client,
    base_url: String,
}

impl LocalApiProbe {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl HttpProbe for LocalApiProbe {
    async fn get(&self, path: &str) -> Result<ProbeResponse, TransportError> {
        let response = self
            .client
            .get(self.url_for(path))
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|err| TransportError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::Http(err.to_string()))?;
        Ok(ProbeResponse { status, body })
    }
}
