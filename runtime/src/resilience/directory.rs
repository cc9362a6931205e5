//! Proxy directory: the external list of proxy endpoints.

use crate::error::ProxyDirectoryError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Source of proxy endpoint strings (e.g. `http://1.2.3.4:8080`).
#[async_trait]
pub trait ProxyDirectory: Send + Sync {
    /// Fetch the full ordered list. An empty list is an error.
    async fn fetch(&self) -> Result<Vec<String>, ProxyDirectoryError>;
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    proxies: Option<Vec<String>>,
}

/// Proxy directory served over HTTP as `{"success": true, "proxies": [...]}`.
pub struct HttpProxyDirectory {
    client: reqwest::Client,
    url: String,
}

impl HttpProxyDirectory {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ProxyDirectory for HttpProxyDirectory {
    async fn fetch(&self) -> Result<Vec<String>, ProxyDirectoryError> {
        tracing::info!(url = %self.url, "fetching proxy directory");
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProxyDirectoryError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProxyDirectoryError::Request(format!("HTTP {status}")));
        }

        let body: DirectoryResponse = resp
            .json()
            .await
            .map_err(|e| ProxyDirectoryError::InvalidResponse(e.to_string()))?;

        match body.proxies {
            Some(proxies) if body.success => {
                let proxies: Vec<String> = proxies
                    .into_iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                if proxies.is_empty() {
                    return Err(ProxyDirectoryError::Empty);
                }
                tracing::info!(count = proxies.len(), "proxy directory loaded");
                Ok(proxies)
            }
            _ => Err(ProxyDirectoryError::InvalidResponse(
                "missing success flag or proxy list".into(),
            )),
        }
    }
}

/// Fixed proxy list, e.g. from the command line.
pub struct StaticProxyDirectory {
    proxies: Vec<String>,
}

impl StaticProxyDirectory {
    pub fn new(proxies: Vec<String>) -> Self {
        Self { proxies }
    }
}

#[async_trait]
impl ProxyDirectory for StaticProxyDirectory {
    async fn fetch(&self) -> Result<Vec<String>, ProxyDirectoryError> {
        if self.proxies.is_empty() {
            return Err(ProxyDirectoryError::Empty);
        }
        Ok(self.proxies.clone())
    }
}
