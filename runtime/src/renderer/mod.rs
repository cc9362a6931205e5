//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderSession` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The locator and
//! the resilience controller only ever see these traits.

pub mod chromium;
pub mod filter;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use filter::{FilterDecision, RequestFilter};

/// Load milestone a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitMode {
    /// The `load` event.
    #[default]
    Load,
    /// `DOMContentLoaded`.
    DomContentLoaded,
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Options for a new browser session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub viewport: (u32, u32),
    /// Proxy server for all traffic of the session.
    pub proxy: Option<String>,
    /// Request filter installed on the session's page, if any.
    pub filter: Option<RequestFilter>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1200, 800),
            proxy: None,
            filter: None,
        }
    }
}

impl SessionOptions {
    pub fn with_proxy(&self, proxy: Option<&str>) -> Self {
        Self {
            proxy: proxy.map(String::from),
            ..self.clone()
        }
    }
}

/// A browser engine that can create sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Launch a new isolated session (browser process + page).
    async fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn RenderSession>>;
}

/// A single browser session with one page.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Navigate to a URL, waiting for `wait` with a timeout.
    async fn navigate(&mut self, url: &str, wait: WaitMode, timeout: Duration)
        -> Result<NavigationResult>;
    /// Get the current URL.
    async fn current_url(&self) -> Result<String>;
    /// Get the document title.
    async fn title(&self) -> Result<String>;
    /// Evaluate a JavaScript expression in the page and return its value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn html(&self) -> Result<String>;
    /// Wait until an element matching `selector` exists.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;
    /// Wait until a JavaScript predicate evaluates truthy.
    async fn wait_for_condition(&self, predicate: &str, timeout: Duration) -> Result<()>;
    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;
    /// Move the pointer over the first element matching `selector`.
    async fn hover(&self, selector: &str) -> Result<()>;
    /// Install a request filter for subsequent traffic.
    async fn intercept_requests(&mut self, filter: RequestFilter) -> Result<()>;
    /// Close the session and release the browser.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Quote a string as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// A renderer used when Chromium is unavailable. Every session fails.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_session(&self, _options: &SessionOptions) -> Result<Box<dyn RenderSession>> {
        Err(anyhow::anyhow!("Browser not available"))
    }
}
