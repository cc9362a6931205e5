//! Chromium-based renderer using chromiumoxide.
//!
//! Each session owns its own browser process because the proxy server is a
//! launch-time switch. Closing the session shuts the process down.

use super::{js_string, NavigationResult, RenderSession, Renderer, RequestFilter, SessionOptions, WaitMode};
use crate::renderer::FilterDecision;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. RANKWATCH_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("RANKWATCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.rankwatch/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".rankwatch/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".rankwatch/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".rankwatch/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".rankwatch/chromium/chrome-linux64/chrome"),
                home.join(".rankwatch/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    executable: PathBuf,
}

impl ChromiumRenderer {
    /// Use an explicit executable, or search the usual locations.
    pub fn new(executable: Option<PathBuf>) -> Result<Self> {
        let executable = match executable {
            Some(path) => path,
            None => find_chromium().context(
                "Chromium not found. Set RANKWATCH_CHROMIUM_PATH or install google-chrome.",
            )?,
        };
        Ok(Self { executable })
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn RenderSession>> {
        let (width, height) = options.viewport;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(self.executable.clone())
            .window_size(width, height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(anyhow::anyhow!("failed to create new page: {e}"));
            }
        };

        tracing::debug!(
            proxy = options.proxy.as_deref().unwrap_or("-"),
            headless = options.headless,
            "chromium session started"
        );

        let mut session = ChromiumSession {
            browser,
            page,
            handler_task,
            interceptor: None,
        };
        if let Some(filter) = options.filter.clone() {
            session.intercept_requests(filter).await?;
        }
        Ok(Box::new(session))
    }
}

/// One Chromium process with a single page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    interceptor: Option<JoinHandle<()>>,
}

impl ChromiumSession {
    async fn poll_until(&self, script: &str, timeout: Duration, what: &str) -> Result<()> {
        let start = Instant::now();
        loop {
            let ok = self
                .evaluate(script)
                .await
                .map(|v| v.as_bool().unwrap_or(false))
                .unwrap_or(false);
            if ok {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                bail!("{what} timed out after {}ms", timeout.as_millis());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Why the load wait after `goto` ended without the load event, if it did.
fn load_wait_failure<T, E: std::fmt::Display>(
    outcome: &std::result::Result<std::result::Result<T, E>, tokio::time::error::Elapsed>,
    remaining: Duration,
) -> Option<String> {
    match outcome {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(format!("load wait failed: {e}")),
        Err(_) => Some(format!(
            "load event not seen within {}ms",
            remaining.as_millis()
        )),
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitMode,
        timeout: Duration,
    ) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {
                if wait == WaitMode::Load {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    let waited =
                        tokio::time::timeout(remaining, self.page.wait_for_navigation()).await;
                    if let Some(note) = load_wait_failure(&waited, remaining) {
                        tracing::debug!(url, "{note}");
                    }
                }
                let final_url = self.current_url().await.unwrap_or_else(|_| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}ms", timeout.as_millis()),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn title(&self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .context("failed to get title")?;
        Ok(title.unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn html(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        self.poll_until(&script, timeout, &format!("waitForSelector({selector})"))
            .await
    }

    async fn wait_for_condition(&self, predicate: &str, timeout: Duration) -> Result<()> {
        let script = format!("Boolean({predicate})");
        self.poll_until(&script, timeout, "waitForFunction").await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?
            .click()
            .await
            .with_context(|| format!("click failed: {selector}"))?;
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?
            .hover()
            .await
            .with_context(|| format!("hover failed: {selector}"))?;
        Ok(())
    }

    async fn intercept_requests(&mut self, filter: RequestFilter) -> Result<()> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .context("failed to subscribe to paused requests")?;
        self.page
            .execute(EnableParams::default())
            .await
            .context("failed to enable request interception")?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let resource_type = format!("{:?}", event.resource_type);
                let outcome = match filter.decide(&event.request.url, &resource_type) {
                    FilterDecision::Allow => page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ()),
                    FilterDecision::Block => page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ()),
                };
                if let Err(e) = outcome {
                    tracing::debug!(url = %event.request.url, "request interception failed: {e}");
                }
            }
        });

        if let Some(previous) = self.interceptor.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if let Some(task) = this.interceptor.take() {
            task.abort();
        }
        let closed = this.browser.close().await;
        let _ = this.browser.wait().await;
        this.handler_task.abort();
        closed.context("failed to close browser")?;
        Ok(())
    }
}
