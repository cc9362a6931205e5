//! Browser-backed attempt host: owns the single render session and runs the
//! locator on it.

use crate::error::LocateError;
use crate::locator::Locator;
use crate::model::{ProductRecord, SearchTask};
use crate::renderer::{RenderSession, Renderer, SessionOptions};
use crate::resilience::AttemptHost;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Holds at most one live session, created lazily on the current network path.
pub struct BrowserHost {
    renderer: Arc<dyn Renderer>,
    options: SessionOptions,
    locator: Locator,
    session: Option<Box<dyn RenderSession>>,
    proxy: Option<String>,
}

impl BrowserHost {
    pub fn new(renderer: Arc<dyn Renderer>, options: SessionOptions, locator: Locator) -> Self {
        Self {
            renderer,
            options,
            locator,
            session: None,
            proxy: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    async fn open(&self) -> Result<Box<dyn RenderSession>> {
        let options = self.options.with_proxy(self.proxy.as_deref());
        let session = self.renderer.new_session(&options).await?;
        tracing::info!(proxy = self.proxy.as_deref().unwrap_or("direct"), "browser session opened");
        Ok(session)
    }

    /// Close the current session. Failures are logged and swallowed.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            match session.close().await {
                Ok(()) => tracing::debug!("browser session closed"),
                Err(e) => tracing::warn!("failed to close browser session: {e:#}"),
            }
        }
    }
}

#[async_trait]
impl AttemptHost for BrowserHost {
    async fn attempt(&mut self, task: &SearchTask) -> Result<ProductRecord, LocateError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.open().await.map_err(LocateError::render)?,
        };
        let session = self.session.insert(session);
        self.locator.locate(task, session.as_mut()).await
    }

    async fn restart(&mut self, proxy: Option<&str>) -> Result<()> {
        self.close().await;
        self.proxy = proxy.map(String::from);
        let session = self.open().await?;
        self.session = Some(session);
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LocatorConfig;
    use crate::renderer::{NavigationResult, RequestFilter, WaitMode};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sessions that fail every navigation; records opens and closes.
    #[derive(Default)]
    struct CountingRenderer {
        log: Arc<Mutex<Vec<String>>>,
    }

    struct DeadSession {
        log: Arc<Mutex<Vec<String>>>,
        proxy: Option<String>,
    }

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn RenderSession>> {
            let proxy = options.proxy.clone();
            self.log
                .lock()
                .unwrap()
                .push(format!("open {}", proxy.as_deref().unwrap_or("direct")));
            Ok(Box::new(DeadSession {
                log: self.log.clone(),
                proxy,
            }))
        }
    }

    #[async_trait]
    impl RenderSession for DeadSession {
        async fn navigate(&mut self, _: &str, _: WaitMode, _: Duration) -> Result<NavigationResult> {
            anyhow::bail!("net::ERR_HTTP2_PROTOCOL_ERROR")
        }
        async fn current_url(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn title(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn evaluate(&self, _: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn html(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn wait_for_selector(&self, _: &str, _: Duration) -> Result<()> {
            Ok(())
        }
        async fn wait_for_condition(&self, _: &str, _: Duration) -> Result<()> {
            Ok(())
        }
        async fn click(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn hover(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn intercept_requests(&mut self, _: RequestFilter) -> Result<()> {
            Ok(())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("close {}", self.proxy.as_deref().unwrap_or("direct")));
            anyhow::bail!("browser already gone")
        }
    }

    #[tokio::test]
    async fn test_lazy_open_and_restart_order() {
        let renderer = CountingRenderer::default();
        let log = renderer.log.clone();
        let mut host = BrowserHost::new(
            Arc::new(renderer),
            SessionOptions::default(),
            Locator::new(LocatorConfig::default()),
        );
        assert!(!host.has_session());

        let task = SearchTask::new(1, "kw", "1");
        let err = host.attempt(&task).await.unwrap_err();
        assert!(err.to_string().contains("ERR_HTTP2_PROTOCOL_ERROR"));
        assert!(host.has_session());

        // Close failures are swallowed; the new session is opened afterwards.
        host.restart(Some("http://p1:80")).await.unwrap();
        assert_eq!(host.proxy(), Some("http://p1:80"));
        host.close().await;
        assert!(!host.has_session());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["open direct", "close direct", "open http://p1:80", "close http://p1:80"]
        );
    }
}
