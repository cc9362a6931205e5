//! Shared fixtures: an in-memory storefront served through the renderer traits.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use rankwatch_runtime::locator::signatures;
use rankwatch_runtime::locator::LocatorConfig;
use rankwatch_runtime::renderer::{
    NavigationResult, RenderSession, Renderer, RequestFilter, SessionOptions, WaitMode,
};
use scraper::{Html, Selector};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── HTML builders ──

/// An organic result entry.
pub fn item(data_id: &str, href: &str) -> String {
    format!(
        r#"<li data-id="{data_id}"><a href="{href}"><img alt="상품 {data_id}" src="https://thumbnail.coupangcdn.com/{data_id}.jpg"></a></li>"#
    )
}

/// A sponsored entry carrying the ad mark.
pub fn ad_item(data_id: &str) -> String {
    format!(
        r#"<li data-id="{data_id}"><a href="/vp/products/{data_id}?itemId=1&sourceType=srp_product_ads"><img alt="광고"></a><span class="AdMark_adMark__1">AD</span></li>"#
    )
}

/// `count` organic entries with ids starting at `first_id`.
pub fn filler(first_id: u64, count: u64) -> Vec<String> {
    (first_id..first_id + count)
        .map(|id| item(&id.to_string(), &format!("/vp/products/{id}?itemId={}", id + 1)))
        .collect()
}

/// A result page with links to pages `1..=page_count`.
pub fn results_page(items: &[String], page_count: u32) -> String {
    let links: String = (1..=page_count)
        .map(|p| format!(r#"<a data-page="{p}">{p}</a>"#))
        .collect();
    format!(
        r#"<html><head><title>쿠팡!</title></head><body>
<ul id="product-list">{}</ul>
<div class="Pagination_pagination__x">{links}</div>
</body></html>"#,
        items.join("\n")
    )
}

pub fn no_result_page(keyword: &str) -> String {
    format!(
        r#"<html><body><div class="no-result_magnifier__a"></div><p>'{keyword}'에 대한 검색결과가 없습니다.</p><div class="Pagination_pagination__x"><a data-page="2">2</a></div></body></html>"#
    )
}

pub fn error_page() -> String {
    "<html><body><h1>This site can't be reached</h1><p>net::ERR_HTTP2_PROTOCOL_ERROR</p></body></html>"
        .to_string()
}

/// A page that rendered but has no result list.
pub fn empty_layout_page() -> String {
    "<html><body><div id=\"search-content\">검색 중</div></body></html>".to_string()
}

/// Locator settings without settle delays.
pub fn fast_locator_config() -> LocatorConfig {
    LocatorConfig {
        page_load_delay: Duration::ZERO,
        page_settle_delay: Duration::ZERO,
        scroll_settle_delay: Duration::ZERO,
        hover_settle_delay: Duration::ZERO,
        ..LocatorConfig::default()
    }
}

// ── Fake session ──

/// Scripted storefront behind one session.
#[derive(Debug, Clone, Default)]
pub struct Storefront {
    /// HTML of result pages 1..n.
    pub pages: Vec<String>,
    pub title: String,
    /// URL reported after navigation; defaults to the search URL.
    pub url: Option<String>,
    /// Navigation fails with this message.
    pub navigate_error: Option<String>,
    /// Clicks on page links do nothing.
    pub stall_pagination: bool,
}

impl Storefront {
    pub fn with_pages(pages: Vec<String>) -> Self {
        Self {
            pages,
            title: "쿠팡!".to_string(),
            ..Self::default()
        }
    }
}

/// Records every session-level action for assertions.
pub type ActionLog = Arc<Mutex<Vec<String>>>;

pub struct FakeSession {
    store: Storefront,
    current: Mutex<usize>,
    url: Mutex<String>,
    log: ActionLog,
}

impl FakeSession {
    pub fn new(store: Storefront, log: ActionLog) -> Self {
        Self {
            store,
            current: Mutex::new(0),
            url: Mutex::new(String::new()),
            log,
        }
    }

    fn record(&self, action: String) {
        self.log.lock().unwrap().push(action);
    }

    fn current_html(&self) -> String {
        let index = *self.current.lock().unwrap();
        self.store.pages.get(index).cloned().unwrap_or_default()
    }

    fn current_page(&self) -> u32 {
        *self.current.lock().unwrap() as u32 + 1
    }
}

fn link_page(selector: &str) -> Option<u32> {
    selector
        .strip_prefix(r#"a[data-page=""#)?
        .strip_suffix(r#""]"#)?
        .parse()
        .ok()
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &str, _: WaitMode, _: Duration) -> Result<NavigationResult> {
        self.record(format!("navigate {url}"));
        if let Some(msg) = &self.store.navigate_error {
            bail!("{msg}");
        }
        let final_url = self.store.url.clone().unwrap_or_else(|| url.to_string());
        *self.url.lock().unwrap() = final_url.clone();
        *self.current.lock().unwrap() = 0;
        Ok(NavigationResult {
            final_url,
            load_time_ms: 5,
        })
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.store.title.clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        self.record("scroll".to_string());
        Ok(serde_json::Value::Bool(true))
    }

    async fn html(&self) -> Result<String> {
        Ok(self.current_html())
    }

    async fn wait_for_selector(&self, selector: &str, _: Duration) -> Result<()> {
        let html = Html::parse_document(&self.current_html());
        let sel = Selector::parse(selector).map_err(|e| anyhow::anyhow!("{e:?}"))?;
        if html.select(&sel).next().is_some() {
            Ok(())
        } else {
            bail!("timed out waiting for {selector}")
        }
    }

    async fn wait_for_condition(&self, predicate: &str, _: Duration) -> Result<()> {
        if predicate == signatures::page_param_predicate(self.current_page()) {
            Ok(())
        } else {
            bail!("timed out waiting for condition")
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click {selector}"));
        let Some(page) = link_page(selector) else {
            bail!("no element matches {selector}");
        };
        if !self.store.stall_pagination && (page as usize) <= self.store.pages.len() {
            *self.current.lock().unwrap() = page as usize - 1;
            let mut url = self.url.lock().unwrap();
            *url = url.replacen("page=1", &format!("page={page}"), 1);
        }
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.record(format!("hover {selector}"));
        Ok(())
    }

    async fn intercept_requests(&mut self, _filter: RequestFilter) -> Result<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.record("close".to_string());
        Ok(())
    }
}

// ── Fake renderer ──

/// Hands out one scripted storefront per session, in order. Once the script
/// runs out the last storefront is reused.
pub struct FakeRenderer {
    script: Mutex<VecDeque<Storefront>>,
    last: Mutex<Option<Storefront>>,
    pub log: ActionLog,
}

impl FakeRenderer {
    pub fn new(script: Vec<Storefront>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            log: ActionLog::default(),
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Proxies of the sessions opened so far (`direct` for none).
    pub fn sessions(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| a.strip_prefix("open ").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn RenderSession>> {
        let store = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match script.pop_front() {
                Some(store) => {
                    *last = Some(store.clone());
                    store
                }
                None => last.clone().unwrap_or_default(),
            }
        };
        self.log.lock().unwrap().push(format!(
            "open {}",
            options.proxy.as_deref().unwrap_or("direct")
        ));
        Ok(Box::new(FakeSession::new(store, self.log.clone())))
    }
}
