//! Agent configuration: built-in defaults, then `RANKWATCH_*` environment
//! overrides, then command-line flags (applied by the CLI).

use crate::backoff::BackoffConfig;
use crate::locator::LocatorConfig;
use crate::model::DEFAULT_PAGE_SIZE;
use crate::renderer::{RequestFilter, SessionOptions};
use crate::resilience::ResilienceConfig;
use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROXY_DIRECTORY_URL: &str = "http://mkt.techb.kr:3001/api/proxy/lists";

#[derive(Debug, Clone, Serialize)]
pub struct ApiSettings {
    pub url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowserSettings {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlerSettings {
    pub page_size: u32,
    pub max_pages: u32,
    pub navigation_timeout_ms: u64,
    pub content_timeout_ms: u64,
    pub pagination_timeout_ms: u64,
}

/// Settle delays in milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct DelaySettings {
    pub page_load_ms: u64,
    pub page_navigation_ms: u64,
    pub scroll_settle_ms: u64,
    pub hover_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxySettings {
    pub enabled: bool,
    pub directory_url: String,
    pub refresh_interval_ms: u64,
    pub max_retries: u32,
    pub max_proxy_uses: u32,
    pub fetch_timeout_ms: u64,
    pub rotate_on_success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterSettings {
    pub enabled: bool,
    /// Informational; requests are only ever refused by the blocked lists.
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub blocked_resource_types: Vec<String>,
    pub blocked_extensions: Vec<String>,
}

/// Everything the agent needs to run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub api: ApiSettings,
    pub browser: BrowserSettings,
    pub crawler: CrawlerSettings,
    pub delays: DelaySettings,
    pub proxy: ProxySettings,
    pub backoff: BackoffConfig,
    pub filter: FilterSettings,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                url: crate::api::DEFAULT_API_URL.to_string(),
                timeout_ms: 20_000,
            },
            browser: BrowserSettings {
                headless: true,
                viewport: (1200, 800),
                executable: None,
            },
            crawler: CrawlerSettings {
                page_size: DEFAULT_PAGE_SIZE,
                max_pages: 10,
                navigation_timeout_ms: 40_000,
                content_timeout_ms: 10_000,
                pagination_timeout_ms: 20_000,
            },
            delays: DelaySettings {
                page_load_ms: 2_000,
                page_navigation_ms: 1_500,
                scroll_settle_ms: 1_000,
                hover_settle_ms: 300,
            },
            proxy: ProxySettings {
                enabled: true,
                directory_url: DEFAULT_PROXY_DIRECTORY_URL.to_string(),
                refresh_interval_ms: 300_000,
                max_retries: 3,
                max_proxy_uses: 5,
                fetch_timeout_ms: 10_000,
                rotate_on_success: true,
            },
            backoff: BackoffConfig::default(),
            filter: FilterSettings {
                enabled: true,
                allowed_domains: strings(&["www.coupang.com", "*.coupang.com", "mkt.techb.kr"]),
                blocked_domains: strings(&[
                    "image*.coupangcdn.com",
                    "thumbnail*.coupangcdn.com",
                    "static.coupangcdn.com",
                    "mercury.coupang.com",
                ]),
                blocked_resource_types: strings(&["image", "font", "media"]),
                blocked_extensions: strings(&[
                    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".woff", ".woff2", ".ttf",
                    ".otf", ".mp4", ".mp3", ".avi",
                ]),
            },
        }
    }
}

impl AgentConfig {
    /// Defaults with `RANKWATCH_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut c = Self::default();

        if let Some(url) = read_env_string("RANKWATCH_API_URL") {
            c.api.url = url;
        }
        c.api.timeout_ms = read_env_u64("RANKWATCH_API_TIMEOUT_MS", c.api.timeout_ms);

        c.browser.headless = read_env_bool("RANKWATCH_HEADLESS", c.browser.headless);
        if let Some(path) = read_env_string("RANKWATCH_CHROMIUM_PATH") {
            c.browser.executable = Some(PathBuf::from(path));
        }

        c.crawler.max_pages = read_env_u32("RANKWATCH_MAX_PAGES", c.crawler.max_pages);
        c.crawler.navigation_timeout_ms =
            read_env_u64("RANKWATCH_NAV_TIMEOUT_MS", c.crawler.navigation_timeout_ms);
        c.crawler.content_timeout_ms =
            read_env_u64("RANKWATCH_WAIT_TIMEOUT_MS", c.crawler.content_timeout_ms);

        c.delays.page_load_ms = read_env_u64("RANKWATCH_PAGE_LOAD_DELAY_MS", c.delays.page_load_ms);
        c.delays.page_navigation_ms =
            read_env_u64("RANKWATCH_PAGE_NAV_DELAY_MS", c.delays.page_navigation_ms);

        c.proxy.enabled = read_env_bool("RANKWATCH_PROXY_ENABLED", c.proxy.enabled);
        if let Some(url) = read_env_string("RANKWATCH_PROXY_URL") {
            c.proxy.directory_url = url;
        }
        c.proxy.refresh_interval_ms =
            read_env_u64("RANKWATCH_PROXY_REFRESH_MS", c.proxy.refresh_interval_ms);
        c.proxy.max_retries = read_env_u32("RANKWATCH_MAX_RETRIES", c.proxy.max_retries);
        c.proxy.max_proxy_uses = read_env_u32("RANKWATCH_MAX_PROXY_USES", c.proxy.max_proxy_uses);
        c.proxy.rotate_on_success =
            read_env_bool("RANKWATCH_ROTATE_ON_SUCCESS", c.proxy.rotate_on_success);

        c.backoff.base_delay_ms = read_env_u64("RANKWATCH_BACKOFF_BASE_MS", c.backoff.base_delay_ms);
        c.backoff.increment_ms =
            read_env_u64("RANKWATCH_BACKOFF_INCREMENT_MS", c.backoff.increment_ms);
        c.backoff.max_delay_ms = read_env_u64("RANKWATCH_BACKOFF_MAX_MS", c.backoff.max_delay_ms);

        c.filter.enabled = read_env_bool("RANKWATCH_RESOURCE_FILTER", c.filter.enabled);
        c
    }

    pub fn validate(&self) -> Result<()> {
        if self.crawler.page_size == 0 {
            bail!("page_size must be greater than 0");
        }
        if self.crawler.max_pages == 0 {
            bail!("max_pages must be greater than 0");
        }
        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            bail!(
                "backoff base delay ({}ms) exceeds max delay ({}ms)",
                self.backoff.base_delay_ms,
                self.backoff.max_delay_ms
            );
        }
        Ok(())
    }

    pub fn locator(&self) -> LocatorConfig {
        LocatorConfig {
            page_size: self.crawler.page_size,
            max_pages: self.crawler.max_pages,
            navigation_timeout: Duration::from_millis(self.crawler.navigation_timeout_ms),
            content_timeout: Duration::from_millis(self.crawler.content_timeout_ms),
            pagination_timeout: Duration::from_millis(self.crawler.pagination_timeout_ms),
            page_load_delay: Duration::from_millis(self.delays.page_load_ms),
            page_settle_delay: Duration::from_millis(self.delays.page_navigation_ms),
            scroll_settle_delay: Duration::from_millis(self.delays.scroll_settle_ms),
            hover_settle_delay: Duration::from_millis(self.delays.hover_settle_ms),
        }
    }

    pub fn resilience(&self) -> ResilienceConfig {
        ResilienceConfig {
            max_retries: self.proxy.max_retries,
            max_proxy_uses: self.proxy.max_proxy_uses,
            rotate_on_success: self.proxy.rotate_on_success,
            refresh_interval: Duration::from_millis(self.proxy.refresh_interval_ms),
        }
    }

    pub fn request_filter(&self) -> Option<RequestFilter> {
        self.filter.enabled.then(|| {
            RequestFilter::new(
                &self.filter.blocked_domains,
                &self.filter.blocked_resource_types,
                &self.filter.blocked_extensions,
            )
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            headless: self.browser.headless,
            viewport: self.browser.viewport,
            proxy: None,
            filter: self.request_filter(),
        }
    }
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_bool(name: &str, default_value: bool) -> bool {
    match std::env::var(name).map(|v| v.trim().to_ascii_lowercase()) {
        Ok(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Ok(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default_value,
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
