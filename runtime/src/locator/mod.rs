//! Target locator: pages through search results until the task's target
//! appears, then extracts its record.
//!
//! The locator drives a [`RenderSession`] but never interprets DOM itself;
//! pages are read into [`PageSnapshot`]s by a [`ListingReader`] and matched
//! with the pure functions in [`extract`].

pub mod extract;
pub mod listing;
pub mod signatures;

pub use listing::{HtmlListingReader, ListingEntry, ListingReader, PageSnapshot};

use crate::error::LocateError;
use crate::model::{PageWindow, ProductRecord, SearchTask, DEFAULT_PAGE_SIZE};
use crate::renderer::{RenderSession, WaitMode};
use std::sync::Arc;
use std::time::Duration;

/// Locator tunables.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub page_size: u32,
    pub max_pages: u32,
    pub navigation_timeout: Duration,
    /// Bounded wait for the result list.
    pub content_timeout: Duration,
    /// Bounded wait for the page parameter to change after a click.
    pub pagination_timeout: Duration,
    /// Settle time after the search page loads.
    pub page_load_delay: Duration,
    /// Settle time after moving to another page.
    pub page_settle_delay: Duration,
    pub scroll_settle_delay: Duration,
    pub hover_settle_delay: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: 10,
            navigation_timeout: Duration::from_secs(40),
            content_timeout: Duration::from_secs(10),
            pagination_timeout: Duration::from_secs(20),
            page_load_delay: Duration::from_millis(2000),
            page_settle_delay: Duration::from_millis(1500),
            scroll_settle_delay: Duration::from_millis(1000),
            hover_settle_delay: Duration::from_millis(300),
        }
    }
}

/// Finds a task's target in the paginated search results.
pub struct Locator {
    config: LocatorConfig,
    reader: Arc<dyn ListingReader>,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Self {
        Self::with_reader(config, Arc::new(HtmlListingReader))
    }

    pub fn with_reader(config: LocatorConfig, reader: Arc<dyn ListingReader>) -> Self {
        Self { config, reader }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Locate `task` using `session`.
    ///
    /// Returns a record with `rank == 0` when the search has no results, the
    /// target is not within `max_pages`, pagination runs out, or moving to
    /// the next page cannot be confirmed.
    pub async fn locate(
        &self,
        task: &SearchTask,
        session: &mut dyn RenderSession,
    ) -> Result<ProductRecord, LocateError> {
        let url = signatures::search_url(&task.keyword, self.config.page_size);
        tracing::debug!(task_id = task.id, %url, "opening search page");
        session
            .navigate(&url, WaitMode::Load, self.config.navigation_timeout)
            .await
            .map_err(LocateError::render)?;
        tokio::time::sleep(self.config.page_load_delay).await;

        let title = session.title().await.unwrap_or_default();
        let landing = self.snapshot(session).await?;
        if signatures::is_error_page(&landing.body_text, &title) {
            return Err(LocateError::Blocked("Error page detected".into()));
        }
        if landing.no_result {
            tracing::warn!(task_id = task.id, keyword = %task.keyword, "search returned no results");
            return Ok(ProductRecord::not_found());
        }

        self.wait_for_list(session).await?;

        let mut window = PageWindow::first(self.config.page_size);
        loop {
            tracing::info!(
                task_id = task.id,
                page = window.page_index,
                max_pages = self.config.max_pages,
                "scanning result page"
            );
            let page = self.snapshot(session).await?;

            if let Some(m) = extract::find_match(&page.entries, task) {
                let rank = window.global_rank(m.local_rank);
                tracing::debug!(
                    task_id = task.id,
                    page = window.page_index,
                    local_rank = m.local_rank,
                    rank,
                    matched_by = ?m.kind,
                    "target found"
                );
                return Ok(extract::build_record(m.entry, rank, m.kind));
            }

            if window.page_index >= self.config.max_pages {
                break;
            }
            let next = window.next();
            if !page.has_page_link(next.page_index) {
                tracing::info!(task_id = task.id, page = window.page_index, "no more result pages");
                break;
            }
            if let Err(e) = self.advance(session, next.page_index).await {
                tracing::warn!(task_id = task.id, "stopping search: {e}");
                break;
            }
            window = next;
        }

        tracing::warn!(
            task_id = task.id,
            target = %task.target_code,
            pages = window.page_index,
            "target not found"
        );
        Ok(ProductRecord::not_found())
    }

    async fn snapshot(&self, session: &mut dyn RenderSession) -> Result<PageSnapshot, LocateError> {
        let html = session.html().await.map_err(LocateError::render)?;
        Ok(self.reader.read(&html))
    }

    async fn wait_for_list(&self, session: &mut dyn RenderSession) -> Result<(), LocateError> {
        let waited = session
            .wait_for_selector(signatures::LIST_SELECTOR, self.config.content_timeout)
            .await;
        if waited.is_ok() {
            return Ok(());
        }
        let url = session.current_url().await.unwrap_or_default();
        let title = session.title().await.unwrap_or_default();
        if signatures::is_error_location(&url, &title) {
            return Err(LocateError::Blocked("Error page detected".into()));
        }
        Err(LocateError::ListNotFound)
    }

    /// Click through to result page `page` and confirm the location changed.
    async fn advance(&self, session: &mut dyn RenderSession, page: u32) -> Result<(), LocateError> {
        let pagination = |e: anyhow::Error| LocateError::Pagination {
            page,
            reason: format!("{e:#}"),
        };
        let link = signatures::page_link_selector(page);

        session
            .evaluate(&signatures::scroll_pagination_script())
            .await
            .map_err(pagination)?;
        tokio::time::sleep(self.config.scroll_settle_delay).await;

        session.hover(&link).await.map_err(pagination)?;
        tokio::time::sleep(self.config.hover_settle_delay).await;

        session.click(&link).await.map_err(pagination)?;
        session
            .wait_for_condition(
                &signatures::page_param_predicate(page),
                self.config.pagination_timeout,
            )
            .await
            .map_err(pagination)?;
        tokio::time::sleep(self.config.page_settle_delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LocatorConfig::default();
        assert_eq!(config.page_size, 72);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.navigation_timeout, Duration::from_secs(40));
        assert_eq!(config.content_timeout, Duration::from_secs(10));
    }
}
