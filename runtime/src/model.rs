//! Core records: the search task being resolved, the product record produced
//! for it, and the page window arithmetic that maps local to global rank.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of entries the storefront renders per result page.
pub const DEFAULT_PAGE_SIZE: u32 = 72;

/// A unit of work: find `target_code` in the results for `keyword`.
///
/// Issued by the task source and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTask {
    pub id: i64,
    pub keyword: String,
    /// Primary match key (product id).
    pub target_code: String,
    /// Option-variant item id, as issued by the task source. Not a match key.
    pub item_id: Option<String>,
    /// Option-variant vendor item id, as issued by the task source. Not a match key.
    pub vendor_item_id: Option<String>,
}

impl SearchTask {
    pub fn new(id: i64, keyword: impl Into<String>, target_code: impl Into<String>) -> Self {
        Self {
            id,
            keyword: keyword.into(),
            target_code: target_code.into(),
            item_id: None,
            vendor_item_id: None,
        }
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_vendor_item_id(mut self, vendor_item_id: impl Into<String>) -> Self {
        self.vendor_item_id = Some(vendor_item_id.into());
        self
    }
}

/// How a listing entry was matched against the task's target code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The entry's product id equals the target code.
    Primary,
    /// The entry's item id or vendor item id equals the target code.
    Fallback,
}

/// Structured description of the matched listing entry.
///
/// `rank` is global and 1-based; `0` means the target was not found, in which
/// case every other field keeps its default. Every other field is extracted
/// independently: a missing or malformed source yields `None` (or `false` /
/// empty for flags and collections) without affecting its siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub rank: u32,
    /// Which key produced the match. `None` when not found.
    pub matched_by: Option<MatchKind>,
    /// Product name, taken from the thumbnail's alt text.
    pub name: Option<String>,
    pub thumbnail_ref: Option<String>,
    /// Star rating. `None` when the rating block is absent or has no number.
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    /// Struck-through list price. Always `None` when sold out.
    pub list_price: Option<u64>,
    /// Current sale price. Always `None` when sold out.
    pub sale_price: Option<u64>,
    /// Discount percentage. Always `None` when sold out.
    pub discount_percent: Option<u64>,
    /// Unit label from a `(<label>당 N원)` pattern, e.g. `100g당`. Always `None` when sold out.
    pub unit_label: Option<String>,
    /// Unit price paired with `unit_label`. Always `None` when sold out.
    pub unit_price: Option<u64>,
    pub free_ship: bool,
    pub free_return: bool,
    /// Storefront-recommended badge.
    pub featured: bool,
    pub discount_tags: BTreeSet<String>,
    pub point_benefit: Option<String>,
    /// Delivery badge icon keys in display order.
    pub delivery_badge_keys: Vec<String>,
    pub delivery_text: Option<String>,
    pub sold_out: bool,
    /// Sold-out caption. Only set when `sold_out`.
    pub sold_out_text: Option<String>,
    pub detail_url: Option<String>,
}

impl ProductRecord {
    /// The record reported when the target does not appear in the scanned pages.
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.rank > 0
    }
}

/// A single result page in the paginated scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page index.
    pub page_index: u32,
    pub page_size: u32,
}

impl PageWindow {
    pub fn first(page_size: u32) -> Self {
        Self {
            page_index: 1,
            page_size,
        }
    }

    pub fn next(self) -> Self {
        Self {
            page_index: self.page_index + 1,
            ..self
        }
    }

    /// Translate a 1-based position on this page into an absolute rank.
    pub fn global_rank(&self, local_rank: u32) -> u32 {
        self.page_index.saturating_sub(1) * self.page_size + local_rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_rank_formula() {
        for page_index in 1..=10u32 {
            let window = PageWindow {
                page_index,
                page_size: DEFAULT_PAGE_SIZE,
            };
            for local in [1u32, 2, 36, 72] {
                assert_eq!(
                    window.global_rank(local),
                    (page_index - 1) * DEFAULT_PAGE_SIZE + local
                );
            }
        }
    }

    #[test]
    fn test_page_window_next() {
        let window = PageWindow::first(72).next().next();
        assert_eq!(window.page_index, 3);
        assert_eq!(window.global_rank(5), 149);
    }

    #[test]
    fn test_not_found_record_is_blank() {
        let record = ProductRecord::not_found();
        assert_eq!(record.rank, 0);
        assert!(!record.is_found());
        assert!(record.name.is_none());
        assert!(record.delivery_badge_keys.is_empty());
    }

    #[test]
    fn test_task_builder() {
        let task = SearchTask::new(7, "c타입케이블", "8491054718")
            .with_item_id("24575039429")
            .with_vendor_item_id("4104448300");
        assert_eq!(task.item_id.as_deref(), Some("24575039429"));
        assert_eq!(task.vendor_item_id.as_deref(), Some("4104448300"));
    }
}
