//! Match policy and record extraction over [`ListingEntry`] values.

use super::listing::ListingEntry;
use super::signatures::ORIGIN;
use crate::model::{MatchKind, ProductRecord, SearchTask};
use regex::Regex;
use std::sync::OnceLock;

/// Ad-tracking parameter carried by sponsored entries' links.
const AD_TRACKING_PARAM: &str = "sourceType=srp_product_ads";

/// Price-area keywords reported as discount tags.
const DISCOUNT_KEYWORDS: &[&str] = &["와우할인", "쿠폰할인"];

const FREE_SHIPPING: &str = "무료배송";
const FREE_RETURN: &str = "무료반품";

/// Identifiers carried by an entry's link target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryIds {
    pub product_id: Option<String>,
    pub item_id: Option<String>,
    pub vendor_item_id: Option<String>,
}

struct Patterns {
    product_id: Regex,
    item_id: Regex,
    vendor_item_id: Regex,
    rating: Regex,
    review_count: Regex,
    unit_price: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).unwrap_or_else(|e| panic!("invalid static regex {p}: {e}"));
        Patterns {
            product_id: re(r"/vp/products/(\d+)"),
            // `(?:^|[?&])` keeps `vendorItemId=` from matching as `itemId=`.
            item_id: re(r"(?:^|[?&])itemId=(\d+)"),
            vendor_item_id: re(r"vendorItemId=(\d+)"),
            rating: re(r"(\d+\.?\d*)"),
            review_count: re(r"\(?\s*(\d+)\s*\)?"),
            unit_price: re(r"\(([^()]*?당)\s*([\d,]+)\s*원\)"),
        }
    })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract the candidate identifiers from a link target.
pub fn entry_ids(href: &str) -> EntryIds {
    let p = patterns();
    EntryIds {
        product_id: capture(&p.product_id, href),
        item_id: capture(&p.item_id, href),
        vendor_item_id: capture(&p.vendor_item_id, href),
    }
}

/// Sponsored entries never count toward rank and are never matched.
pub fn is_sponsored(entry: &ListingEntry) -> bool {
    entry.ad_marked
        || entry
            .href
            .as_deref()
            .is_some_and(|h| h.contains(AD_TRACKING_PARAM))
}

/// Match one organic entry against the task.
///
/// Primary: the entry's data id or product id equals the target code.
/// Fallback: the entry's item id or vendor item id equals the target code.
pub fn match_entry(entry: &ListingEntry, task: &SearchTask) -> Option<MatchKind> {
    let target = task.target_code.as_str();
    let ids = entry.href.as_deref().map(entry_ids).unwrap_or_default();

    if entry.data_id.as_deref() == Some(target) || ids.product_id.as_deref() == Some(target) {
        return Some(MatchKind::Primary);
    }

    if ids.item_id.as_deref() == Some(target) || ids.vendor_item_id.as_deref() == Some(target) {
        return Some(MatchKind::Fallback);
    }
    None
}

/// A match on one page.
#[derive(Debug, Clone, Copy)]
pub struct PageMatch<'a> {
    /// 1-based position among organic entries.
    pub local_rank: u32,
    pub entry: &'a ListingEntry,
    pub kind: MatchKind,
}

/// First organic entry in display order that matches the task.
pub fn find_match<'a>(entries: &'a [ListingEntry], task: &SearchTask) -> Option<PageMatch<'a>> {
    entries
        .iter()
        .filter(|e| !is_sponsored(e))
        .zip(1u32..)
        .find_map(|(entry, local_rank)| {
            match_entry(entry, task).map(|kind| PageMatch {
                local_rank,
                entry,
                kind,
            })
        })
}

/// Digits (and a decimal point) of a price-like text, as a whole amount.
pub fn parse_amount(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits.parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

fn parse_rating(text: &str) -> Option<f64> {
    capture(&patterns().rating, text)?.parse().ok()
}

fn parse_review_count(text: &str) -> Option<u64> {
    let cleaned = text.replace(',', "");
    capture(&patterns().review_count, &cleaned)?.parse().ok()
}

/// `(<label>당 N원)` anywhere in the price-area fragments.
pub fn parse_unit_price(fragments: &[String]) -> Option<(String, u64)> {
    let re = &patterns().unit_price;
    fragments.iter().find_map(|text| {
        let caps = re.captures(text)?;
        let label = caps.get(1)?.as_str().trim().to_string();
        let price = caps.get(2)?.as_str().replace(',', "").parse().ok()?;
        Some((label, price))
    })
}

/// Icon key of a badge image URL: the file name up to its `@` resolution suffix.
pub fn icon_key(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    let key = file.split('@').next().unwrap_or_default();
    (!key.is_empty()).then(|| key.to_string())
}

fn detail_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{ORIGIN}{href}")
    }
}

/// Build the record for a matched entry at `rank`.
///
/// Fields are extracted independently. A sold-out entry reports no price
/// group at all.
pub fn build_record(entry: &ListingEntry, rank: u32, kind: MatchKind) -> ProductRecord {
    let shipping_text = entry
        .delivery_text
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(&entry.full_text);

    let mut record = ProductRecord {
        rank,
        matched_by: Some(kind),
        name: entry.image_alt.clone(),
        thumbnail_ref: entry.image_src.clone(),
        rating: entry.rating_text.as_deref().and_then(parse_rating),
        review_count: entry.review_count_text.as_deref().and_then(parse_review_count),
        free_ship: shipping_text.contains(FREE_SHIPPING),
        free_return: shipping_text.contains(FREE_RETURN),
        featured: entry.featured_badge,
        discount_tags: DISCOUNT_KEYWORDS
            .iter()
            .filter(|k| entry.price_area_text.contains(*k))
            .map(|k| k.to_string())
            .collect(),
        point_benefit: entry.point_benefit.clone(),
        delivery_badge_keys: entry
            .badge_icon_urls
            .iter()
            .filter_map(|u| icon_key(u))
            .collect(),
        delivery_text: entry.delivery_text.clone(),
        sold_out: entry.sold_out,
        sold_out_text: entry.sold_out_text.clone().filter(|_| entry.sold_out),
        detail_url: entry.href.as_deref().map(detail_url),
        ..ProductRecord::default()
    };

    if !entry.sold_out {
        record.list_price = entry.list_price_text.as_deref().and_then(parse_amount);
        record.sale_price = entry.sale_price_text.as_deref().and_then(parse_amount);
        record.discount_percent = entry.discount_text.as_deref().and_then(parse_amount);
        if let Some((label, price)) = parse_unit_price(&entry.price_fragments) {
            record.unit_label = Some(label);
            record.unit_price = Some(price);
        }
    }
    record
}
