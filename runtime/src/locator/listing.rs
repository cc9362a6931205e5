//! Page reading: turns a rendered result page into selector-free listing
//! entries. Matching and field extraction work on [`ListingEntry`] only.

use super::signatures::NO_RESULT_TEXT;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Raw, unparsed facts about one result entry, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingEntry {
    /// `data-id` attribute of the entry.
    pub data_id: Option<String>,
    /// Link target of the entry's first anchor.
    pub href: Option<String>,
    /// Carries an explicit ad marker element.
    pub ad_marked: bool,
    pub image_alt: Option<String>,
    pub image_src: Option<String>,
    /// `None` when the rating block is absent.
    pub rating_text: Option<String>,
    pub review_count_text: Option<String>,
    pub list_price_text: Option<String>,
    pub discount_text: Option<String>,
    pub sale_price_text: Option<String>,
    /// Whitespace-normalized texts of the nodes inside the price area.
    pub price_fragments: Vec<String>,
    pub price_area_text: String,
    pub delivery_text: Option<String>,
    /// Whole entry text, whitespace-normalized.
    pub full_text: String,
    pub featured_badge: bool,
    pub sold_out: bool,
    pub sold_out_text: Option<String>,
    pub point_benefit: Option<String>,
    /// Badge icon URLs (src, or the last srcset candidate).
    pub badge_icon_urls: Vec<String>,
}

/// Everything the locator needs from one rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// Visible body text (scripts and styles excluded).
    pub body_text: String,
    /// Explicit "no results" marker element or banner text.
    pub no_result: bool,
    pub entries: Vec<ListingEntry>,
    /// Page numbers offered by the pagination bar.
    pub page_links: BTreeSet<u32>,
}

impl PageSnapshot {
    pub fn has_page_link(&self, page: u32) -> bool {
        self.page_links.contains(&page)
    }
}

/// Reads a page snapshot out of rendered HTML.
pub trait ListingReader: Send + Sync {
    fn read(&self, html: &str) -> PageSnapshot;
}

/// [`ListingReader`] over the storefront's DOM, using `scraper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlListingReader;

impl ListingReader for HtmlListingReader {
    fn read(&self, html: &str) -> PageSnapshot {
        let document = Html::parse_document(html);
        let s = selectors();

        let body_text = document
            .select(&s.body)
            .next()
            .map(visible_text)
            .unwrap_or_else(|| visible_text(document.root_element()));

        let no_result =
            document.select(&s.no_result).next().is_some() || body_text.contains(NO_RESULT_TEXT);

        let entries = document.select(&s.list_item).map(read_entry).collect();

        let page_links = document
            .select(&s.page_link)
            .filter_map(|a| a.value().attr("data-page"))
            .filter_map(|p| p.trim().parse().ok())
            .collect();

        PageSnapshot {
            body_text,
            no_result,
            entries,
            page_links,
        }
    }
}

struct Selectors {
    body: Selector,
    no_result: Selector,
    list_item: Selector,
    page_link: Selector,
    anchor: Selector,
    ad_mark: Selector,
    image: Selector,
    rating_block: Selector,
    rating_value: Selector,
    rating_count: Selector,
    list_price: Vec<Selector>,
    discount: Vec<Selector>,
    sale_price: Vec<Selector>,
    price_scope: Selector,
    price_nodes: Selector,
    delivery: Selector,
    featured: Selector,
    sold_out: Selector,
    point_text: Selector,
    point_image: Selector,
    badge_icons: Selector,
}

fn css(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid static selector {selector}: {e:?}"))
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        body: css("body"),
        no_result: css("[class^=no-result_magnifier]"),
        list_item: css(super::signatures::LIST_SELECTOR),
        page_link: css("a[data-page]"),
        anchor: css("a"),
        ad_mark: css("[class*=AdMark]"),
        image: css("img"),
        rating_block: css(r#"[class*="ProductRating_productRating__"]"#),
        rating_value: css(r#"[class*="ProductRating_rating__"]"#),
        rating_count: css(r#"[class*="ProductRating_ratingCount__"]"#),
        list_price: vec![
            css(r#"del[class*="basePrice"]"#),
            css("del"),
            css(r#"[class*="basePrice"]"#),
        ],
        discount: vec![
            css(r#"[class*="discountRate"]"#),
            css(r#"[class*="discount-percent"]"#),
            css(r#"[class*="discount"]"#),
        ],
        sale_price: vec![
            css(r#"strong[class*="priceValue"]"#),
            css(r#"[class*="price"] strong"#),
            css("strong"),
        ],
        price_scope: css(r#"[class*="Price"], [class*="price"]"#),
        price_nodes: css("span, div, p, strong, em"),
        delivery: css(r#"[class*="DeliveryInfo"]"#),
        featured: css(r#"[class*="ImageBadge_coupick__"], img[alt="쿠팡추천"]"#),
        sold_out: css(r#"[class*="soldoutText"]"#),
        point_text: css(r#"[class*="cash-benefit"] span"#),
        point_image: css(r#"[class*="cash-benefit"] img"#),
        badge_icons: css(r#"[class*="ImageBadge"] img"#),
    })
}

fn read_entry(item: ElementRef<'_>) -> ListingEntry {
    let s = selectors();
    let href = item
        .select(&s.anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);
    let image = item.select(&s.image).next();

    let (rating_text, review_count_text) = match item.select(&s.rating_block).next() {
        Some(block) => (
            block.select(&s.rating_value).next().map(text_of),
            block.select(&s.rating_count).next().map(text_of),
        ),
        None => (None, None),
    };

    let price_scope = item.select(&s.price_scope).next().unwrap_or(item);
    let price_fragments = price_scope
        .select(&s.price_nodes)
        .map(|el| normalize(&text_of(el)))
        .filter(|t| !t.is_empty())
        .collect();

    let sold_out_el = item.select(&s.sold_out).next();

    let featured_badge = item.select(&s.featured).next().is_some()
        || item.select(&s.image).any(|img| {
            img.value()
                .attr("src")
                .is_some_and(|src| src.to_ascii_lowercase().contains("coupick"))
        });

    let point_benefit = item
        .select(&s.point_text)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            item.select(&s.point_image)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .map(str::to_string)
        });

    let badge_icon_urls = item
        .select(&s.badge_icons)
        .filter_map(image_url)
        .collect();

    ListingEntry {
        data_id: item.value().attr("data-id").map(str::to_string),
        href,
        ad_marked: item.select(&s.ad_mark).next().is_some(),
        image_alt: image.and_then(|img| img.value().attr("alt")).map(str::to_string),
        image_src: image.and_then(|img| img.value().attr("src")).map(str::to_string),
        rating_text,
        review_count_text,
        list_price_text: pick_text(item, &s.list_price),
        discount_text: pick_text(item, &s.discount),
        sale_price_text: pick_text(item, &s.sale_price),
        price_fragments,
        price_area_text: normalize(&visible_text(price_scope)),
        delivery_text: item
            .select(&s.delivery)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty()),
        full_text: normalize(&visible_text(item)),
        featured_badge,
        sold_out: sold_out_el.is_some(),
        sold_out_text: sold_out_el.map(text_of).filter(|t| !t.is_empty()),
        point_benefit,
        badge_icon_urls,
    }
}

/// Text of the first element matched by each selector in turn; the first
/// non-empty one wins.
fn pick_text(root: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        root.select(sel)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    })
}

/// `src`, or the URL of the last `srcset` candidate.
fn image_url(img: ElementRef<'_>) -> Option<String> {
    let el = img.value();
    if let Some(src) = el.attr("src").filter(|s| !s.is_empty()) {
        return Some(src.to_string());
    }
    let last = el.attr("srcset")?.split(',').next_back()?.trim();
    last.split_whitespace()
        .next()
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text content without script, style and noscript contents.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    normalize(&out)
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>쿠팡!</title><script>var e = "ERR_";</script></head>
        <body>
          <ul id="product-list">
            <li data-id="900">
              <a href="/vp/products/900?itemId=1&sourceType=srp_product_ads"><img alt="광고상품" src="ad.jpg"></a>
              <span class="AdMark_adMark__x">AD</span>
            </li>
            <li data-id="111">
              <a href="/vp/products/111?itemId=222&vendorItemId=333">
                <img alt="무선 이어폰" src="https://thumbnail.coupangcdn.com/a.jpg">
              </a>
              <div class="PriceArea_priceArea__a">
                <del class="PriceInfo_basePrice__1">39,900원</del>
                <span class="PriceInfo_discountRate__2">25%</span>
                <strong class="Price_priceValue__3">29,900원</strong>
                <span>(10개당 2,990원)</span>
                <em>와우할인</em>
              </div>
              <div class="ProductRating_productRating__q">
                <span class="ProductRating_rating__w">4.5</span>
                <span class="ProductRating_ratingCount__e">(1,234)</span>
              </div>
              <div class="ImageBadge_imageBadge__r">
                <img src="https://image.coupangcdn.com/badge/rocketwow-bi-16@2x.png?v=1">
                <img srcset="https://x/a/logo-1x.png 1x, https://x/a/fresh@3x.png 3x">
              </div>
              <div class="DeliveryInfo_deliveryInfo__t">내일 도착 보장 무료배송</div>
              <div class="cash-benefit"><span>최대 1,495원 적립</span></div>
            </li>
          </ul>
          <div class="Pagination_pagination__z">
            <a data-page="1">1</a><a data-page="2">2</a><a data-page="3">3</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_reads_entries_in_display_order() {
        let snap = HtmlListingReader.read(PAGE);
        assert_eq!(snap.entries.len(), 2);
        assert!(snap.entries[0].ad_marked);
        assert_eq!(snap.entries[1].data_id.as_deref(), Some("111"));
        assert!(!snap.no_result);
        assert!(snap.has_page_link(2));
        assert!(!snap.has_page_link(4));
    }

    #[test]
    fn test_body_text_skips_scripts() {
        let snap = HtmlListingReader.read(PAGE);
        assert!(!snap.body_text.contains("ERR_"));
        assert!(snap.body_text.contains("무료배송"));
    }

    #[test]
    fn test_entry_fields() {
        let snap = HtmlListingReader.read(PAGE);
        let e = &snap.entries[1];
        assert_eq!(e.image_alt.as_deref(), Some("무선 이어폰"));
        assert_eq!(e.rating_text.as_deref(), Some("4.5"));
        assert_eq!(e.review_count_text.as_deref(), Some("(1,234)"));
        assert_eq!(e.list_price_text.as_deref(), Some("39,900원"));
        assert_eq!(e.discount_text.as_deref(), Some("25%"));
        assert_eq!(e.sale_price_text.as_deref(), Some("29,900원"));
        assert!(e.price_fragments.iter().any(|f| f == "(10개당 2,990원)"));
        assert!(e.price_area_text.contains("와우할인"));
        assert_eq!(e.point_benefit.as_deref(), Some("최대 1,495원 적립"));
        assert_eq!(
            e.badge_icon_urls,
            vec![
                "https://image.coupangcdn.com/badge/rocketwow-bi-16@2x.png?v=1".to_string(),
                "https://x/a/fresh@3x.png".to_string(),
            ]
        );
        assert!(!e.sold_out);
        assert!(!e.featured_badge);
    }

    #[test]
    fn test_no_result_marker_and_text() {
        let marker = r#"<body><div class="no-result_magnifier__abc"></div></body>"#;
        assert!(HtmlListingReader.read(marker).no_result);

        let banner = "<body><p>'zzqx'에 대한 검색결과가 없습니다.</p></body>";
        let snap = HtmlListingReader.read(banner);
        assert!(snap.no_result);
        assert!(snap.entries.is_empty());
        assert!(snap.page_links.is_empty());
    }

    #[test]
    fn test_featured_and_sold_out() {
        let html = r#"<ul id="product-list"><li data-id="5">
            <a href="/vp/products/5"><img alt="x" src="https://img/coupick_badge.png"></a>
            <div class="ProductCard_soldoutText__1">일시품절</div>
        </li></ul>"#;
        let e = &HtmlListingReader.read(html).entries[0];
        assert!(e.featured_badge);
        assert!(e.sold_out);
        assert_eq!(e.sold_out_text.as_deref(), Some("일시품절"));
    }
}
