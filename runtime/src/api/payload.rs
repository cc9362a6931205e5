//! Wire shapes of the task API.

use crate::model::{ProductRecord, SearchTask};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `GET /assign`.
#[derive(Debug, Deserialize)]
pub struct AssignResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<AssignedTask>,
}

/// Task as issued by the API. Ids arrive as strings or numbers.
#[derive(Debug, Deserialize)]
pub struct AssignedTask {
    pub id: Value,
    pub keyword: String,
    #[serde(default)]
    pub product_code: Option<Value>,
    #[serde(default)]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub item_id: Option<Value>,
    #[serde(default)]
    pub vendor_item_id: Option<Value>,
}

/// Render a JSON id as text. Empty strings and nulls are absent.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl AssignedTask {
    /// Convert into a task. `product_code` wins over `product_id`.
    pub fn into_task(self) -> Option<SearchTask> {
        let id = match &self.id {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        let target = self
            .product_code
            .as_ref()
            .and_then(id_text)
            .or_else(|| self.product_id.as_ref().and_then(id_text))?;
        Some(SearchTask {
            id,
            keyword: self.keyword,
            target_code: target,
            item_id: self.item_id.as_ref().and_then(id_text),
            vendor_item_id: self.vendor_item_id.as_ref().and_then(id_text),
        })
    }
}

/// Body of `POST /result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    pub id: i64,
    pub rank: u32,
    pub product_data: ProductData,
}

/// Present fields of a found product. Everything is omitted when not found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_ship: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_return: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupang_pick: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discount_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_benefit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_keys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_soldout: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soldout_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.is_empty())
}

impl ReportPayload {
    pub fn from_record(task_id: i64, record: &ProductRecord) -> Self {
        let product_data = if record.is_found() {
            ProductData {
                product_name: non_empty(&record.name),
                thumbnail_url: non_empty(&record.thumbnail_ref),
                rating: record.rating,
                review_count: record.review_count,
                before_price: record.list_price,
                sale_price: record.sale_price,
                discount_percent: record.discount_percent,
                unit_label: non_empty(&record.unit_label),
                unit_price: record.unit_price,
                free_ship: Some(record.free_ship),
                free_return: Some(record.free_return),
                delivery_info: non_empty(&record.delivery_text),
                coupang_pick: Some(record.featured),
                discount_types: record.discount_tags.iter().cloned().collect(),
                point_benefit: non_empty(&record.point_benefit),
                delivery_keys: (!record.delivery_badge_keys.is_empty())
                    .then(|| record.delivery_badge_keys.join(",")),
                is_soldout: record.sold_out.then_some(true),
                soldout_text: if record.sold_out {
                    record.sold_out_text.clone()
                } else {
                    None
                },
                product_url: non_empty(&record.detail_url),
            }
        } else {
            ProductData::default()
        };
        Self {
            id: task_id,
            rank: record.rank,
            product_data,
        }
    }
}
