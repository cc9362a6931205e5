//! `rankwatch probe`: resolve a single keyword/target pair and print the record.

use crate::cli::{build_controller, build_host, output};
use crate::config::AgentConfig;
use crate::model::SearchTask;
use crate::resilience::AttemptHost;
use anyhow::Result;
use serde_json::json;

pub struct ProbeArgs {
    pub keyword: String,
    pub target: String,
    pub item_id: Option<String>,
    pub vendor_item_id: Option<String>,
}

pub async fn run(config: AgentConfig, args: ProbeArgs) -> Result<()> {
    let mut task = SearchTask::new(0, args.keyword, args.target);
    if let Some(item_id) = args.item_id {
        task = task.with_item_id(item_id);
    }
    if let Some(vendor_item_id) = args.vendor_item_id {
        task = task.with_vendor_item_id(vendor_item_id);
    }

    let mut host = build_host(&config)?;
    let mut controller = build_controller(&config);

    let result = controller.resolve(&task, &mut host).await;
    host.shutdown().await;

    let resolution = result?;
    output::print_json(&json!({
        "keyword": task.keyword,
        "target": task.target_code,
        "attempts": resolution.attempts,
        "mode": resolution.mode,
        "proxy": resolution.proxy,
        "record": resolution.record,
    }))
}
