//! Fetch and print the proxy directory.

use crate::cli::output;
use crate::config::AgentConfig;
use crate::resilience::{HttpProxyDirectory, ProxyDirectory};
use anyhow::Result;
use std::time::Duration;

pub async fn run(config: &AgentConfig, json: bool) -> Result<()> {
    let directory = HttpProxyDirectory::new(
        config.proxy.directory_url.clone(),
        Duration::from_millis(config.proxy.fetch_timeout_ms),
    );
    let proxies = directory.fetch().await?;

    if json {
        return output::print_json(&proxies);
    }
    println!("{} proxies from {}", proxies.len(), config.proxy.directory_url);
    for proxy in &proxies {
        println!("  {proxy}");
    }
    Ok(())
}
