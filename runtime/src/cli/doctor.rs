//! Environment readiness check.

use crate::audit::logger::default_path;
use crate::cli::output::{check_line, heading};
use crate::config::AgentConfig;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;

/// Check Chromium availability, the audit directory, and print the effective config.
pub async fn run(config: &AgentConfig) -> Result<()> {
    heading("Rankwatch Doctor");

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium = config.browser.executable.clone().or_else(find_chromium);
    match &chromium {
        Some(path) if path.exists() => check_line(true, format!("Chromium found: {}", path.display())),
        Some(path) => check_line(false, format!("Chromium path does not exist: {}", path.display())),
        None => check_line(
            false,
            "Chromium NOT found. Install Chrome or set RANKWATCH_CHROMIUM_PATH.",
        ),
    }

    let audit = default_path();
    let audit_dir = audit.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    match std::fs::create_dir_all(&audit_dir) {
        Ok(()) => check_line(true, format!("Audit log: {}", audit.display())),
        Err(e) => check_line(false, format!("Audit directory {}: {e}", audit_dir.display())),
    }

    let valid = config.validate();
    match &valid {
        Ok(()) => check_line(true, "Configuration valid"),
        Err(e) => check_line(false, format!("Configuration invalid: {e:#}")),
    }
    if !config.proxy.enabled {
        println!("[--] Proxy failover disabled");
    }

    println!();
    println!("Configuration:");
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();

    let ready = chromium.is_some_and(|p| p.exists()) && valid.is_ok();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
