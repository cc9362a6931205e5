//! CLI subcommand implementations for the rankwatch binary.

pub mod doctor;
pub mod output;
pub mod probe_cmd;
pub mod proxies_cmd;
pub mod run_cmd;

use crate::config::AgentConfig;
use crate::host::BrowserHost;
use crate::locator::Locator;
use crate::renderer::chromium::ChromiumRenderer;
use crate::resilience::{ConnectionController, HttpProxyDirectory, ProxyDirectory, StaticProxyDirectory};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GlobalArgs {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headful: bool,

    /// Maximum result pages to scan per task
    #[arg(long, global = true)]
    pub max_pages: Option<u32>,

    /// Never fail over to a proxy
    #[arg(long, global = true)]
    pub no_proxy: bool,

    /// Keep the same proxy until it fails
    #[arg(long, global = true)]
    pub no_rotate: bool,

    /// Path to the Chromium executable
    #[arg(long, global = true)]
    pub chromium: Option<PathBuf>,
}

/// Initialize tracing on stderr. `RUST_LOG` directives are honored.
pub fn init_tracing(args: &GlobalArgs) -> Result<()> {
    let level = if args.verbose {
        "rankwatch=debug"
    } else if args.quiet {
        "rankwatch=warn"
    } else {
        "rankwatch=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(level.parse()?);

    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
    Ok(())
}

/// Environment config with command-line overrides, validated.
pub fn load_config(args: &GlobalArgs) -> Result<AgentConfig> {
    let mut config = AgentConfig::from_env();
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut AgentConfig, args: &GlobalArgs) {
    if args.headful {
        config.browser.headless = false;
    }
    if let Some(max_pages) = args.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if args.no_proxy {
        config.proxy.enabled = false;
    }
    if args.no_rotate {
        config.proxy.rotate_on_success = false;
    }
    if let Some(path) = &args.chromium {
        config.browser.executable = Some(path.clone());
    }
}

/// Proxy directory for the config. Disabled proxies yield an empty directory,
/// so a blocked direct attempt ends its task instead of failing over.
pub fn proxy_directory(config: &AgentConfig) -> Arc<dyn ProxyDirectory> {
    if config.proxy.enabled {
        Arc::new(HttpProxyDirectory::new(
            config.proxy.directory_url.clone(),
            Duration::from_millis(config.proxy.fetch_timeout_ms),
        ))
    } else {
        Arc::new(StaticProxyDirectory::new(Vec::new()))
    }
}

pub fn build_controller(config: &AgentConfig) -> ConnectionController {
    ConnectionController::new(config.resilience(), proxy_directory(config))
}

/// Browser host over Chromium. Fails when no Chromium can be found.
pub fn build_host(config: &AgentConfig) -> Result<BrowserHost> {
    let renderer = ChromiumRenderer::new(config.browser.executable.clone())?;
    tracing::debug!(path = %renderer.executable().display(), "using chromium");
    Ok(BrowserHost::new(
        Arc::new(renderer),
        config.session_options(),
        Locator::new(config.locator()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let mut config = AgentConfig::default();
        let args = GlobalArgs {
            headful: true,
            max_pages: Some(3),
            no_proxy: true,
            no_rotate: true,
            ..GlobalArgs::default()
        };
        apply_overrides(&mut config, &args);
        assert!(!config.browser.headless);
        assert_eq!(config.crawler.max_pages, 3);
        assert!(!config.proxy.enabled);
        assert!(!config.proxy.rotate_on_success);
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        let mut config = AgentConfig::default();
        apply_overrides(
            &mut config,
            &GlobalArgs {
                max_pages: Some(0),
                ..GlobalArgs::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_disabled_proxy_directory_is_empty() {
        let mut config = AgentConfig::default();
        config.proxy.enabled = false;
        assert!(proxy_directory(&config).fetch().await.is_err());
    }
}
