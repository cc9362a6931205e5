//! `rankwatch run` and `rankwatch simulate`: the long-running agent loop.

use crate::agent::{Agent, AgentSummary};
use crate::api::{ApiClient, NullSink, ResultSink, SimulatedSource, TaskSource};
use crate::audit::AuditLogger;
use crate::backoff::BackoffScheduler;
use crate::cli::{build_controller, build_host};
use crate::config::AgentConfig;
use crate::shutdown::Shutdown;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Where tasks come from and where results go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskBackend {
    Api,
    Simulated,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cycles: Option<u64>,
    pub no_audit: bool,
    pub quiet: bool,
}

pub async fn run(config: AgentConfig, backend: TaskBackend, options: RunOptions) -> Result<()> {
    let (source, sink): (Arc<dyn TaskSource>, Arc<dyn ResultSink>) = match backend {
        TaskBackend::Api => {
            let client = Arc::new(ApiClient::new(
                config.api.url.clone(),
                Duration::from_millis(config.api.timeout_ms),
            )?);
            let source: Arc<dyn TaskSource> = client.clone();
            let sink: Arc<dyn ResultSink> = client;
            (source, sink)
        }
        TaskBackend::Simulated => {
            let source: Arc<dyn TaskSource> = Arc::new(SimulatedSource::sample());
            let sink: Arc<dyn ResultSink> = Arc::new(NullSink {
                quiet: options.quiet,
            });
            (source, sink)
        }
    };

    let host = build_host(&config)?;
    let controller = build_controller(&config);
    let backoff = BackoffScheduler::new(config.backoff);

    let shutdown = Shutdown::new();
    let signals = shutdown.listen_for_signals();

    tracing::info!(
        backend = ?backend,
        api = %config.api.url,
        headless = config.browser.headless,
        max_pages = config.crawler.max_pages,
        proxy = config.proxy.enabled,
        "starting agent"
    );

    let mut agent = Agent::new(source, sink, controller, host, backoff, shutdown)
        .with_countdown(!options.quiet)
        .with_max_cycles(options.cycles);
    if !options.no_audit {
        match AuditLogger::default_logger() {
            Ok(audit) => {
                tracing::debug!(path = %audit.path().display(), "audit log enabled");
                agent = agent.with_audit(audit);
            }
            Err(e) => tracing::warn!("audit log disabled: {e:#}"),
        }
    }

    let summary = agent.run().await;
    signals.abort();

    print_summary(&summary, &agent, options.quiet);
    Ok(())
}

fn print_summary<H: crate::resilience::AttemptHost>(
    summary: &AgentSummary,
    agent: &Agent<H>,
    quiet: bool,
) {
    if quiet {
        return;
    }
    let stats = agent.controller().stats();
    eprintln!();
    eprintln!(
        "  {} cycles, {} resolved ({} found), {} failed, {} idle",
        summary.cycles, summary.resolved, summary.found, summary.failed, summary.idle
    );
    eprintln!(
        "  direct ok {}, proxied ok {}, mode switches {}",
        stats.direct_successes, stats.proxied_successes, stats.mode_switches
    );
}
