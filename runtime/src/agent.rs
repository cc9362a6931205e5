//! Orchestration loop: pull a task, resolve it through the connection
//! controller, report, then back off until the next cycle.
//!
//! Strictly sequential. The controller and the backoff scheduler are owned
//! here and mutated only by this loop.

use crate::api::{ResultSink, TaskSource};
use crate::audit::{AuditEntry, AuditLogger};
use crate::backoff::{BackoffScheduler, WaitOutcome};
use crate::error::ErrorCategory;
use crate::resilience::{AttemptHost, ConnectionController};
use crate::shutdown::Shutdown;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No task was available.
    Idle,
    /// The task source failed.
    SourceError,
    /// The task resolved; `rank == 0` means not found.
    Resolved { task_id: i64, rank: u32 },
    Failed { task_id: i64, category: ErrorCategory },
}

/// Totals over an agent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    pub cycles: u64,
    pub idle: u64,
    pub resolved: u64,
    pub found: u64,
    pub failed: u64,
}

impl AgentSummary {
    fn record(&mut self, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Idle => self.idle += 1,
            CycleOutcome::SourceError => self.failed += 1,
            CycleOutcome::Resolved { rank, .. } => {
                self.resolved += 1;
                if rank > 0 {
                    self.found += 1;
                }
            }
            CycleOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct Agent<H: AttemptHost> {
    source: Arc<dyn TaskSource>,
    sink: Arc<dyn ResultSink>,
    controller: ConnectionController,
    host: H,
    backoff: BackoffScheduler,
    shutdown: Shutdown,
    audit: Option<AuditLogger>,
    countdown: bool,
    max_cycles: Option<u64>,
}

impl<H: AttemptHost> Agent<H> {
    pub fn new(
        source: Arc<dyn TaskSource>,
        sink: Arc<dyn ResultSink>,
        controller: ConnectionController,
        host: H,
        backoff: BackoffScheduler,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            sink,
            controller,
            host,
            backoff,
            shutdown,
            audit: None,
            countdown: false,
            max_cycles: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Render the wait between cycles as a progress bar when stderr is a terminal.
    pub fn with_countdown(mut self, enabled: bool) -> Self {
        self.countdown = enabled && std::io::stderr().is_terminal();
        self
    }

    /// Stop after this many cycles instead of running until shutdown.
    pub fn with_max_cycles(mut self, cycles: Option<u64>) -> Self {
        self.max_cycles = cycles;
        self
    }

    pub fn controller(&self) -> &ConnectionController {
        &self.controller
    }

    pub fn backoff(&self) -> &BackoffScheduler {
        &self.backoff
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run cycles until shutdown (or the cycle limit), then release the session.
    pub async fn run(&mut self) -> AgentSummary {
        let mut summary = AgentSummary::default();
        tracing::info!("agent started");

        while !self.shutdown.is_triggered() {
            let outcome = self.cycle().await;
            summary.record(outcome);

            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            if self.pause().await == WaitOutcome::Shutdown {
                break;
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            resolved = summary.resolved,
            found = summary.found,
            failed = summary.failed,
            "agent stopping"
        );
        self.host.shutdown().await;
        summary
    }

    /// One orchestration cycle, without the trailing wait.
    pub async fn cycle(&mut self) -> CycleOutcome {
        if self.controller.begin_cycle().requires_restart() {
            if let Err(e) = self.host.restart(self.controller.active_proxy()).await {
                tracing::warn!("session restart at cycle start failed: {e:#}");
            }
        }
        self.controller.refresh_if_stale().await;

        let task = match self.source.next_task().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                self.backoff.on_empty_queue();
                if self.backoff.at_ceiling() {
                    tracing::warn!(
                        delay_ms = self.backoff.current_delay_ms(),
                        "no tasks available, holding maximum delay"
                    );
                } else {
                    tracing::info!(
                        delay_ms = self.backoff.current_delay_ms(),
                        "no tasks available, increasing delay"
                    );
                }
                return CycleOutcome::Idle;
            }
            Err(e) => {
                self.backoff.on_failure();
                tracing::error!(
                    delay_ms = self.backoff.current_delay_ms(),
                    "failed to fetch task: {e:#}"
                );
                return CycleOutcome::SourceError;
            }
        };
        self.backoff.on_task_acquired();

        tracing::info!(task_id = task.id, keyword = %task.keyword, "task started");
        let started = Instant::now();
        let result = self.controller.resolve(&task, &mut self.host).await;
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(resolution) => {
                let rank = resolution.record.rank;
                if let Err(e) = self.sink.deliver(task.id, &resolution.record).await {
                    tracing::warn!(task_id = task.id, "result delivery failed: {e:#}");
                }
                self.backoff.on_success();
                if rank > 0 {
                    tracing::info!(
                        task_id = task.id,
                        rank,
                        name = resolution.record.name.as_deref().unwrap_or("-"),
                        attempts = resolution.attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "task completed"
                    );
                } else {
                    tracing::info!(
                        task_id = task.id,
                        attempts = resolution.attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "task completed, target not found"
                    );
                }
                self.write_audit(&AuditEntry::resolved(&task, &resolution, elapsed));
                CycleOutcome::Resolved {
                    task_id: task.id,
                    rank,
                }
            }
            Err(err) => {
                let category = err.category();
                self.backoff.on_failure();
                tracing::error!(
                    task_id = task.id,
                    %category,
                    elapsed_ms = elapsed.as_millis() as u64,
                    delay_ms = self.backoff.current_delay_ms(),
                    "task failed: {err}"
                );
                self.write_audit(&AuditEntry::failed(
                    &task,
                    &err,
                    self.controller.mode(),
                    self.controller.active_proxy(),
                    elapsed,
                ));
                CycleOutcome::Failed {
                    task_id: task.id,
                    category,
                }
            }
        };

        let status = self.controller.status();
        tracing::info!(
            mode = %status.mode,
            proxy = status.proxy.as_deref().unwrap_or("-"),
            uses = status.consecutive_proxy_uses,
            max_uses = status.max_proxy_uses,
            direct = %format!("{}/{}", status.stats.direct_successes, status.stats.direct_attempts),
            proxied = %format!("{}/{}", status.stats.proxied_successes, status.stats.proxied_attempts),
            switches = status.stats.mode_switches,
            "connection status"
        );
        outcome
    }

    fn write_audit(&mut self, entry: &AuditEntry) {
        if let Some(audit) = self.audit.as_mut() {
            if let Err(e) = audit.log(entry) {
                tracing::warn!("failed to write audit entry: {e:#}");
            }
        }
    }

    async fn pause(&self) -> WaitOutcome {
        let delay = self.backoff.current_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "waiting for next cycle");
        if !self.countdown || delay < Duration::from_secs(1) {
            return self.backoff.wait(&self.shutdown).await;
        }

        let bar = countdown_bar(delay);
        let ticker = async {
            let start = Instant::now();
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            loop {
                interval.tick().await;
                bar.set_position(start.elapsed().as_secs().min(delay.as_secs()));
            }
        };
        let outcome = tokio::select! {
            outcome = self.backoff.wait(&self.shutdown) => outcome,
            _ = ticker => WaitOutcome::Elapsed,
        };
        bar.finish_and_clear();
        outcome
    }
}

fn countdown_bar(delay: Duration) -> ProgressBar {
    let bar = ProgressBar::new(delay.as_secs());
    let style = ProgressStyle::with_template("next cycle in {msg} [{bar:30.cyan/blue}] {pos}/{len}s")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(format!("{}s", delay.as_secs()));
    bar
}
