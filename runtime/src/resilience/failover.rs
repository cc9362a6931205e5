//! Bounded retry loop that resolves one task through the controller.

use super::{ConnectionController, ConnectionMode};
use crate::classify::{classify_locate, report_category};
use crate::error::{ErrorCategory, LocateError, ResolveError};
use crate::model::{ProductRecord, SearchTask};
use async_trait::async_trait;

/// The caller side of a resolution: runs attempts and rebuilds sessions.
#[async_trait]
pub trait AttemptHost: Send {
    /// Run the locator once for `task` on the current session.
    async fn attempt(&mut self, task: &SearchTask) -> Result<ProductRecord, LocateError>;

    /// Tear down the current session and create a new one routed through
    /// `proxy` (direct when `None`). Teardown failures must be swallowed.
    async fn restart(&mut self, proxy: Option<&str>) -> anyhow::Result<()>;

    /// Release the session for good. Failures must be swallowed.
    async fn shutdown(&mut self) {}
}

/// A successfully resolved task.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: ProductRecord,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub mode: ConnectionMode,
    pub proxy: Option<String>,
}

impl ConnectionController {
    /// Resolve `task`, failing over between network paths on blocking and
    /// proxy failures until the retry budget is spent.
    ///
    /// The retry counter lives only for this call.
    pub async fn resolve<H>(
        &mut self,
        task: &SearchTask,
        host: &mut H,
    ) -> Result<Resolution, ResolveError>
    where
        H: AttemptHost + ?Sized,
    {
        let max_retries = self.config.max_retries;
        let mut retry_count: u32 = 0;

        loop {
            self.record_attempt();
            let err = match host.attempt(task).await {
                Ok(record) => {
                    self.record_success();
                    return Ok(Resolution {
                        record,
                        attempts: retry_count + 1,
                        mode: self.mode,
                        proxy: self.active_proxy.clone(),
                    });
                }
                Err(err) => err,
            };

            let category = classify_locate(&err, self.mode);
            if !category.is_retryable() {
                return Err(ResolveError::Locate {
                    category: report_category(&err, self.mode),
                    source: err,
                });
            }

            if retry_count >= max_retries {
                tracing::error!(
                    task_id = task.id,
                    attempts = retry_count + 1,
                    %category,
                    "retry budget exceeded"
                );
                return Err(ResolveError::RetryBudgetExceeded {
                    attempts: retry_count + 1,
                    last: err,
                });
            }

            tracing::warn!(
                task_id = task.id,
                mode = %self.mode,
                %category,
                retry = retry_count + 1,
                max_retries,
                "attempt failed: {err}"
            );

            let transition = match self.on_failure(category).await {
                Ok(t) => t,
                Err(dir_err) => {
                    tracing::error!(
                        task_id = task.id,
                        category = %dir_err.category(),
                        "cannot fail over: {dir_err}"
                    );
                    return Err(ResolveError::Locate { category, source: err });
                }
            };

            if let super::Transition::Restart { reason } = transition {
                tracing::info!(
                    task_id = task.id,
                    mode = %self.mode,
                    proxy = self.active_proxy().unwrap_or("-"),
                    "restarting session: {reason}"
                );
                let proxy = self.active_proxy.clone();
                if let Err(e) = host.restart(proxy.as_deref()).await {
                    tracing::error!(task_id = task.id, "session restart failed: {e:#}");
                    return Err(ResolveError::Locate {
                        category: ErrorCategory::Unclassified,
                        source: LocateError::render(e),
                    });
                }
            }

            retry_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{ResilienceConfig, StaticProxyDirectory};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Replays scripted outcomes and records restarts.
    struct ScriptedHost {
        outcomes: VecDeque<Result<ProductRecord, LocateError>>,
        attempts: u32,
        restarts: Vec<Option<String>>,
    }

    impl ScriptedHost {
        fn new(outcomes: Vec<Result<ProductRecord, LocateError>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                attempts: 0,
                restarts: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl AttemptHost for ScriptedHost {
        async fn attempt(&mut self, _task: &SearchTask) -> Result<ProductRecord, LocateError> {
            self.attempts += 1;
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Err(LocateError::Render("script exhausted".into())))
        }

        async fn restart(&mut self, proxy: Option<&str>) -> anyhow::Result<()> {
            self.restarts.push(proxy.map(String::from));
            Ok(())
        }
    }

    fn controller(proxies: Vec<&str>) -> ConnectionController {
        let dir = Arc::new(StaticProxyDirectory::new(
            proxies.into_iter().map(String::from).collect(),
        ));
        ConnectionController::with_rng(
            ResilienceConfig {
                rotate_on_success: false,
                ..ResilienceConfig::default()
            },
            dir,
            StdRng::seed_from_u64(42),
        )
    }

    fn found(rank: u32) -> ProductRecord {
        ProductRecord {
            rank,
            ..ProductRecord::default()
        }
    }

    fn blocked() -> Result<ProductRecord, LocateError> {
        Err(LocateError::Blocked("Error page detected".into()))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let mut ctl = controller(vec!["http://p1:80"]);
        let mut host = ScriptedHost::new(vec![Ok(found(3))]);
        let task = SearchTask::new(1, "kw", "123");
        let res = ctl.resolve(&task, &mut host).await.unwrap();
        assert_eq!(res.record.rank, 3);
        assert_eq!(res.attempts, 1);
        assert_eq!(res.mode, ConnectionMode::Direct);
        assert!(host.restarts.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_then_success_via_proxy() {
        let mut ctl = controller(vec!["http://p1:80"]);
        let mut host = ScriptedHost::new(vec![blocked(), Ok(found(80))]);
        let task = SearchTask::new(1, "kw", "123");
        let res = ctl.resolve(&task, &mut host).await.unwrap();
        assert_eq!(res.attempts, 2);
        assert_eq!(res.mode, ConnectionMode::Proxied);
        assert_eq!(res.proxy.as_deref(), Some("http://p1:80"));
        assert_eq!(host.restarts, vec![Some("http://p1:80".to_string())]);
        assert_eq!(ctl.stats().proxied_successes, 1);
        assert_eq!(ctl.stats().direct_successes, 0);
    }

    #[tokio::test]
    async fn test_fourth_blocked_outcome_exceeds_budget() {
        let mut ctl = controller(vec!["http://p1:80", "http://p2:80"]);
        let mut host = ScriptedHost::new(vec![blocked(), blocked(), blocked(), blocked(), Ok(found(1))]);
        let task = SearchTask::new(9, "kw", "123");
        let err = ctl.resolve(&task, &mut host).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::RetryBudgetExceeded { attempts: 4, .. }
        ));
        assert_eq!(host.attempts, 4);
        assert_eq!(host.restarts.len(), 3);
    }

    #[tokio::test]
    async fn test_unclassified_is_not_retried() {
        let mut ctl = controller(vec!["http://p1:80"]);
        let mut host = ScriptedHost::new(vec![Err(LocateError::ListNotFound), Ok(found(1))]);
        let task = SearchTask::new(2, "kw", "123");
        let err = ctl.resolve(&task, &mut host).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ListNotFound);
        assert_eq!(host.attempts, 1);
        assert!(host.restarts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_proxy_list_fails_with_blocked() {
        let mut ctl = controller(vec![]);
        let mut host = ScriptedHost::new(vec![blocked(), Ok(found(1))]);
        let task = SearchTask::new(3, "kw", "123");
        let err = ctl.resolve(&task, &mut host).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Blocked);
        assert!(matches!(
            err,
            ResolveError::Locate {
                source: LocateError::Blocked(_),
                ..
            }
        ));
        assert_eq!(host.attempts, 1);
        assert_eq!(ctl.mode(), ConnectionMode::Direct);
    }

    #[tokio::test]
    async fn test_proxied_timeout_rotates_proxy() {
        let mut ctl = controller(vec!["http://p1:80", "http://p2:80"]);
        let mut host = ScriptedHost::new(vec![
            blocked(),
            Err(LocateError::Render("navigation timed out after 40000ms".into())),
            Ok(found(5)),
        ]);
        let task = SearchTask::new(4, "kw", "123");
        let res = ctl.resolve(&task, &mut host).await.unwrap();
        assert_eq!(res.attempts, 3);
        assert_eq!(host.restarts.len(), 2);
        assert_eq!(ctl.stats().mode_switches, 2);
    }

    #[tokio::test]
    async fn test_retry_counter_is_per_task() {
        let mut ctl = controller(vec!["http://p1:80"]);
        let task = SearchTask::new(5, "kw", "123");
        let mut host = ScriptedHost::new(vec![blocked(), blocked(), blocked(), Ok(found(1))]);
        ctl.resolve(&task, &mut host).await.unwrap();

        // A fresh task gets the full budget again.
        let mut host = ScriptedHost::new(vec![blocked(), blocked(), blocked(), Ok(found(2))]);
        let res = ctl.resolve(&task, &mut host).await.unwrap();
        assert_eq!(res.attempts, 4);
    }
}
