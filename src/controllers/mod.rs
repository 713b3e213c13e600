//! Controllers for the AppFleet operator
//!
//! [`ApplicationController`] watches `ManagedApplication` objects and keeps
//! their cluster objects in line. The other three are periodic loops driven by
//! [`run_periodic`]: autoscaling, manual-scaling recommendations and the
//! cluster-wide usage monitor.

mod application;
mod autoscale;
mod cluster_monitor;
mod manual_scaling;

pub use application::{needs_status_update, ApplicationController};
pub use autoscale::AutoscaleController;
pub use cluster_monitor::ClusterMonitorController;
pub use manual_scaling::ManualScalingController;

use crate::cluster::ClusterReconciler;
use crate::crd::ApplicationSpec;
use crate::error::{OperatorError, Result};
use crate::usage::{evaluate_sample, UsageVerdict};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Common trait for all controllers
#[async_trait::async_trait]
pub trait Controller: Send + Sync {
    /// Run until the process shuts down
    async fn run(self: Arc<Self>) -> std::result::Result<(), OperatorError>;

    /// Get the controller name for logging
    fn name(&self) -> &'static str;
}

/// What one tick of a periodic loop did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Applications or nodes evaluated
    pub evaluated: usize,
    /// Evaluations that failed or panicked
    pub failed: usize,
    /// Pod verdicts or nodes over their threshold
    pub exceeding: usize,
    /// Scale-up calls that succeeded
    pub scaled: usize,
    /// Notifications handed to the notifier
    pub notified: usize,
}

/// One application's evaluation result
#[derive(Debug)]
pub struct Evaluation {
    pub application: ApplicationSpec,
    pub verdicts: Result<Vec<UsageVerdict>>,
}

/// Evaluate every application concurrently, one task each.
///
/// Returns once every task has finished. A panicking task is logged and
/// contributes no entry.
pub async fn evaluate_applications(
    reconciler: &Arc<ClusterReconciler>,
    applications: Vec<ApplicationSpec>,
) -> Vec<Evaluation> {
    let mut tasks = JoinSet::new();
    for application in applications {
        let reconciler = Arc::clone(reconciler);
        tasks.spawn(async move {
            let verdicts = reconciler
                .fetch_application_metrics(&application.namespace_name, &application.name)
                .await
                .map(|samples| {
                    samples
                        .iter()
                        .map(|sample| evaluate_sample(sample, &application))
                        .collect()
                });
            Evaluation {
                application,
                verdicts,
            }
        });
    }

    let mut evaluations = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(evaluation) => evaluations.push(evaluation),
            Err(e) => error!("Evaluation task failed: {}", e),
        }
    }
    evaluations
}

/// Run one tick in its own task, bounded by `deadline`.
///
/// Errors, panics and timeouts are logged and yield `None`; a timed-out tick
/// is aborted along with any tasks it spawned.
pub async fn run_tick<Fut>(name: &'static str, deadline: Duration, tick: Fut) -> Option<TickSummary>
where
    Fut: Future<Output = Result<TickSummary>> + Send + 'static,
{
    debug!(controller = name, "Tick started");
    let mut handle = tokio::spawn(tick);

    match tokio::time::timeout(deadline, &mut handle).await {
        Ok(Ok(Ok(summary))) => {
            debug!(
                controller = name,
                evaluated = summary.evaluated,
                failed = summary.failed,
                exceeding = summary.exceeding,
                scaled = summary.scaled,
                notified = summary.notified,
                "Tick completed"
            );
            Some(summary)
        }
        Ok(Ok(Err(e))) => {
            warn!(controller = name, "Tick abandoned: {}", e);
            None
        }
        Ok(Err(e)) => {
            error!(controller = name, "Tick task failed: {}", e);
            None
        }
        Err(_) => {
            handle.abort();
            warn!(
                controller = name,
                deadline_secs = deadline.as_secs(),
                "Tick exceeded its deadline and was aborted"
            );
            None
        }
    }
}

/// Drive `tick` every `period` for the life of the process.
///
/// A tick never overlaps the next one; ticks missed while one runs are delayed.
pub async fn run_periodic<F, Fut>(name: &'static str, period: Duration, deadline: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TickSummary>> + Send + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        run_tick(name, deadline, tick()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_tick_returns_summary() {
        let summary = run_tick("test", Duration::from_secs(5), async {
            Ok(TickSummary {
                evaluated: 2,
                ..Default::default()
            })
        })
        .await;
        assert_eq!(summary.map(|s| s.evaluated), Some(2));
    }

    #[tokio::test]
    async fn test_run_tick_survives_error_and_panic() {
        let failed = run_tick("test", Duration::from_secs(5), async {
            Err(OperatorError::Persistence("store down".to_string()))
        })
        .await;
        assert!(failed.is_none());

        let panicked = run_tick("test", Duration::from_secs(5), async {
            if true {
                panic!("boom");
            }
            Ok(TickSummary::default())
        })
        .await;
        assert!(panicked.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_tick_aborts_after_deadline() {
        let timed_out = run_tick("test", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(TickSummary::default())
        })
        .await;
        assert!(timed_out.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_periodic_keeps_ticking_after_failures() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = tokio::spawn(run_periodic(
            "test",
            Duration::from_secs(10),
            Duration::from_secs(5),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    match counter.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(OperatorError::Persistence("store down".to_string())),
                        1 => panic!("boom"),
                        _ => Ok(TickSummary::default()),
                    }
                }
            },
        ));

        tokio::time::sleep(Duration::from_secs(35)).await;
        handle.abort();

        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }
}
