//! Manual-scaling recommendation loop
//!
//! Same evaluation as the autoscaler, for applications that are not
//! auto-scaled. Overloaded applications get a recommendation notice on every
//! tick; nothing is mutated and nothing is rate-limited.

use super::{evaluate_applications, run_periodic, Controller, TickSummary};
use crate::cluster::ClusterReconciler;
use crate::config::OperatorSettings;
use crate::error::{OperatorError, Result};
use crate::notification::{dispatch, messages, Notifier};
use crate::repository::ApplicationRepository;
use crate::usage::UsageVerdict;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Periodic scaling adviser for manually scaled applications
pub struct ManualScalingController {
    repository: Arc<dyn ApplicationRepository>,
    reconciler: Arc<ClusterReconciler>,
    notifier: Arc<dyn Notifier>,
    settings: OperatorSettings,
}

impl ManualScalingController {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        reconciler: Arc<ClusterReconciler>,
        notifier: Arc<dyn Notifier>,
        settings: OperatorSettings,
    ) -> Self {
        Self {
            repository,
            reconciler,
            notifier,
            settings,
        }
    }

    pub async fn tick(&self) -> Result<TickSummary> {
        let applications = self.repository.find_manual_scaling_applications().await?;
        let mut summary = TickSummary::default();
        if applications.is_empty() {
            debug!("No manually scaled applications");
            return Ok(summary);
        }

        let requested = applications.len();
        let evaluations = evaluate_applications(&self.reconciler, applications).await;
        summary.evaluated = requested;
        summary.failed = requested - evaluations.len();

        for evaluation in evaluations {
            let application = evaluation.application;
            let verdicts = match evaluation.verdicts {
                Ok(verdicts) => verdicts,
                Err(e) => {
                    warn!(
                        app = %application.name,
                        namespace = %application.namespace_name,
                        "Skipping application, metrics unavailable: {}",
                        e
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            let exceeding: Vec<&UsageVerdict> = verdicts.iter().filter(|v| v.exceeds()).collect();
            if exceeding.is_empty() {
                continue;
            }
            summary.exceeding += exceeding.len();

            info!(
                app = %application.name,
                namespace = %application.namespace_name,
                pods = exceeding.len(),
                "Recommending manual scale-up"
            );
            let message =
                messages::manual_recommendation(&application, &exceeding, &self.settings.cc_emails);
            if dispatch(self.notifier.as_ref(), &message).await {
                summary.notified += 1;
            }
        }

        Ok(summary)
    }
}

#[async_trait::async_trait]
impl Controller for ManualScalingController {
    async fn run(self: Arc<Self>) -> std::result::Result<(), OperatorError> {
        info!(
            interval_secs = self.settings.manual_scaling_interval.as_secs(),
            "Starting manual scaling controller"
        );
        let period = self.settings.manual_scaling_interval;
        let deadline = self.settings.tick_deadline;
        run_periodic(self.name(), period, deadline, move || {
            let controller = Arc::clone(&self);
            async move { controller.tick().await }
        })
        .await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "manual-scaling"
    }
}
