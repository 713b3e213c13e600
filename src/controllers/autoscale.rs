//! Autoscale Controller
//!
//! Scales auto-scaled applications up by one replica for every pod running
//! over its CPU or memory threshold, up to the global replica ceiling. Scale-ups are
//! always notified; "cannot scale" notices go through the notification gate.

use super::{evaluate_applications, run_periodic, Controller, TickSummary};
use crate::cluster::ClusterReconciler;
use crate::config::OperatorSettings;
use crate::crd::ApplicationSpec;
use crate::error::{OperatorError, Result};
use crate::notification::{dispatch, messages, NotificationGate, Notifier};
use crate::repository::ApplicationRepository;
use crate::usage::UsageVerdict;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Periodic horizontal scaler for auto-scaled applications
pub struct AutoscaleController {
    repository: Arc<dyn ApplicationRepository>,
    reconciler: Arc<ClusterReconciler>,
    notifier: Arc<dyn Notifier>,
    gate: Arc<NotificationGate>,
    settings: OperatorSettings,
}

impl AutoscaleController {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        reconciler: Arc<ClusterReconciler>,
        notifier: Arc<dyn Notifier>,
        gate: Arc<NotificationGate>,
        settings: OperatorSettings,
    ) -> Self {
        Self {
            repository,
            reconciler,
            notifier,
            gate,
            settings,
        }
    }

    /// Run one evaluate-decide-act pass over every auto-scaled application.
    pub async fn tick(&self) -> Result<TickSummary> {
        let applications = self.repository.find_auto_scaling_applications().await?;
        let mut summary = TickSummary::default();
        if applications.is_empty() {
            debug!("No auto-scaled applications");
            return Ok(summary);
        }

        let requested = applications.len();
        let evaluations = evaluate_applications(&self.reconciler, applications).await;
        summary.evaluated = requested;
        summary.failed = requested - evaluations.len();

        for evaluation in evaluations {
            let verdicts = match evaluation.verdicts {
                Ok(verdicts) => verdicts,
                Err(e) => {
                    warn!(
                        app = %evaluation.application.name,
                        namespace = %evaluation.application.namespace_name,
                        "Skipping application, metrics unavailable: {}",
                        e
                    );
                    summary.failed += 1;
                    continue;
                }
            };
            self.act(evaluation.application, &verdicts, &mut summary).await;
        }

        Ok(summary)
    }

    async fn act(
        &self,
        mut application: ApplicationSpec,
        verdicts: &[UsageVerdict],
        summary: &mut TickSummary,
    ) {
        for verdict in verdicts.iter().filter(|v| v.exceeds()) {
            summary.exceeding += 1;
            let ceiling = self.settings.max_replicas;

            if application.scalability_spec.replicas >= ceiling {
                info!(
                    app = %application.name,
                    replicas = application.scalability_spec.replicas,
                    ceiling,
                    "Application at replica ceiling"
                );
                if self
                    .gate
                    .try_acquire(&application.id, self.settings.renotify_interval)
                {
                    let message = messages::cannot_scale(
                        &application,
                        verdict,
                        ceiling,
                        &self.settings.cc_emails,
                    );
                    if dispatch(self.notifier.as_ref(), &message).await {
                        summary.notified += 1;
                    }
                }
                continue;
            }

            let previous = application.scalability_spec.replicas;
            match self.repository.horizontal_scale_up(&application.id).await {
                Ok(updated) => {
                    summary.scaled += 1;
                    application = updated;
                    info!(
                        app = %application.name,
                        namespace = %application.namespace_name,
                        pod = %verdict.pod_name,
                        from = previous,
                        to = application.scalability_spec.replicas,
                        "Scaled up"
                    );
                    let message = messages::scaled_up(
                        &application,
                        verdict,
                        previous,
                        &self.settings.cc_emails,
                    );
                    if dispatch(self.notifier.as_ref(), &message).await {
                        summary.notified += 1;
                    }
                }
                Err(e) => {
                    warn!(app = %application.name, "Scale-up failed: {}", e);
                    return;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Controller for AutoscaleController {
    async fn run(self: Arc<Self>) -> std::result::Result<(), OperatorError> {
        info!(
            interval_secs = self.settings.autoscale_interval.as_secs(),
            max_replicas = self.settings.max_replicas,
            "Starting autoscale controller"
        );
        let period = self.settings.autoscale_interval;
        let deadline = self.settings.tick_deadline;
        run_periodic(self.name(), period, deadline, move || {
            let controller = Arc::clone(&self);
            async move { controller.tick().await }
        })
        .await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "autoscale"
    }
}

