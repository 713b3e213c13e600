//! Application Controller
//!
//! Reconciles ManagedApplication custom resources into a Namespace,
//! Deployment, Service and Ingress, and reports the outcome in status.

use super::Controller as OperatorController;
use crate::cluster::ClusterReconciler;
use crate::conditions::{
    deployed_conditions, failed_conditions, REASON_INVALID_SPEC, REASON_RECONCILED,
    REASON_RECONCILE_FAILED,
};
use crate::crd::{ApplicationCondition, ApplicationPhase, ApplicationStatus, ManagedApplication};
use crate::error::{OperatorError, Result};
use crate::repository::spec_with_id;
use chrono::Utc;
use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const REQUEUE_AFTER_SUCCESS: Duration = Duration::from_secs(300);
const REQUEUE_AFTER_ERROR: Duration = Duration::from_secs(30);

/// Whether the stored status differs from the outcome just computed.
///
/// Only phase, replicas, generation and message are compared; condition
/// timestamps alone never trigger a patch.
pub fn needs_status_update(
    current: Option<&ApplicationStatus>,
    phase: &ApplicationPhase,
    replicas: i32,
    generation: Option<i64>,
    message: Option<&str>,
) -> bool {
    match current {
        None => true,
        Some(status) => {
            status.phase != *phase
                || status.replicas != replicas
                || status.observed_generation != generation
                || status.message.as_deref() != message
        }
    }
}

/// Conditions for the given outcome. `reason` labels failures only.
pub fn status_conditions(
    previous: &[ApplicationCondition],
    phase: &ApplicationPhase,
    replicas: i32,
    reason: &str,
    message: Option<&str>,
) -> Vec<ApplicationCondition> {
    match phase {
        ApplicationPhase::Failed => {
            failed_conditions(previous, reason, message.unwrap_or("Reconciliation failed"))
        }
        _ => deployed_conditions(previous, replicas),
    }
}

/// Watches ManagedApplication objects cluster-wide
pub struct ApplicationController {
    client: Client,
    reconciler: Arc<ClusterReconciler>,
}

impl ApplicationController {
    pub fn new(client: Client, reconciler: Arc<ClusterReconciler>) -> Self {
        Self { client, reconciler }
    }

    async fn reconcile(
        &self,
        app: Arc<ManagedApplication>,
    ) -> std::result::Result<Action, OperatorError> {
        let name = app.name_any();
        let namespace = app.namespace().unwrap_or_else(|| "default".to_string());
        let spec = spec_with_id(&app);

        info!("Reconciling ManagedApplication {}/{}", namespace, name);

        if let Err(e) = spec.validate() {
            warn!("ManagedApplication {}/{} is invalid: {}", namespace, name, e);
            self.update_status(
                &app,
                &namespace,
                ApplicationPhase::Failed,
                0,
                REASON_INVALID_SPEC,
                Some(e.to_string()),
            )
            .await?;
            return Ok(Action::await_change());
        }

        match self.reconciler.reconcile(&spec).await {
            Ok(()) => {
                self.update_status(
                    &app,
                    &namespace,
                    ApplicationPhase::Deployed,
                    spec.desired_replicas(),
                    REASON_RECONCILED,
                    None,
                )
                .await?;
                Ok(Action::requeue(REQUEUE_AFTER_SUCCESS))
            }
            Err(e) => {
                error!("Failed to reconcile ManagedApplication {}/{}: {}", namespace, name, e);
                self.update_status(
                    &app,
                    &namespace,
                    ApplicationPhase::Failed,
                    app.status.as_ref().map(|s| s.replicas).unwrap_or_default(),
                    REASON_RECONCILE_FAILED,
                    Some(e.to_string()),
                )
                .await?;
                Ok(Action::requeue(REQUEUE_AFTER_ERROR))
            }
        }
    }

    async fn update_status(
        &self,
        app: &ManagedApplication,
        namespace: &str,
        phase: ApplicationPhase,
        replicas: i32,
        reason: &str,
        message: Option<String>,
    ) -> Result<()> {
        let generation = app.metadata.generation;
        if !needs_status_update(app.status.as_ref(), &phase, replicas, generation, message.as_deref()) {
            return Ok(());
        }

        let previous = app
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default();
        let conditions = status_conditions(previous, &phase, replicas, reason, message.as_deref());

        let status = ApplicationStatus {
            phase,
            replicas,
            conditions,
            observed_generation: generation,
            last_updated: Some(Utc::now().to_rfc3339()),
            message,
        };

        let apps: Api<ManagedApplication> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        apps.patch_status(&app.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| OperatorError::KubeApi(e.to_string()))?;

        Ok(())
    }
}

fn error_policy(
    app: Arc<ManagedApplication>,
    error: &OperatorError,
    _ctx: Arc<ApplicationController>,
) -> Action {
    warn!(
        "Requeueing ManagedApplication {} after error: {}",
        app.name_any(),
        error
    );
    Action::requeue(REQUEUE_AFTER_ERROR)
}

#[async_trait::async_trait]
impl OperatorController for ApplicationController {
    async fn run(self: Arc<Self>) -> std::result::Result<(), OperatorError> {
        let apps: Api<ManagedApplication> = Api::all(self.client.clone());

        info!("Starting ManagedApplication controller");

        Controller::new(apps, Config::default())
            .shutdown_on_signal()
            .run(
                |app, ctx| async move { ctx.reconcile(app).await },
                error_policy,
                Arc::clone(&self),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        info!("Reconciled application: {}", obj.name);
                    }
                    Err(e) => {
                        error!("Reconciliation failed: {:?}", e);
                    }
                }
            })
            .await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "application"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(phase: ApplicationPhase, replicas: i32, generation: Option<i64>) -> ApplicationStatus {
        ApplicationStatus {
            phase,
            replicas,
            observed_generation: generation,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_status_needs_update() {
        assert!(needs_status_update(None, &ApplicationPhase::Deployed, 2, Some(1), None));
    }

    #[test]
    fn test_unchanged_status_is_not_patched() {
        let current = status(ApplicationPhase::Deployed, 2, Some(1));
        assert!(!needs_status_update(
            Some(&current),
            &ApplicationPhase::Deployed,
            2,
            Some(1),
            None
        ));
    }

    #[test]
    fn test_changed_fields_need_update() {
        let current = status(ApplicationPhase::Deployed, 2, Some(1));
        assert!(needs_status_update(Some(&current), &ApplicationPhase::Deployed, 3, Some(1), None));
        assert!(needs_status_update(Some(&current), &ApplicationPhase::Deployed, 2, Some(2), None));
        assert!(needs_status_update(Some(&current), &ApplicationPhase::Failed, 2, Some(1), None));
        assert!(needs_status_update(
            Some(&current),
            &ApplicationPhase::Deployed,
            2,
            Some(1),
            Some("boom")
        ));
    }

    #[test]
    fn test_failure_reasons_are_distinct() {
        let invalid = status_conditions(
            &[],
            &ApplicationPhase::Failed,
            0,
            REASON_INVALID_SPEC,
            Some("port must be between 1 and 65535"),
        );
        let failed = status_conditions(
            &[],
            &ApplicationPhase::Failed,
            2,
            REASON_RECONCILE_FAILED,
            Some("service write rejected"),
        );

        assert!(invalid.iter().all(|c| c.reason.as_deref() == Some("InvalidSpec")));
        assert!(failed.iter().all(|c| c.reason.as_deref() == Some("ReconcileFailed")));
        assert_eq!(
            invalid[0].message.as_deref(),
            Some("port must be between 1 and 65535")
        );
    }

    #[test]
    fn test_deployed_conditions_ignore_failure_reason() {
        let conditions =
            status_conditions(&[], &ApplicationPhase::Deployed, 2, REASON_RECONCILED, None);
        let ready = conditions.iter().find(|c| c.r#type == "Ready").unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.reason.as_deref(), Some("Reconciled"));
    }
}
