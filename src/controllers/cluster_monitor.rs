//! Cluster-wide usage monitor
//!
//! Alerts the cluster administrator when enough nodes run at or above the
//! configured usage percentage. Alerts share one gate subject.

use super::{run_periodic, Controller, TickSummary};
use crate::cluster::ClusterReconciler;
use crate::config::OperatorSettings;
use crate::error::{OperatorError, Result};
use crate::notification::{dispatch, messages, NotificationGate, Notifier, CLUSTER_SUBJECT};
use crate::usage::{aggregate_cluster_usage, does_part_of_nodes_exceed};
use std::sync::Arc;
use tracing::{debug, info};

/// Periodic node usage monitor
pub struct ClusterMonitorController {
    reconciler: Arc<ClusterReconciler>,
    notifier: Arc<dyn Notifier>,
    gate: Arc<NotificationGate>,
    settings: OperatorSettings,
}

impl ClusterMonitorController {
    pub fn new(
        reconciler: Arc<ClusterReconciler>,
        notifier: Arc<dyn Notifier>,
        gate: Arc<NotificationGate>,
        settings: OperatorSettings,
    ) -> Self {
        Self {
            reconciler,
            notifier,
            gate,
            settings,
        }
    }

    /// Fetch, aggregate and alert if needed.
    ///
    /// Mismatched metrics and capacities fail the tick without alerting.
    pub async fn tick(&self) -> Result<TickSummary> {
        let metrics = self.reconciler.fetch_cluster_metrics().await?;
        let computed = aggregate_cluster_usage(&metrics.usage, &metrics.capacity)?;

        let threshold = self.settings.cluster_usage_threshold_percent;
        let mut summary = TickSummary {
            evaluated: computed.len(),
            exceeding: computed
                .iter()
                .filter(|n| n.cpu_usage_percentage >= threshold || n.memory_usage_percentage >= threshold)
                .count(),
            ..Default::default()
        };

        if !does_part_of_nodes_exceed(
            threshold,
            self.settings.cluster_node_fraction_percent,
            &computed,
        ) {
            debug!(nodes = computed.len(), exceeding = summary.exceeding, "Cluster usage within limits");
            return Ok(summary);
        }

        info!(
            nodes = computed.len(),
            exceeding = summary.exceeding,
            threshold,
            "Cluster usage over threshold"
        );
        if self
            .gate
            .try_acquire(CLUSTER_SUBJECT, self.settings.renotify_interval)
        {
            let message = messages::cluster_alert(
                &self.settings.cluster_admin_email,
                threshold,
                &computed,
                &self.settings.cc_emails,
            );
            if dispatch(self.notifier.as_ref(), &message).await {
                summary.notified += 1;
            }
        }

        Ok(summary)
    }
}

#[async_trait::async_trait]
impl Controller for ClusterMonitorController {
    async fn run(self: Arc<Self>) -> std::result::Result<(), OperatorError> {
        info!(
            interval_secs = self.settings.cluster_monitor_interval.as_secs(),
            usage_percentage = self.settings.cluster_usage_threshold_percent,
            nodes_percentage = self.settings.cluster_node_fraction_percent,
            "Starting cluster monitor"
        );
        let period = self.settings.cluster_monitor_interval;
        let deadline = self.settings.tick_deadline;
        run_periodic(self.name(), period, deadline, move || {
            let controller = Arc::clone(&self);
            async move { controller.tick().await }
        })
        .await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cluster-monitor"
    }
}
