//! Operator settings
//!
//! Loop intervals, thresholds and notification targets shared by the control
//! loops. Built once at startup and validated before anything runs.

use crate::error::{OperatorError, Result};
use crate::notification::DEFAULT_RENOTIFY_INTERVAL;
use std::time::Duration;

/// Settings for the periodic control loops
#[derive(Debug, Clone)]
pub struct OperatorSettings {
    /// Autoscale loop period
    pub autoscale_interval: Duration,
    /// Manual-scaling recommendation loop period
    pub manual_scaling_interval: Duration,
    /// Cluster usage monitor period
    pub cluster_monitor_interval: Duration,
    /// Node usage percentage at or above which a node counts as exceeding
    pub cluster_usage_threshold_percent: f64,
    /// Percentage of nodes that must exceed before the cluster alert fires
    pub cluster_node_fraction_percent: f64,
    /// Global replica ceiling
    pub max_replicas: i32,
    /// Minimum time between two gated notifications for the same subject
    pub renotify_interval: Duration,
    /// Upper bound on a single tick
    pub tick_deadline: Duration,
    /// Suffix appended to every ingress host
    pub domain_suffix: String,
    /// Ingress class written to every Ingress
    pub ingress_class: Option<String>,
    /// Recipient of cluster-wide alerts
    pub cluster_admin_email: String,
    /// Copied on every notification
    pub cc_emails: Vec<String>,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            autoscale_interval: Duration::from_secs(60),
            manual_scaling_interval: Duration::from_secs(300),
            cluster_monitor_interval: Duration::from_secs(300),
            cluster_usage_threshold_percent: 80.0,
            cluster_node_fraction_percent: 50.0,
            max_replicas: 5,
            renotify_interval: DEFAULT_RENOTIFY_INTERVAL,
            tick_deadline: Duration::from_secs(120),
            domain_suffix: "apps.local".to_string(),
            ingress_class: None,
            cluster_admin_email: String::new(),
            cc_emails: Vec::new(),
        }
    }
}

fn check_percentage(label: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(OperatorError::Configuration(format!(
            "{} must be within 0-100, got {}",
            label, value
        )));
    }
    Ok(())
}

impl OperatorSettings {
    /// Reject settings no loop can run with.
    pub fn validate(&self) -> Result<()> {
        for (label, interval) in [
            ("autoscale interval", self.autoscale_interval),
            ("manual scaling interval", self.manual_scaling_interval),
            ("cluster monitor interval", self.cluster_monitor_interval),
            ("tick deadline", self.tick_deadline),
        ] {
            if interval.is_zero() {
                return Err(OperatorError::Configuration(format!(
                    "{} must be greater than zero",
                    label
                )));
            }
        }

        check_percentage("cluster usage percentage", self.cluster_usage_threshold_percent)?;
        check_percentage("cluster nodes percentage", self.cluster_node_fraction_percent)?;

        if self.max_replicas < 1 {
            return Err(OperatorError::Configuration(format!(
                "max number of replicas must be at least 1, got {}",
                self.max_replicas
            )));
        }
        if self.domain_suffix.trim().is_empty() {
            return Err(OperatorError::Configuration(
                "ingress domain must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Split a comma-separated address list, dropping blanks
    pub fn parse_cc(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
