//! Usage evaluation
//!
//! Decides whether observed usage exceeds a configured threshold, per pod for
//! applications and per node for the cluster as a whole.
//!
//! Two comparison rules coexist on purpose:
//! - per application, usage must be strictly greater than the threshold;
//! - per node, usage greater than or equal to the threshold counts.

use crate::crd::ApplicationSpec;
use crate::error::{OperatorError, Result};
use crate::metrics::{NodeCapacity, NodeUsage, UsageSample};
use crate::units::{to_comparable, to_human_readable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of comparing one resource dimension against its limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub exceeds_threshold: bool,
    pub actual_usage_percentage: f64,
}

/// Outcome of comparing one pod's usage to its application's thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageVerdict {
    pub pod_name: String,
    pub container_name: String,
    pub cpu_usage: String,
    pub memory_usage: String,
    pub cpu: ComparisonResult,
    pub memory: ComparisonResult,
}

impl UsageVerdict {
    /// True when either CPU or memory is over its threshold
    pub fn exceeds(&self) -> bool {
        self.cpu.exceeds_threshold || self.memory.exceeds_threshold
    }
}

/// Per-node usage as a percentage of capacity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeComputedUsage {
    pub name: String,
    pub cpu_usage: String,
    pub cpu_capacity: String,
    pub memory_usage: String,
    pub memory_capacity: String,
    pub cpu_usage_percentage: f64,
    pub memory_usage_percentage: f64,
    pub storage_usage_percentage: f64,
    pub ephemeral_storage_usage_percentage: f64,
}

/// A limit that converts to zero means no usable limit, which never exceeds.
fn has_usable_limit(limit: f64) -> bool {
    limit != 0.0
}

/// Compare `usage_raw` against `limit_raw`, both in native cluster notation.
///
/// Returns `(exceeds, actual_percentage)`. Equality with `accepted_percentage`
/// does not exceed.
pub fn evaluate(usage_raw: &str, limit_raw: &str, accepted_percentage: f64) -> (bool, f64) {
    let limit = to_comparable(limit_raw);
    if !has_usable_limit(limit) {
        return (false, 0.0);
    }
    let usage = to_comparable(usage_raw);
    let actual = usage / limit * 100.0;
    (actual > accepted_percentage, actual)
}

fn compare(usage_raw: &str, limit_raw: &str, accepted_percentage: f64) -> ComparisonResult {
    let (exceeds_threshold, actual_usage_percentage) =
        evaluate(usage_raw, limit_raw, accepted_percentage);
    ComparisonResult {
        exceeds_threshold,
        actual_usage_percentage,
    }
}

/// Evaluate one container sample against the application's limits and thresholds.
pub fn evaluate_sample(sample: &UsageSample, app: &ApplicationSpec) -> UsageVerdict {
    let limits = &app.container_spec;
    let thresholds = &app.scalability_spec;
    UsageVerdict {
        pod_name: sample.pod_name.clone(),
        container_name: sample.container_name.clone(),
        cpu_usage: sample.cpu.clone(),
        memory_usage: sample.memory.clone(),
        cpu: compare(
            &sample.cpu,
            &limits.cpu_limit.to_quantity(),
            thresholds.cpu_usage_percentage_threshold,
        ),
        memory: compare(
            &sample.memory,
            &limits.memory_limit.to_quantity(),
            thresholds.memory_usage_percentage_threshold,
        ),
    }
}

fn percentage(usage_raw: &str, capacity_raw: &str) -> f64 {
    let capacity = to_comparable(capacity_raw);
    if capacity == 0.0 {
        return 0.0;
    }
    to_comparable(usage_raw) / capacity * 100.0
}

/// Pair node usage with node capacity by name and compute usage percentages.
///
/// Both lists must have the same length; otherwise nothing is computed.
pub fn aggregate_cluster_usage(
    node_metrics: &[NodeUsage],
    node_capacities: &[NodeCapacity],
) -> Result<Vec<NodeComputedUsage>> {
    if node_metrics.len() != node_capacities.len() {
        return Err(OperatorError::MetricsMismatch {
            metrics: node_metrics.len(),
            capacities: node_capacities.len(),
        });
    }

    let capacities: HashMap<&str, &NodeCapacity> = node_capacities
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect();

    let computed = node_metrics
        .iter()
        .filter_map(|usage| {
            let capacity = capacities.get(usage.name.as_str())?;
            Some(NodeComputedUsage {
                name: usage.name.clone(),
                cpu_usage: to_human_readable(&usage.cpu),
                cpu_capacity: to_human_readable(&capacity.cpu),
                memory_usage: to_human_readable(&usage.memory),
                memory_capacity: to_human_readable(&capacity.memory),
                cpu_usage_percentage: percentage(&usage.cpu, &capacity.cpu),
                memory_usage_percentage: percentage(&usage.memory, &capacity.memory),
                storage_usage_percentage: percentage(&usage.storage, &capacity.storage),
                ephemeral_storage_usage_percentage: percentage(
                    &usage.ephemeral_storage,
                    &capacity.ephemeral_storage,
                ),
            })
        })
        .collect();

    Ok(computed)
}

/// Number of nodes that must exceed before the cluster counts as overloaded.
pub fn required_exceeding_nodes(node_count: usize, nodes_percentage_that_must_exceed: f64) -> usize {
    let required = (node_count as f64 * nodes_percentage_that_must_exceed / 100.0).floor();
    (required.max(0.0) as usize).max(1)
}

/// True when at least the required share of nodes runs at or above
/// `accepted_usage_percentage` on CPU or memory.
pub fn does_part_of_nodes_exceed(
    accepted_usage_percentage: f64,
    nodes_percentage_that_must_exceed: f64,
    computed: &[NodeComputedUsage],
) -> bool {
    let required = required_exceeding_nodes(computed.len(), nodes_percentage_that_must_exceed);
    let exceeding = computed
        .iter()
        .filter(|n| {
            n.cpu_usage_percentage >= accepted_usage_percentage
                || n.memory_usage_percentage >= accepted_usage_percentage
        })
        .count();
    exceeding >= required
}
