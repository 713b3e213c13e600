//! Resource metrics
//!
//! Typed `metrics.k8s.io/v1beta1` resources served by metrics-server, plus the
//! flattened samples the control loops work with. Samples are fetched fresh on
//! every tick and never stored.

use std::borrow::Cow;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::{Deserialize, Serialize};

use crate::units::{normalize_byte_quantity, normalize_cpu_quantity};

/// CPU and memory quantities reported by metrics-server
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UsageList {
    #[serde(default)]
    pub cpu: Quantity,
    #[serde(default)]
    pub memory: Quantity,
}

/// Usage of a single container
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    pub usage: UsageList,
}

/// Metrics for a single node
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetrics {
    pub metadata: ObjectMeta,
    pub timestamp: Option<String>,
    pub window: Option<String>,
    pub usage: UsageList,
}

impl Resource for NodeMetrics {
    type DynamicType = ();
    type Scope = kube::core::ClusterResourceScope;

    fn kind(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("NodeMetrics")
    }

    fn group(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("metrics.k8s.io")
    }

    fn version(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("v1beta1")
    }

    fn plural(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("nodes")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Metrics for a single pod
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    pub timestamp: Option<String>,
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

impl Resource for PodMetrics {
    type DynamicType = ();
    type Scope = kube::core::NamespaceResourceScope;

    fn kind(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("PodMetrics")
    }

    fn group(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("metrics.k8s.io")
    }

    fn version(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("v1beta1")
    }

    fn plural(_: &Self::DynamicType) -> Cow<'static, str> {
        Cow::Borrowed("pods")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Raw usage of one container in one pod, in native cluster notation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub pod_name: String,
    pub container_name: String,
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub ephemeral_storage: String,
}

/// Raw usage of one node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub name: String,
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub ephemeral_storage: String,
}

/// Raw capacity of one node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub name: String,
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub ephemeral_storage: String,
}

/// Node usage and node capacity lists as fetched in one tick.
///
/// The two lists are not co-sorted; pairing happens by node name.
#[derive(Clone, Debug, Default)]
pub struct ClusterMetrics {
    pub usage: Vec<NodeUsage>,
    pub capacity: Vec<NodeCapacity>,
}

impl PodMetrics {
    /// Flatten every container of this pod into a usage sample.
    ///
    /// Bare core counts and byte counts get explicit units.
    pub fn samples(&self) -> Vec<UsageSample> {
        let pod_name = self.metadata.name.clone().unwrap_or_default();
        self.containers
            .iter()
            .map(|c| UsageSample {
                pod_name: pod_name.clone(),
                container_name: c.name.clone(),
                cpu: normalize_cpu_quantity(&c.usage.cpu.0),
                memory: normalize_byte_quantity(&c.usage.memory.0),
                storage: String::new(),
                ephemeral_storage: String::new(),
            })
            .collect()
    }
}
