//! Cluster access
//!
//! `ClusterApi` is the narrow set of Kubernetes calls the operator makes.
//! `KubeClusterApi` backs it with a live client; the reconciler only talks to
//! the trait.

mod kube_api;
mod reconciler;

pub use kube_api::KubeClusterApi;
pub use reconciler::ClusterReconciler;

use crate::error::Result;
use crate::metrics::{NodeMetrics, PodMetrics};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Service};
use k8s_openapi::api::networking::v1::Ingress;

/// Object CRUD and metrics listing against a Kubernetes cluster
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Namespace>;
    async fn create_namespace(&self, namespace: &Namespace) -> Result<()>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment>;
    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()>;
    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<()>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()>;
    async fn replace_service(&self, namespace: &str, name: &str, service: &Service) -> Result<()>;

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress>;
    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<()>;
    async fn replace_ingress(&self, namespace: &str, name: &str, ingress: &Ingress) -> Result<()>;

    /// Pod metrics for every pod in `namespace`
    async fn list_pod_metrics(&self, namespace: &str) -> Result<Vec<PodMetrics>>;
    /// Node metrics for every node in the cluster
    async fn list_node_metrics(&self) -> Result<Vec<NodeMetrics>>;
    /// Every node in the cluster, used for capacities
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}
