//! `ClusterApi` over a live Kubernetes client

use super::ClusterApi;
use crate::error::{OperatorError, Result};
use crate::metrics::{NodeMetrics, PodMetrics};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;
use tracing::debug;

/// Cluster access through `kube::Api`
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn kube_err(e: kube::Error) -> OperatorError {
    OperatorError::KubeApi(e.to_string())
}

#[async_trait::async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.get(name).await.map_err(kube_err)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .create(&PostParams::default(), namespace)
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        self.namespaced::<Deployment>(namespace)
            .get(name)
            .await
            .map_err(kube_err)
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()> {
        self.namespaced::<Deployment>(namespace)
            .create(&PostParams::default(), deployment)
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<()> {
        self.namespaced::<Deployment>(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        self.namespaced::<Service>(namespace)
            .get(name)
            .await
            .map_err(kube_err)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()> {
        self.namespaced::<Service>(namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn replace_service(&self, namespace: &str, name: &str, service: &Service) -> Result<()> {
        self.namespaced::<Service>(namespace)
            .replace(name, &PostParams::default(), service)
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress> {
        self.namespaced::<Ingress>(namespace)
            .get(name)
            .await
            .map_err(kube_err)
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<()> {
        self.namespaced::<Ingress>(namespace)
            .create(&PostParams::default(), ingress)
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn replace_ingress(&self, namespace: &str, name: &str, ingress: &Ingress) -> Result<()> {
        self.namespaced::<Ingress>(namespace)
            .replace(name, &PostParams::default(), ingress)
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn list_pod_metrics(&self, namespace: &str) -> Result<Vec<PodMetrics>> {
        let list = self
            .namespaced::<PodMetrics>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(kube_err)?;
        debug!(namespace = %namespace, pods = list.items.len(), "Listed pod metrics");
        Ok(list.items)
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetrics>> {
        let metrics: Api<NodeMetrics> = Api::all(self.client.clone());
        let list = metrics.list(&ListParams::default()).await.map_err(kube_err)?;
        Ok(list.items)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&ListParams::default()).await.map_err(kube_err)?;
        Ok(list.items)
    }
}
