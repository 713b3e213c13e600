//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use appfleet_operator::cluster::ClusterApi;
use appfleet_operator::crd::{
    ApplicationSpec, ApplicationType, ContainerSpec, ResourceLimit, ScalabilitySpec,
};
use appfleet_operator::error::{OperatorError, Result};
use appfleet_operator::metrics::{ContainerMetrics, NodeMetrics, PodMetrics, UsageList};
use appfleet_operator::notification::{EmailMessage, Notifier};
use appfleet_operator::repository::ApplicationRepository;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, NodeStatus, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: &str, namespace: &str, name: &str) -> OperatorError {
    OperatorError::NotFound(format!("{} {}/{}", kind, namespace, name))
}

#[derive(Default)]
pub struct ClusterState {
    pub namespaces: BTreeMap<String, Namespace>,
    pub deployments: BTreeMap<Key, Deployment>,
    pub services: BTreeMap<Key, Service>,
    pub ingresses: BTreeMap<Key, Ingress>,
    pub pod_metrics: BTreeMap<String, Vec<PodMetrics>>,
    pub node_metrics: Vec<NodeMetrics>,
    pub nodes: Vec<Node>,
    pub creates: usize,
    pub replaces: usize,
    /// Object kinds whose create and replace calls fail
    pub failing_kinds: BTreeSet<&'static str>,
    /// Namespaces whose pod metrics listing fails
    pub failing_metrics: BTreeSet<String>,
    /// Namespaces whose pod metrics listing panics
    pub panicking_metrics: BTreeSet<String>,
}

/// `ClusterApi` backed by in-memory maps
#[derive(Default)]
pub struct FakeClusterApi {
    pub state: Mutex<ClusterState>,
}

impl FakeClusterApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut ClusterState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn write(&self, kind: &'static str, replace: bool) -> Result<std::sync::MutexGuard<'_, ClusterState>> {
        let mut state = self.state.lock().unwrap();
        if state.failing_kinds.contains(kind) {
            return Err(OperatorError::KubeApi(format!("{} write rejected", kind)));
        }
        if replace {
            state.replaces += 1;
        } else {
            state.creates += 1;
        }
        Ok(state)
    }
}

#[async_trait::async_trait]
impl ClusterApi for FakeClusterApi {
    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        let state = self.state.lock().unwrap();
        state
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("Namespace", "", name))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<()> {
        let mut state = self.write("namespace", false)?;
        let name = namespace.metadata.name.clone().unwrap_or_default();
        state.namespaces.insert(name, namespace.clone());
        Ok(())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        let state = self.state.lock().unwrap();
        state
            .deployments
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Deployment", namespace, name))
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()> {
        let mut state = self.write("deployment", false)?;
        let name = deployment.metadata.name.clone().unwrap_or_default();
        state.deployments.insert(key(namespace, &name), deployment.clone());
        Ok(())
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<()> {
        let mut state = self.write("deployment", true)?;
        state.deployments.insert(key(namespace, name), deployment.clone());
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        let state = self.state.lock().unwrap();
        state
            .services
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Service", namespace, name))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()> {
        let mut state = self.write("service", false)?;
        let name = service.metadata.name.clone().unwrap_or_default();
        state.services.insert(key(namespace, &name), service.clone());
        Ok(())
    }

    async fn replace_service(&self, namespace: &str, name: &str, service: &Service) -> Result<()> {
        let mut state = self.write("service", true)?;
        state.services.insert(key(namespace, name), service.clone());
        Ok(())
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress> {
        let state = self.state.lock().unwrap();
        state
            .ingresses
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Ingress", namespace, name))
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<()> {
        let mut state = self.write("ingress", false)?;
        let name = ingress.metadata.name.clone().unwrap_or_default();
        state.ingresses.insert(key(namespace, &name), ingress.clone());
        Ok(())
    }

    async fn replace_ingress(&self, namespace: &str, name: &str, ingress: &Ingress) -> Result<()> {
        let mut state = self.write("ingress", true)?;
        state.ingresses.insert(key(namespace, name), ingress.clone());
        Ok(())
    }

    async fn list_pod_metrics(&self, namespace: &str) -> Result<Vec<PodMetrics>> {
        let (fail, panic, pods) = {
            let state = self.state.lock().unwrap();
            (
                state.failing_metrics.contains(namespace),
                state.panicking_metrics.contains(namespace),
                state.pod_metrics.get(namespace).cloned().unwrap_or_default(),
            )
        };
        if panic {
            panic!("metrics backend crashed for {}", namespace);
        }
        if fail {
            return Err(OperatorError::KubeApi(format!(
                "metrics unavailable for {}",
                namespace
            )));
        }
        Ok(pods)
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetrics>> {
        Ok(self.state.lock().unwrap().node_metrics.clone())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.state.lock().unwrap().nodes.clone())
    }
}

/// Application store backed by a vector
#[derive(Default)]
pub struct FakeRepository {
    pub applications: Mutex<Vec<ApplicationSpec>>,
    pub scale_calls: Mutex<Vec<String>>,
    pub fail_listing: Mutex<bool>,
}

impl FakeRepository {
    pub fn with(applications: Vec<ApplicationSpec>) -> Self {
        Self {
            applications: Mutex::new(applications),
            ..Default::default()
        }
    }

    pub fn replicas(&self, id: &str) -> Option<i32> {
        self.applications
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.scalability_spec.replicas)
    }

    fn find(&self, auto_scaled: bool) -> Result<Vec<ApplicationSpec>> {
        if *self.fail_listing.lock().unwrap() {
            return Err(OperatorError::Persistence("store unavailable".to_string()));
        }
        Ok(self
            .applications
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.scalability_spec.is_auto_scaled == auto_scaled)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ApplicationRepository for FakeRepository {
    async fn find_auto_scaling_applications(&self) -> Result<Vec<ApplicationSpec>> {
        self.find(true)
    }

    async fn find_manual_scaling_applications(&self) -> Result<Vec<ApplicationSpec>> {
        self.find(false)
    }

    async fn horizontal_scale_up(&self, application_id: &str) -> Result<ApplicationSpec> {
        self.scale_calls
            .lock()
            .unwrap()
            .push(application_id.to_string());
        let mut applications = self.applications.lock().unwrap();
        let app = applications
            .iter_mut()
            .find(|a| a.id == application_id)
            .ok_or_else(|| OperatorError::NotFound(application_id.to_string()))?;
        app.scalability_spec.replicas += 1;
        Ok(app.clone())
    }
}

/// Notifier that keeps every message it is given
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// A valid auto-scaled application: 1000m CPU limit, 50% CPU threshold
pub fn application(id: &str, name: &str, namespace: &str, replicas: i32) -> ApplicationSpec {
    ApplicationSpec {
        id: id.to_string(),
        name: name.to_string(),
        namespace_id: format!("{}-id", namespace),
        namespace_name: namespace.to_string(),
        image: "nginx:1.27".to_string(),
        port: 8080,
        application_type: ApplicationType::LoadBalanced,
        container_spec: ContainerSpec {
            cpu_limit: ResourceLimit::new(1000, "m"),
            memory_limit: ResourceLimit::new(512, "Mi"),
        },
        scalability_spec: ScalabilitySpec {
            minimum_instance_count: 1,
            maximum_instance_count: 4,
            replicas,
            is_auto_scaled: true,
            cpu_usage_percentage_threshold: 50.0,
            memory_usage_percentage_threshold: 80.0,
        },
        administrator_email: "owner@example.com".to_string(),
    }
}

pub fn pod_metrics(pod: &str, container: &str, cpu: &str, memory: &str) -> PodMetrics {
    PodMetrics {
        metadata: ObjectMeta {
            name: Some(pod.to_string()),
            ..Default::default()
        },
        containers: vec![ContainerMetrics {
            name: container.to_string(),
            usage: UsageList {
                cpu: Quantity(cpu.to_string()),
                memory: Quantity(memory.to_string()),
            },
        }],
        ..Default::default()
    }
}

pub fn node_metrics(name: &str, cpu: &str, memory: &str) -> NodeMetrics {
    NodeMetrics {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        usage: UsageList {
            cpu: Quantity(cpu.to_string()),
            memory: Quantity(memory.to_string()),
        },
        ..Default::default()
    }
}

pub fn node(name: &str, cpu: &str, memory: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            capacity: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(memory.to_string())),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    }
}
