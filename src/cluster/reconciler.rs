//! Cluster Reconciler
//!
//! Applies an application's desired spec to the cluster as a Namespace,
//! Deployment, Service and Ingress, and fetches the usage metrics the control
//! loops evaluate.
//!
//! Every step is get-then-create-or-update: an existing object is replaced
//! wholesale by the freshly built one, a missing one is created. Running the
//! same spec twice converges on the same objects. A failing step aborts the
//! reconcile; earlier steps stay applied.

use super::ClusterApi;
use crate::crd::{ApplicationSpec, ApplicationType};
use crate::error::Result;
use crate::metrics::{ClusterMetrics, NodeCapacity, NodeUsage, UsageSample};
use crate::units::{normalize_byte_quantity, normalize_cpu_quantity};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Namespace, Node, PodSpec, PodTemplateSpec, ResourceRequirements,
    Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Port every application Service listens on
pub const SERVICE_PORT: i32 = 80;

const MANAGED_BY: &str = "appfleet-operator";

/// Reconciles applications into cluster objects
pub struct ClusterReconciler {
    api: Arc<dyn ClusterApi>,
    domain_suffix: String,
    ingress_class: Option<String>,
}

impl ClusterReconciler {
    /// Create a new reconciler routing ingress hosts under `domain_suffix`
    pub fn new(api: Arc<dyn ClusterApi>, domain_suffix: impl Into<String>) -> Self {
        Self {
            api,
            domain_suffix: domain_suffix.into(),
            ingress_class: None,
        }
    }

    /// Set the ingress class written to every Ingress
    pub fn with_ingress_class(mut self, ingress_class: Option<String>) -> Self {
        self.ingress_class = ingress_class;
        self
    }

    /// Bring the namespace, deployment, service and ingress in line with `spec`.
    pub async fn reconcile(&self, spec: &ApplicationSpec) -> Result<()> {
        info!(
            app = %spec.name,
            namespace = %spec.namespace_name,
            "Reconciling application"
        );

        self.ensure_namespace(&spec.namespace_name).await?;
        self.reconcile_deployment(spec).await?;
        self.reconcile_service(spec).await?;
        self.reconcile_ingress(spec).await?;

        Ok(())
    }

    async fn ensure_namespace(&self, name: &str) -> Result<()> {
        // A failed lookup is treated as absence, including transient errors.
        if self.api.get_namespace(name).await.is_ok() {
            return Ok(());
        }

        info!("Creating namespace {}", name);
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([(
                    "app.kubernetes.io/managed-by".to_string(),
                    MANAGED_BY.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        };
        self.api.create_namespace(&namespace).await
    }

    async fn reconcile_deployment(&self, spec: &ApplicationSpec) -> Result<()> {
        let name = spec.deployment_name();
        let namespace = &spec.namespace_name;
        let deployment = build_deployment(spec);

        match self.api.get_deployment(namespace, &name).await {
            Ok(_existing) => {
                info!("Updating Deployment {} in namespace {}", name, namespace);
                self.api
                    .replace_deployment(namespace, &name, &deployment)
                    .await?;
            }
            Err(_) => {
                info!("Creating Deployment {} in namespace {}", name, namespace);
                self.api.create_deployment(namespace, &deployment).await?;
            }
        }
        Ok(())
    }

    async fn reconcile_service(&self, spec: &ApplicationSpec) -> Result<()> {
        let name = spec.service_name();
        let namespace = &spec.namespace_name;
        let service = build_service(spec);

        match self.api.get_service(namespace, &name).await {
            Ok(_existing) => {
                info!("Updating Service {} in namespace {}", name, namespace);
                self.api.replace_service(namespace, &name, &service).await?;
            }
            Err(_) => {
                info!("Creating Service {} in namespace {}", name, namespace);
                self.api.create_service(namespace, &service).await?;
            }
        }
        Ok(())
    }

    async fn reconcile_ingress(&self, spec: &ApplicationSpec) -> Result<()> {
        let name = spec.ingress_name();
        let namespace = &spec.namespace_name;
        let ingress = build_ingress(spec, &self.domain_suffix, self.ingress_class.as_deref());

        match self.api.get_ingress(namespace, &name).await {
            Ok(_existing) => {
                info!("Updating Ingress {} in namespace {}", name, namespace);
                self.api.replace_ingress(namespace, &name, &ingress).await?;
            }
            Err(_) => {
                info!("Creating Ingress {} in namespace {}", name, namespace);
                self.api.create_ingress(namespace, &ingress).await?;
            }
        }
        Ok(())
    }

    /// Per-container usage of the application's pods.
    ///
    /// Pods are matched by the `{app}-deployment` name prefix; no match yields
    /// an empty list.
    pub async fn fetch_application_metrics(
        &self,
        namespace: &str,
        app_name: &str,
    ) -> Result<Vec<UsageSample>> {
        let prefix = format!("{}-deployment", app_name);
        let pods = self.api.list_pod_metrics(namespace).await?;

        let samples: Vec<UsageSample> = pods
            .iter()
            .filter(|pod| {
                pod.metadata
                    .name
                    .as_deref()
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .flat_map(|pod| pod.samples())
            .collect();

        debug!(
            app = %app_name,
            namespace = %namespace,
            samples = samples.len(),
            "Fetched application metrics"
        );
        Ok(samples)
    }

    /// Node usage and node capacities across the cluster.
    pub async fn fetch_cluster_metrics(&self) -> Result<ClusterMetrics> {
        let node_metrics = self.api.list_node_metrics().await?;
        let nodes = self.api.list_nodes().await?;

        let usage = node_metrics
            .iter()
            .map(|m| NodeUsage {
                name: m.metadata.name.clone().unwrap_or_default(),
                cpu: normalize_cpu_quantity(&m.usage.cpu.0),
                memory: normalize_byte_quantity(&m.usage.memory.0),
                storage: String::new(),
                ephemeral_storage: String::new(),
            })
            .collect();

        let capacity = nodes.iter().map(node_capacity).collect();

        Ok(ClusterMetrics { usage, capacity })
    }
}

fn node_capacity(node: &Node) -> NodeCapacity {
    let capacity = node.status.as_ref().and_then(|s| s.capacity.as_ref());
    let read = |key: &str| {
        capacity
            .and_then(|c| c.get(key))
            .map(|q| q.0.clone())
            .unwrap_or_default()
    };
    NodeCapacity {
        name: node.metadata.name.clone().unwrap_or_default(),
        cpu: normalize_cpu_quantity(&read("cpu")),
        memory: normalize_byte_quantity(&read("memory")),
        storage: normalize_byte_quantity(&read("storage")),
        ephemeral_storage: normalize_byte_quantity(&read("ephemeral-storage")),
    }
}

fn pod_selector(spec: &ApplicationSpec) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), spec.deployment_name())])
}

fn common_labels(spec: &ApplicationSpec) -> BTreeMap<String, String> {
    let mut labels = pod_selector(spec);
    labels.insert("app.kubernetes.io/name".to_string(), spec.name.clone());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels
}

/// Build the Deployment for `spec`.
pub fn build_deployment(spec: &ApplicationSpec) -> Deployment {
    let selector = pod_selector(spec);

    let requests = BTreeMap::from([
        (
            "cpu".to_string(),
            Quantity(spec.container_spec.cpu_limit.to_quantity()),
        ),
        (
            "memory".to_string(),
            Quantity(spec.container_spec.memory_limit.to_quantity()),
        ),
    ]);

    let container = Container {
        name: spec.name.clone(),
        image: Some(spec.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: spec.port,
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements {
            requests: Some(requests),
            ..Default::default()
        }),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(spec.deployment_name()),
            namespace: Some(spec.namespace_name.clone()),
            labels: Some(common_labels(spec)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(spec.desired_replicas()),
            selector: LabelSelector {
                match_labels: Some(selector.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the Service for `spec`.
pub fn build_service(spec: &ApplicationSpec) -> Service {
    let service_type = match spec.application_type {
        ApplicationType::LoadBalanced => "LoadBalancer",
        ApplicationType::SingleInstance | ApplicationType::Unspecified => "ClusterIP",
    };

    Service {
        metadata: ObjectMeta {
            name: Some(spec.service_name()),
            namespace: Some(spec.namespace_name.clone()),
            labels: Some(common_labels(spec)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(pod_selector(spec)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(spec.port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Ingress host for `spec`: `{namespace}.{name}.{domain}`
pub fn ingress_host(spec: &ApplicationSpec, domain_suffix: &str) -> String {
    format!("{}.{}.{}", spec.namespace_name, spec.name, domain_suffix)
}

/// Build the Ingress for `spec`.
pub fn build_ingress(
    spec: &ApplicationSpec,
    domain_suffix: &str,
    ingress_class: Option<&str>,
) -> Ingress {
    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: spec.service_name(),
            port: Some(ServiceBackendPort {
                number: Some(SERVICE_PORT),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };

    Ingress {
        metadata: ObjectMeta {
            name: Some(spec.ingress_name()),
            namespace: Some(spec.namespace_name.clone()),
            labels: Some(common_labels(spec)),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: ingress_class.map(str::to_string),
            rules: Some(vec![IngressRule {
                host: Some(ingress_host(spec, domain_suffix)),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend,
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ContainerSpec, ResourceLimit, ScalabilitySpec};

    fn spec(application_type: ApplicationType) -> ApplicationSpec {
        ApplicationSpec {
            id: "7".to_string(),
            name: "shop".to_string(),
            namespace_id: "3".to_string(),
            namespace_name: "team-a".to_string(),
            image: "nginx:1.27".to_string(),
            port: 8080,
            application_type,
            container_spec: ContainerSpec {
                cpu_limit: ResourceLimit::new(500, "m"),
                memory_limit: ResourceLimit::new(256, "Mi"),
            },
            scalability_spec: ScalabilitySpec {
                minimum_instance_count: 1,
                maximum_instance_count: 5,
                replicas: 3,
                is_auto_scaled: true,
                cpu_usage_percentage_threshold: 70.0,
                memory_usage_percentage_threshold: 80.0,
            },
            administrator_email: "ops@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_deployment() {
        let deployment = build_deployment(&spec(ApplicationType::LoadBalanced));
        assert_eq!(deployment.metadata.name.as_deref(), Some("shop-deployment"));

        let dspec = deployment.spec.unwrap();
        assert_eq!(dspec.replicas, Some(3));
        assert_eq!(
            dspec.selector.match_labels.unwrap().get("app").map(String::as_str),
            Some("shop-deployment")
        );

        let pod_spec = dspec.template.spec.unwrap();
        let container = &pod_spec.containers[0];
        assert_eq!(container.image.as_deref(), Some("nginx:1.27"));
        let requests = container.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests["cpu"].0, "500m");
        assert_eq!(requests["memory"].0, "256Mi");
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 8080);
    }

    #[test]
    fn test_legacy_type_runs_one_replica() {
        let deployment = build_deployment(&spec(ApplicationType::Unspecified));
        assert_eq!(deployment.spec.unwrap().replicas, Some(1));
    }

    #[test]
    fn test_service_type_follows_application_type() {
        let lb = build_service(&spec(ApplicationType::LoadBalanced));
        assert_eq!(lb.spec.as_ref().unwrap().type_.as_deref(), Some("LoadBalancer"));

        let single = build_service(&spec(ApplicationType::SingleInstance));
        let sspec = single.spec.unwrap();
        assert_eq!(sspec.type_.as_deref(), Some("ClusterIP"));
        let ports = sspec.ports.unwrap();
        let port = &ports[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::Int(8080)));
        assert_eq!(
            sspec.selector.unwrap().get("app").map(String::as_str),
            Some("shop-deployment")
        );
    }

    #[test]
    fn test_build_ingress() {
        let ingress = build_ingress(
            &spec(ApplicationType::LoadBalanced),
            "apps.example.com",
            Some("nginx"),
        );
        assert_eq!(ingress.metadata.name.as_deref(), Some("shop-ingress"));

        let ispec = ingress.spec.unwrap();
        assert_eq!(ispec.ingress_class_name.as_deref(), Some("nginx"));
        let rules = ispec.rules.unwrap();
        let rule = &rules[0];
        assert_eq!(rule.host.as_deref(), Some("team-a.shop.apps.example.com"));

        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/"));
        assert_eq!(path.path_type, "Prefix");
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "shop-service");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(80));
    }

    #[test]
    fn test_builders_are_deterministic() {
        let s = spec(ApplicationType::LoadBalanced);
        assert_eq!(build_deployment(&s), build_deployment(&s));
        assert_eq!(build_service(&s), build_service(&s));
        assert_eq!(
            build_ingress(&s, "example.com", None),
            build_ingress(&s, "example.com", None)
        );
    }
}
