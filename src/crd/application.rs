//! ManagedApplication Custom Resource Definition
//!
//! Describes a user-owned containerized application: what to run, how much CPU
//! and memory it may use, and how it is allowed to scale.

use crate::error::{OperatorError, Result};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Legal CPU limits, as (value, unit) pairs.
pub const CPU_LIMIT_CHOICES: &[(u32, &str)] = &[
    (100, "m"),
    (250, "m"),
    (500, "m"),
    (1000, "m"),
    (2000, "m"),
    (4000, "m"),
];

/// Legal memory limits, as (value, unit) pairs.
pub const MEMORY_LIMIT_CHOICES: &[(u32, &str)] = &[
    (128, "Mi"),
    (256, "Mi"),
    (512, "Mi"),
    (1, "Gi"),
    (2, "Gi"),
    (4, "Gi"),
];

/// ManagedApplication is the Schema for the managedapplications API
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appfleet.io",
    version = "v1alpha1",
    kind = "ManagedApplication",
    namespaced,
    status = "ApplicationStatus",
    shortname = "mapp",
    printcolumn = r#"{"name":"Namespace","type":"string","jsonPath":".spec.namespaceName"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.scalabilitySpec.replicas"}"#,
    printcolumn = r#"{"name":"AutoScaled","type":"boolean","jsonPath":".spec.scalabilitySpec.isAutoScaled"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Identifier of the application record
    #[serde(default)]
    pub id: String,

    /// Application name, used to derive every cluster object name
    pub name: String,

    /// Identifier of the owning namespace record
    #[serde(default)]
    pub namespace_id: String,

    /// Kubernetes namespace the application is deployed into
    pub namespace_name: String,

    /// Container image
    pub image: String,

    /// Container port the application listens on
    pub port: i32,

    /// How the application is exposed
    #[serde(default)]
    pub application_type: ApplicationType,

    /// CPU and memory limits
    pub container_spec: ContainerSpec,

    /// Scaling policy
    pub scalability_spec: ScalabilitySpec,

    /// Where usage notifications are sent
    #[serde(default)]
    pub administrator_email: String,
}

/// How an application is exposed inside the cluster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub enum ApplicationType {
    /// Legacy records created before the type was recorded; always one replica
    #[default]
    Unspecified,
    /// A single instance behind a ClusterIP service
    SingleInstance,
    /// Several instances behind a LoadBalancer service
    LoadBalanced,
}

/// A resource limit restricted to one of the fixed choices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceLimit {
    pub value: u32,
    pub unit: String,
}

impl ResourceLimit {
    pub fn new(value: u32, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }

    /// Kubernetes quantity notation, e.g. `"500m"` or `"1Gi"`
    pub fn to_quantity(&self) -> String {
        format!("{}{}", self.value, self.unit)
    }

    fn is_one_of(&self, choices: &[(u32, &str)]) -> bool {
        choices
            .iter()
            .any(|(value, unit)| *value == self.value && *unit == self.unit)
    }
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Container resource limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub cpu_limit: ResourceLimit,
    pub memory_limit: ResourceLimit,
}

/// Scaling policy for an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScalabilitySpec {
    /// Lowest instance count the application may run with
    #[serde(default = "default_min_instances")]
    pub minimum_instance_count: i32,

    /// Highest instance count the application may scale to
    #[serde(default = "default_max_instances")]
    pub maximum_instance_count: i32,

    /// Desired replica count
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Let the operator scale up on its own; otherwise it only recommends
    #[serde(default)]
    pub is_auto_scaled: bool,

    /// CPU usage percentage of the limit above which the application is overloaded
    #[serde(default = "default_threshold")]
    pub cpu_usage_percentage_threshold: f64,

    /// Memory usage percentage of the limit above which the application is overloaded
    #[serde(default = "default_threshold")]
    pub memory_usage_percentage_threshold: f64,
}

impl Default for ScalabilitySpec {
    fn default() -> Self {
        Self {
            minimum_instance_count: default_min_instances(),
            maximum_instance_count: default_max_instances(),
            replicas: default_replicas(),
            is_auto_scaled: false,
            cpu_usage_percentage_threshold: default_threshold(),
            memory_usage_percentage_threshold: default_threshold(),
        }
    }
}

/// Status of the ManagedApplication
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    /// Current phase of the application
    #[serde(default)]
    pub phase: ApplicationPhase,
    /// Replica count applied to the Deployment
    #[serde(default)]
    pub replicas: i32,
    /// Conditions representing application state
    #[serde(default)]
    pub conditions: Vec<ApplicationCondition>,
    /// Last observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last update timestamp
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Last reconciliation error, if any
    #[serde(default)]
    pub message: Option<String>,
}

/// Phase of the application lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub enum ApplicationPhase {
    /// Not reconciled yet
    #[default]
    Pending,
    /// Cluster objects are in line with the spec
    Deployed,
    /// The spec is invalid or the last reconciliation failed
    Failed,
}

/// Condition of the application
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCondition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last time the condition transitioned
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

impl ApplicationSpec {
    /// Name of the Deployment running this application
    pub fn deployment_name(&self) -> String {
        format!("{}-deployment", self.name)
    }

    /// Name of the Service exposing this application
    pub fn service_name(&self) -> String {
        format!("{}-service", self.name)
    }

    /// Name of the Ingress routing to this application
    pub fn ingress_name(&self) -> String {
        format!("{}-ingress", self.name)
    }

    /// Replica count written to the Deployment
    pub fn desired_replicas(&self) -> i32 {
        match self.application_type {
            ApplicationType::Unspecified => 1,
            _ => self.scalability_spec.replicas,
        }
    }

    /// Check the spec against the constraints the control plane relies on.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(OperatorError::InvalidSpec("name must not be empty".to_string()));
        }
        if self.namespace_name.is_empty() {
            return Err(OperatorError::InvalidSpec(
                "namespaceName must not be empty".to_string(),
            ));
        }
        if !(1..=65535).contains(&self.port) {
            return Err(OperatorError::InvalidSpec(format!(
                "port {} is outside 1-65535",
                self.port
            )));
        }
        if !self.container_spec.cpu_limit.is_one_of(CPU_LIMIT_CHOICES) {
            return Err(OperatorError::InvalidSpec(format!(
                "cpu limit {} is not one of the allowed choices",
                self.container_spec.cpu_limit
            )));
        }
        if !self.container_spec.memory_limit.is_one_of(MEMORY_LIMIT_CHOICES) {
            return Err(OperatorError::InvalidSpec(format!(
                "memory limit {} is not one of the allowed choices",
                self.container_spec.memory_limit
            )));
        }

        let scaling = &self.scalability_spec;
        if scaling.replicas < 0 {
            return Err(OperatorError::InvalidSpec(format!(
                "replicas {} must not be negative",
                scaling.replicas
            )));
        }
        if scaling.maximum_instance_count < scaling.minimum_instance_count {
            return Err(OperatorError::InvalidSpec(format!(
                "maximumInstanceCount {} is below minimumInstanceCount {}",
                scaling.maximum_instance_count, scaling.minimum_instance_count
            )));
        }
        for (label, threshold) in [
            ("cpu", scaling.cpu_usage_percentage_threshold),
            ("memory", scaling.memory_usage_percentage_threshold),
        ] {
            if !(threshold > 0.0 && threshold <= 100.0) {
                return Err(OperatorError::InvalidSpec(format!(
                    "{} usage threshold {} is outside (0, 100]",
                    label, threshold
                )));
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_min_instances() -> i32 {
    1
}

fn default_max_instances() -> i32 {
    1
}

fn default_replicas() -> i32 {
    1
}

fn default_threshold() -> f64 {
    80.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn spec_json() -> &'static str {
        r#"{
            "id": "42",
            "name": "shop",
            "namespaceName": "team-a",
            "image": "nginx:1.27",
            "port": 8080,
            "applicationType": "LoadBalanced",
            "containerSpec": {
                "cpuLimit": {"value": 1000, "unit": "m"},
                "memoryLimit": {"value": 512, "unit": "Mi"}
            },
            "scalabilitySpec": {
                "minimumInstanceCount": 1,
                "maximumInstanceCount": 4,
                "replicas": 2,
                "isAutoScaled": true,
                "cpuUsagePercentageThreshold": 50
            },
            "administratorEmail": "ops@example.com"
        }"#
    }

    #[test]
    fn test_application_spec_parsing() {
        let spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        assert_eq!(spec.name, "shop");
        assert_eq!(spec.application_type, ApplicationType::LoadBalanced);
        assert_eq!(spec.container_spec.cpu_limit.to_quantity(), "1000m");
        assert_eq!(spec.scalability_spec.cpu_usage_percentage_threshold, 50.0);
        assert_eq!(spec.scalability_spec.memory_usage_percentage_threshold, 80.0);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_object_names() {
        let spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        assert_eq!(spec.deployment_name(), "shop-deployment");
        assert_eq!(spec.service_name(), "shop-service");
        assert_eq!(spec.ingress_name(), "shop-ingress");
    }

    #[test]
    fn test_desired_replicas_for_legacy_type() {
        let mut spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        assert_eq!(spec.desired_replicas(), 2);
        spec.application_type = ApplicationType::Unspecified;
        assert_eq!(spec.desired_replicas(), 1);
        spec.application_type = ApplicationType::SingleInstance;
        assert_eq!(spec.desired_replicas(), 2);
    }

    #[test]
    fn test_application_type_default() {
        assert_eq!(ApplicationType::default(), ApplicationType::Unspecified);
        assert_eq!(ApplicationPhase::default(), ApplicationPhase::Pending);
    }

    #[test]
    fn test_limits_outside_choice_list_rejected() {
        let mut spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        spec.container_spec.cpu_limit = ResourceLimit::new(750, "m");
        assert!(matches!(spec.validate(), Err(OperatorError::InvalidSpec(_))));

        let mut spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        spec.container_spec.memory_limit = ResourceLimit::new(512, "Gi");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_invalid_scaling_rejected() {
        let mut spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        spec.scalability_spec.maximum_instance_count = 0;
        assert!(spec.validate().is_err());

        let mut spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        spec.scalability_spec.replicas = -1;
        assert!(spec.validate().is_err());

        let mut spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        spec.scalability_spec.cpu_usage_percentage_threshold = 0.0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut spec: ApplicationSpec = serde_json::from_str(spec_json()).unwrap();
        spec.port = 0;
        assert!(spec.validate().is_err());
        spec.port = 65536;
        assert!(spec.validate().is_err());
        spec.port = 65535;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_crd_generation() {
        let crd = ManagedApplication::crd();
        assert_eq!(crd.spec.group, "appfleet.io");
        assert_eq!(crd.spec.names.kind, "ManagedApplication");
        assert_eq!(crd.spec.scope, "Namespaced");
    }
}
