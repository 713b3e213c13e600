//! AppFleet Kubernetes Operator
//!
//! Deploys user applications to Kubernetes and keeps them sized to their load.
//!
//! ## Custom Resources
//!
//! - `ManagedApplication`: an application deployed as a Deployment, Service and Ingress
//!
//! ## Control loops
//!
//! - Autoscale: adds replicas to auto-scaled applications running over their thresholds
//! - Manual scaling: recommends scale-ups for the remaining applications
//! - Cluster monitor: alerts the administrator when enough nodes run hot
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: appfleet.io/v1alpha1
//! kind: ManagedApplication
//! metadata:
//!   name: shop
//! spec:
//!   name: shop
//!   namespaceName: team-a
//!   image: nginx:1.27
//!   port: 8080
//!   applicationType: LoadBalanced
//!   containerSpec:
//!     cpuLimit: { value: 1000, unit: m }
//!     memoryLimit: { value: 512, unit: Mi }
//!   scalabilitySpec:
//!     maximumInstanceCount: 4
//!     replicas: 2
//!     isAutoScaled: true
//!     cpuUsagePercentageThreshold: 50
//!   administratorEmail: ops@example.com
//! ```

pub mod cluster;
pub mod conditions;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod notification;
pub mod repository;
pub mod units;
pub mod usage;

pub use cluster::{ClusterApi, ClusterReconciler, KubeClusterApi};
pub use config::OperatorSettings;
pub use controllers::{
    ApplicationController, AutoscaleController, ClusterMonitorController, Controller,
    ManualScalingController, TickSummary,
};
pub use crd::{
    ApplicationCondition, ApplicationPhase, ApplicationSpec, ApplicationStatus, ApplicationType,
    ContainerSpec, ManagedApplication, ResourceLimit, ScalabilitySpec,
};
pub use error::{OperatorError, Result};
pub use notification::{
    EmailMessage, LogNotifier, NotificationGate, Notifier, WebhookNotifier,
};
pub use repository::{ApplicationRepository, KubeApplicationRepository};
