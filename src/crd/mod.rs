//! Custom Resource Definitions for the AppFleet operator
//!
//! - ManagedApplication: a user application and its scaling policy

mod application;

pub use application::{
    ApplicationCondition, ApplicationPhase, ApplicationSpec, ApplicationStatus, ApplicationType,
    ContainerSpec, ManagedApplication, ResourceLimit, ScalabilitySpec, CPU_LIMIT_CHOICES,
    MEMORY_LIMIT_CHOICES,
};
