//! Application store
//!
//! The control loops read applications and bump replica counts through
//! [`ApplicationRepository`]. [`KubeApplicationRepository`] keeps them as
//! `ManagedApplication` custom resources.

use crate::crd::{ApplicationSpec, ManagedApplication};
use crate::error::{OperatorError, Result};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

/// Persistence collaborator used by the control loops
#[async_trait::async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Applications the operator scales on its own
    async fn find_auto_scaling_applications(&self) -> Result<Vec<ApplicationSpec>>;

    /// Applications that only receive scaling recommendations
    async fn find_manual_scaling_applications(&self) -> Result<Vec<ApplicationSpec>>;

    /// Add one replica to the application and return its updated spec
    async fn horizontal_scale_up(&self, application_id: &str) -> Result<ApplicationSpec>;
}

/// Identity of an application: `spec.id`, or the object UID when unset.
pub fn application_id(app: &ManagedApplication) -> String {
    if !app.spec.id.is_empty() {
        return app.spec.id.clone();
    }
    app.uid().unwrap_or_else(|| app.name_any())
}

/// The object's spec with its identity filled in
pub fn spec_with_id(app: &ManagedApplication) -> ApplicationSpec {
    let mut spec = app.spec.clone();
    spec.id = application_id(app);
    spec
}

/// Specs of the live applications with the given scaling mode that pass
/// validation. Invalid ones are never deployed, so the loops leave them alone.
pub fn schedulable_specs(apps: &[ManagedApplication], auto_scaled: bool) -> Vec<ApplicationSpec> {
    apps.iter()
        .filter(|app| app.spec.scalability_spec.is_auto_scaled == auto_scaled)
        .map(spec_with_id)
        .filter(|spec| match spec.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    app = %spec.name,
                    namespace = %spec.namespace_name,
                    "Skipping invalid application: {}",
                    e
                );
                false
            }
        })
        .collect()
}

/// Merge patch adding one replica to `current`
pub fn scale_up_patch(current: i32) -> serde_json::Value {
    serde_json::json!({
        "spec": {
            "scalabilitySpec": {
                "replicas": current + 1
            }
        }
    })
}

/// `ApplicationRepository` over `ManagedApplication` objects in every namespace
#[derive(Clone)]
pub struct KubeApplicationRepository {
    client: Client,
}

impl KubeApplicationRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn list(&self) -> Result<Vec<ManagedApplication>> {
        let apps: Api<ManagedApplication> = Api::all(self.client.clone());
        let list = apps
            .list(&ListParams::default())
            .await
            .map_err(|e| OperatorError::Persistence(e.to_string()))?;
        Ok(list
            .items
            .into_iter()
            .filter(|app| app.metadata.deletion_timestamp.is_none())
            .collect())
    }

    async fn find_by_auto_scaling(&self, auto_scaled: bool) -> Result<Vec<ApplicationSpec>> {
        let specs = schedulable_specs(&self.list().await?, auto_scaled);
        debug!(auto_scaled, count = specs.len(), "Listed applications");
        Ok(specs)
    }
}

#[async_trait::async_trait]
impl ApplicationRepository for KubeApplicationRepository {
    async fn find_auto_scaling_applications(&self) -> Result<Vec<ApplicationSpec>> {
        self.find_by_auto_scaling(true).await
    }

    async fn find_manual_scaling_applications(&self) -> Result<Vec<ApplicationSpec>> {
        self.find_by_auto_scaling(false).await
    }

    async fn horizontal_scale_up(&self, id: &str) -> Result<ApplicationSpec> {
        let app = self
            .list()
            .await?
            .into_iter()
            .find(|app| application_id(app) == id)
            .ok_or_else(|| OperatorError::NotFound(format!("application {}", id)))?;

        let name = app.name_any();
        let namespace = app.namespace().unwrap_or_else(|| "default".to_string());
        let current = app.spec.scalability_spec.replicas;

        let apps: Api<ManagedApplication> = Api::namespaced(self.client.clone(), &namespace);
        let updated = apps
            .patch(
                &name,
                &PatchParams::default(),
                &Patch::Merge(&scale_up_patch(current)),
            )
            .await
            .map_err(|e| OperatorError::Persistence(e.to_string()))?;

        info!(
            app = %name,
            namespace = %namespace,
            from = current,
            to = updated.spec.scalability_spec.replicas,
            "Scaled application up"
        );
        Ok(spec_with_id(&updated))
    }
}
