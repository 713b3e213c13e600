//! AppFleet Kubernetes Operator
//!
//! Deploys ManagedApplication resources and runs the scaling and cluster
//! monitoring loops.
//!
//! ## Usage
//!
//! ```bash
//! # Run the operator (requires kubeconfig)
//! appfleet-operator --ingress-domain apps.example.com
//!
//! # Run with custom log level
//! RUST_LOG=debug appfleet-operator
//! ```

use appfleet_operator::{
    ApplicationController, ApplicationRepository, AutoscaleController, ClusterMonitorController,
    ClusterReconciler, Controller, KubeApplicationRepository, KubeClusterApi, LogNotifier,
    ManualScalingController, NotificationGate, Notifier, OperatorSettings, WebhookNotifier,
};
use clap::Parser;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// AppFleet Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "appfleet-operator")]
#[command(version, about = "Kubernetes Operator for AppFleet applications")]
struct Args {
    /// Seconds between autoscale ticks
    #[arg(long, env = "AUTOSCALE_INTERVAL_SECONDS", default_value_t = 60)]
    autoscale_interval_seconds: u64,

    /// Seconds between manual-scaling recommendation ticks
    #[arg(long, env = "MANUAL_SCALING_INTERVAL_SECONDS", default_value_t = 300)]
    manual_scaling_interval_seconds: u64,

    /// Seconds between cluster usage checks
    #[arg(long, env = "CLUSTER_MONITOR_INTERVAL_SECONDS", default_value_t = 300)]
    cluster_monitor_interval_seconds: u64,

    /// Node usage percentage at or above which a node counts as exceeding
    #[arg(long, env = "CLUSTER_USAGE_PERCENTAGE", default_value_t = 80.0)]
    cluster_usage_percentage: f64,

    /// Percentage of nodes that must exceed before alerting
    #[arg(long, env = "CLUSTER_NODES_PERCENTAGE", default_value_t = 50.0)]
    cluster_nodes_percentage: f64,

    /// Global replica ceiling for auto-scaled applications
    #[arg(long, env = "MAX_NUMBER_OF_REPLICAS", default_value_t = 5)]
    max_number_of_replicas: i32,

    /// Minimum seconds between repeated alerts for the same subject
    #[arg(long, env = "RENOTIFY_INTERVAL_SECONDS", default_value_t = 4 * 60 * 60)]
    renotify_interval_seconds: u64,

    /// Upper bound in seconds on a single loop tick
    #[arg(long, env = "TICK_DEADLINE_SECONDS", default_value_t = 120)]
    tick_deadline_seconds: u64,

    /// Domain suffix for ingress hosts
    #[arg(long, env = "INGRESS_DOMAIN")]
    ingress_domain: String,

    /// Ingress class for application Ingresses
    #[arg(long, env = "INGRESS_CLASS")]
    ingress_class: Option<String>,

    /// Recipient of cluster-wide alerts
    #[arg(long, env = "CLUSTER_ADMIN_EMAIL", default_value = "")]
    cluster_admin_email: String,

    /// Mail relay endpoint; notifications are only logged when unset
    #[arg(long, env = "MAIL_RELAY_URL")]
    mail_relay_url: Option<String>,

    /// Comma-separated addresses copied on every notification
    #[arg(long, env = "NOTIFICATION_CC", default_value = "")]
    notification_cc: String,
}

impl Args {
    fn settings(&self) -> OperatorSettings {
        OperatorSettings {
            autoscale_interval: Duration::from_secs(self.autoscale_interval_seconds),
            manual_scaling_interval: Duration::from_secs(self.manual_scaling_interval_seconds),
            cluster_monitor_interval: Duration::from_secs(self.cluster_monitor_interval_seconds),
            cluster_usage_threshold_percent: self.cluster_usage_percentage,
            cluster_node_fraction_percent: self.cluster_nodes_percentage,
            max_replicas: self.max_number_of_replicas,
            renotify_interval: Duration::from_secs(self.renotify_interval_seconds),
            tick_deadline: Duration::from_secs(self.tick_deadline_seconds),
            domain_suffix: self.ingress_domain.clone(),
            ingress_class: self.ingress_class.clone(),
            cluster_admin_email: self.cluster_admin_email.clone(),
            cc_emails: OperatorSettings::parse_cc(&self.notification_cc),
        }
    }
}

fn spawn_controller<C>(controller: Arc<C>) -> JoinHandle<()>
where
    C: Controller + 'static,
{
    tokio::spawn(async move {
        let name = controller.name();
        if let Err(e) = controller.run().await {
            error!("{} controller error: {}", name, e);
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = Args::parse();
    let settings = args.settings();
    settings.validate()?;

    info!("Starting AppFleet Kubernetes Operator");
    info!("Ingress domain: {}", settings.domain_suffix);

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let notifier: Arc<dyn Notifier> = match &args.mail_relay_url {
        Some(url) => {
            info!("Sending notifications through {}", url);
            Arc::new(WebhookNotifier::new(url.clone(), Duration::from_secs(10))?)
        }
        None => {
            info!("No mail relay configured, notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    let reconciler = Arc::new(
        ClusterReconciler::new(
            Arc::new(KubeClusterApi::new(client.clone())),
            settings.domain_suffix.clone(),
        )
        .with_ingress_class(settings.ingress_class.clone()),
    );
    let repository: Arc<dyn ApplicationRepository> =
        Arc::new(KubeApplicationRepository::new(client.clone()));
    let gate = Arc::new(NotificationGate::new());

    // Create controllers
    let application_controller = Arc::new(ApplicationController::new(
        client.clone(),
        Arc::clone(&reconciler),
    ));
    let autoscale_controller = Arc::new(AutoscaleController::new(
        Arc::clone(&repository),
        Arc::clone(&reconciler),
        Arc::clone(&notifier),
        Arc::clone(&gate),
        settings.clone(),
    ));
    let manual_controller = Arc::new(ManualScalingController::new(
        Arc::clone(&repository),
        Arc::clone(&reconciler),
        Arc::clone(&notifier),
        settings.clone(),
    ));
    let monitor_controller = Arc::new(ClusterMonitorController::new(
        Arc::clone(&reconciler),
        Arc::clone(&notifier),
        Arc::clone(&gate),
        settings,
    ));

    // Run controllers concurrently
    let application_handle = spawn_controller(application_controller);
    let autoscale_handle = spawn_controller(autoscale_controller);
    let manual_handle = spawn_controller(manual_controller);
    let monitor_handle = spawn_controller(monitor_controller);

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = application_handle => {
            if let Err(e) = result {
                error!("Application controller task failed: {}", e);
            }
        }
        result = autoscale_handle => {
            if let Err(e) = result {
                error!("Autoscale controller task failed: {}", e);
            }
        }
        result = manual_handle => {
            if let Err(e) = result {
                error!("Manual scaling controller task failed: {}", e);
            }
        }
        result = monitor_handle => {
            if let Err(e) = result {
                error!("Cluster monitor task failed: {}", e);
            }
        }
    }

    info!("AppFleet Operator shutting down");
    Ok(())
}
