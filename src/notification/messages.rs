//! Notification content
//!
//! Every builder produces a plain-text and an HTML body carrying the same facts:
//! usage percentages, configured limits and replica counts.

use super::EmailMessage;
use crate::crd::ApplicationSpec;
use crate::usage::{NodeComputedUsage, UsageVerdict};

fn pct(value: f64) -> String {
    format!("{:.2}%", value)
}

fn verdict_text(verdict: &UsageVerdict) -> String {
    format!(
        "- pod {} (container {}): CPU {} ({}), memory {} ({})",
        verdict.pod_name,
        verdict.container_name,
        verdict.cpu_usage,
        pct(verdict.cpu.actual_usage_percentage),
        verdict.memory_usage,
        pct(verdict.memory.actual_usage_percentage),
    )
}

fn verdict_rows(verdicts: &[&UsageVerdict]) -> String {
    verdicts
        .iter()
        .map(|v| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{} ({})</td><td>{} ({})</td></tr>",
                v.pod_name,
                v.container_name,
                v.cpu_usage,
                pct(v.cpu.actual_usage_percentage),
                v.memory_usage,
                pct(v.memory.actual_usage_percentage),
            )
        })
        .collect()
}

fn verdict_table(verdicts: &[&UsageVerdict]) -> String {
    format!(
        "<table><tr><th>Pod</th><th>Container</th><th>CPU</th><th>Memory</th></tr>{}</table>",
        verdict_rows(verdicts)
    )
}

fn limits_text(app: &ApplicationSpec) -> String {
    format!(
        "Limits: CPU {} (threshold {}), memory {} (threshold {})",
        app.container_spec.cpu_limit,
        pct(app.scalability_spec.cpu_usage_percentage_threshold),
        app.container_spec.memory_limit,
        pct(app.scalability_spec.memory_usage_percentage_threshold),
    )
}

fn message(to: &str, cc: &[String], subject: String, text_body: String, html_body: String) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject,
        text_body,
        html_body,
        cc: cc.to_vec(),
    }
}

/// The application was scaled from `previous_replicas` to `app`'s current replicas.
pub fn scaled_up(
    app: &ApplicationSpec,
    verdict: &UsageVerdict,
    previous_replicas: i32,
    cc: &[String],
) -> EmailMessage {
    let replicas = app.scalability_spec.replicas;
    let subject = format!(
        "Application {} in {} scaled up to {} replicas",
        app.name, app.namespace_name, replicas
    );
    let text_body = format!(
        "Application {} in namespace {} exceeded its usage threshold and was scaled from {} to {} replicas.\n{}\n{}\n",
        app.name,
        app.namespace_name,
        previous_replicas,
        replicas,
        limits_text(app),
        verdict_text(verdict),
    );
    let html_body = format!(
        "<p>Application <b>{}</b> in namespace <b>{}</b> exceeded its usage threshold and was scaled from {} to {} replicas.</p><p>{}</p>{}",
        app.name,
        app.namespace_name,
        previous_replicas,
        replicas,
        limits_text(app),
        verdict_table(&[verdict]),
    );
    message(&app.administrator_email, cc, subject, text_body, html_body)
}

/// The application exceeds its threshold but already runs at the replica ceiling.
pub fn cannot_scale(
    app: &ApplicationSpec,
    verdict: &UsageVerdict,
    ceiling: i32,
    cc: &[String],
) -> EmailMessage {
    let replicas = app.scalability_spec.replicas;
    let subject = format!(
        "Application {} in {} cannot scale beyond {} replicas",
        app.name, app.namespace_name, ceiling
    );
    let text_body = format!(
        "Application {} in namespace {} exceeded its usage threshold but runs {} replicas, the maximum of {}. No scaling was performed.\n{}\n{}\n",
        app.name,
        app.namespace_name,
        replicas,
        ceiling,
        limits_text(app),
        verdict_text(verdict),
    );
    let html_body = format!(
        "<p>Application <b>{}</b> in namespace <b>{}</b> exceeded its usage threshold but runs {} replicas, the maximum of {}. No scaling was performed.</p><p>{}</p>{}",
        app.name,
        app.namespace_name,
        replicas,
        ceiling,
        limits_text(app),
        verdict_table(&[verdict]),
    );
    message(&app.administrator_email, cc, subject, text_body, html_body)
}

/// A manually scaled application exceeds its threshold on one or more pods.
pub fn manual_recommendation(
    app: &ApplicationSpec,
    exceeding: &[&UsageVerdict],
    cc: &[String],
) -> EmailMessage {
    let replicas = app.scalability_spec.replicas;
    let subject = format!(
        "Consider scaling application {} in {}",
        app.name, app.namespace_name
    );
    let pods: Vec<String> = exceeding.iter().map(|v| verdict_text(v)).collect();
    let text_body = format!(
        "Application {} in namespace {} runs {} replicas and exceeded its usage threshold on {} pod(s). Consider adding replicas or raising its limits.\n{}\n{}\n",
        app.name,
        app.namespace_name,
        replicas,
        exceeding.len(),
        limits_text(app),
        pods.join("\n"),
    );
    let html_body = format!(
        "<p>Application <b>{}</b> in namespace <b>{}</b> runs {} replicas and exceeded its usage threshold on {} pod(s). Consider adding replicas or raising its limits.</p><p>{}</p>{}",
        app.name,
        app.namespace_name,
        replicas,
        exceeding.len(),
        limits_text(app),
        verdict_table(exceeding),
    );
    message(&app.administrator_email, cc, subject, text_body, html_body)
}

/// Enough nodes run at or above the cluster threshold.
pub fn cluster_alert(
    admin_email: &str,
    threshold: f64,
    nodes: &[NodeComputedUsage],
    cc: &[String],
) -> EmailMessage {
    let subject = format!("Cluster nodes at or above {} usage", pct(threshold));
    let lines: Vec<String> = nodes
        .iter()
        .map(|n| {
            format!(
                "- node {}: CPU {} of {} ({}), memory {} of {} ({}), storage {}, ephemeral storage {}",
                n.name,
                n.cpu_usage,
                n.cpu_capacity,
                pct(n.cpu_usage_percentage),
                n.memory_usage,
                n.memory_capacity,
                pct(n.memory_usage_percentage),
                pct(n.storage_usage_percentage),
                pct(n.ephemeral_storage_usage_percentage),
            )
        })
        .collect();
    let rows: String = nodes
        .iter()
        .map(|n| {
            format!(
                "<tr><td>{}</td><td>{} / {} ({})</td><td>{} / {} ({})</td><td>{}</td><td>{}</td></tr>",
                n.name,
                n.cpu_usage,
                n.cpu_capacity,
                pct(n.cpu_usage_percentage),
                n.memory_usage,
                n.memory_capacity,
                pct(n.memory_usage_percentage),
                pct(n.storage_usage_percentage),
                pct(n.ephemeral_storage_usage_percentage),
            )
        })
        .collect();

    let text_body = format!(
        "Cluster usage crossed the {} threshold.\n{}\n",
        pct(threshold),
        lines.join("\n")
    );
    let html_body = format!(
        "<p>Cluster usage crossed the {} threshold.</p><table><tr><th>Node</th><th>CPU</th><th>Memory</th><th>Storage</th><th>Ephemeral storage</th></tr>{}</table>",
        pct(threshold),
        rows
    );
    message(admin_email, cc, subject, text_body, html_body)
}
