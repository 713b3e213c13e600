//! Administrator notifications
//!
//! Message building, dispatch and rate limiting. Dispatch goes through the
//! [`Notifier`] trait; [`WebhookNotifier`] hands messages to a mail relay and
//! [`LogNotifier`] only logs them.

mod gate;
pub mod messages;

pub use gate::{NotificationGate, CLUSTER_SUBJECT, DEFAULT_RENOTIFY_INTERVAL};

use crate::error::{OperatorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// An email ready to be handed to the dispatch collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    #[serde(default)]
    pub cc: Vec<String>,
}

/// Outbound notification dispatch
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Whether `address` looks like a deliverable email address.
///
/// This is the only check made before notifying an administrator.
pub fn is_deliverable_address(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !address.chars().any(char::is_whitespace)
}

/// Send `message` if its recipient is deliverable, logging the outcome.
///
/// Returns `true` when the notifier accepted the message.
pub async fn dispatch(notifier: &dyn Notifier, message: &EmailMessage) -> bool {
    if !is_deliverable_address(&message.to) {
        warn!(
            to = %message.to,
            subject = %message.subject,
            "Skipping notification without a deliverable recipient"
        );
        return false;
    }

    match notifier.send(message).await {
        Ok(()) => {
            info!(to = %message.to, subject = %message.subject, "Notification sent");
            true
        }
        Err(e) => {
            warn!(to = %message.to, subject = %message.subject, "Failed to send notification: {}", e);
            false
        }
    }
}

/// Notifier that only writes messages to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            cc = ?message.cc,
            subject = %message.subject,
            body = %message.text_body,
            "Notification (log only)"
        );
        Ok(())
    }
}

/// Notifier that posts messages as JSON to a mail relay endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OperatorError::Notification(format!(
                "mail relay returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
