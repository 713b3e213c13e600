//! Kubernetes-standard status condition helpers
//!
//! Constants and builders for the conditions reported on ManagedApplication
//! status, following the Kubernetes API conventions.

use crate::crd::ApplicationCondition;
use chrono::Utc;

// Condition status values
pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

// ManagedApplication condition types
pub const APPLICATION_CONDITION_READY: &str = "Ready";
pub const APPLICATION_CONDITION_DEGRADED: &str = "Degraded";

// Condition reasons
pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";

/// Build a condition stamped with the current time.
pub fn build_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> ApplicationCondition {
    ApplicationCondition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        last_transition_time: Some(Utc::now().to_rfc3339()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    }
}

/// Set or update a condition in a list, preserving lastTransitionTime when status hasn't changed.
pub fn set_condition(conditions: &mut Vec<ApplicationCondition>, new: ApplicationCondition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        if existing.status != new.status {
            *existing = new;
        } else {
            existing.reason = new.reason;
            existing.message = new.message;
        }
    } else {
        conditions.push(new);
    }
}

/// Conditions for a successful reconciliation.
pub fn deployed_conditions(
    previous: &[ApplicationCondition],
    replicas: i32,
) -> Vec<ApplicationCondition> {
    let mut conditions = previous.to_vec();
    set_condition(
        &mut conditions,
        build_condition(
            APPLICATION_CONDITION_READY,
            CONDITION_TRUE,
            REASON_RECONCILED,
            &format!("Deployment, Service and Ingress applied with {} replica(s)", replicas),
        ),
    );
    set_condition(
        &mut conditions,
        build_condition(
            APPLICATION_CONDITION_DEGRADED,
            CONDITION_FALSE,
            "Healthy",
            "All cluster objects are in line with the spec",
        ),
    );
    conditions
}

/// Conditions for an invalid spec or a failed reconciliation.
pub fn failed_conditions(
    previous: &[ApplicationCondition],
    reason: &str,
    message: &str,
) -> Vec<ApplicationCondition> {
    let mut conditions = previous.to_vec();
    set_condition(
        &mut conditions,
        build_condition(APPLICATION_CONDITION_READY, CONDITION_FALSE, reason, message),
    );
    set_condition(
        &mut conditions,
        build_condition(APPLICATION_CONDITION_DEGRADED, CONDITION_TRUE, reason, message),
    );
    conditions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_condition() {
        let cond = build_condition(APPLICATION_CONDITION_READY, CONDITION_TRUE, "Reconciled", "ok");
        assert_eq!(cond.r#type, "Ready");
        assert_eq!(cond.status, "True");
        assert!(cond.last_transition_time.is_some());
        assert_eq!(cond.reason.as_deref(), Some("Reconciled"));
    }

    #[test]
    fn test_set_condition_adds_new() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, build_condition("Ready", CONDITION_TRUE, "OK", "ok"));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_set_condition_preserves_transition_time_on_same_status() {
        let mut conditions = vec![ApplicationCondition {
            r#type: "Ready".to_string(),
            status: CONDITION_TRUE.to_string(),
            last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
            reason: Some("First".to_string()),
            message: Some("first".to_string()),
        }];

        set_condition(&mut conditions, build_condition("Ready", CONDITION_TRUE, "Second", "second"));

        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].reason.as_deref(), Some("Second"));
    }

    #[test]
    fn test_failed_then_deployed_flips_status() {
        let failed = failed_conditions(&[], "InvalidSpec", "port 0 is outside 1-65535");
        assert_eq!(failed.len(), 2);
        assert!(failed
            .iter()
            .any(|c| c.r#type == APPLICATION_CONDITION_DEGRADED && c.status == CONDITION_TRUE));

        let deployed = deployed_conditions(&failed, 3);
        let ready = deployed
            .iter()
            .find(|c| c.r#type == APPLICATION_CONDITION_READY)
            .unwrap();
        assert_eq!(ready.status, CONDITION_TRUE);
        assert!(ready.message.as_deref().unwrap().contains("3 replica"));
    }
}
