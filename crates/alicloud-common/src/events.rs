//! Kubernetes Event recording for the machine actuator.
//!
//! Provides a trait-based abstraction over `kube::runtime::events::Recorder`
//! so the actuator can emit standard Kubernetes Events visible via
//! `kubectl describe machine`.
//!
//! Events are **fire-and-forget**: failures are logged as warnings and never
//! propagate errors. A failed event must never break reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
///
/// Implementations are expected to be fire-and-forget: `publish()` logs a
/// warning on failure but never returns an error.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Machine this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (e.g. "FailedCreate")
    /// * `action` - What action was taken (e.g. "Create")
    /// * `note` - Human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as `controller_name`
    /// (e.g. "alibabacloud-controller").
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// No-op implementation for callers that do not record events.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
///
/// These appear in `kubectl get events` under the REASON column.
pub mod reasons {
    /// Instance creation failed
    pub const FAILED_CREATE: &str = "FailedCreate";
    /// Instance update failed
    pub const FAILED_UPDATE: &str = "FailedUpdate";
    /// Instance deletion failed
    pub const FAILED_DELETE: &str = "FailedDelete";
    /// Existence check failed
    pub const FAILED_EXISTS: &str = "FailedExists";
    /// Instance created
    pub const CREATE: &str = "Create";
    /// Instance reconciled
    pub const UPDATE: &str = "Update";
    /// Instance deleted
    pub const DELETE: &str = "Delete";
}

/// Well-known event action strings.
pub mod actions {
    /// Create action
    pub const CREATE: &str = "Create";
    /// Update action
    pub const UPDATE: &str = "Update";
    /// Delete action
    pub const DELETE: &str = "Delete";
    /// Exists action
    pub const EXISTS: &str = "Exists";
}
