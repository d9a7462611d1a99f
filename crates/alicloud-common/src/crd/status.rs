//! Alibaba Cloud provider status carried in `status.providerStatus`

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type recording the outcome of instance creation
pub const MACHINE_CREATION_CONDITION: &str = "MachineCreation";
/// Reason used when the instance was created
pub const MACHINE_CREATION_SUCCEEDED: &str = "MachineCreationSucceeded";
/// Reason used when instance creation failed
pub const MACHINE_CREATION_FAILED: &str = "MachineCreationFailed";

/// Condition status values
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the status changed
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Instance creation succeeded
    pub fn creation_succeeded() -> Self {
        Self::new(
            MACHINE_CREATION_CONDITION,
            ConditionStatus::True,
            MACHINE_CREATION_SUCCEEDED,
            "Machine successfully created",
        )
    }

    /// Instance creation failed with `message`
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::new(
            MACHINE_CREATION_CONDITION,
            ConditionStatus::False,
            MACHINE_CREATION_FAILED,
            message,
        )
    }
}

/// Observed state of the ECS instance backing a Machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlibabaCloudMachineProviderStatus {
    /// API version of this object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of this object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// ID of the backing instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Last observed instance status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_state: Option<String>,

    /// Conditions, one per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl AlibabaCloudMachineProviderStatus {
    /// Instance ID if set and non-empty
    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Find the condition of the given type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Add or update a condition.
    ///
    /// An existing condition of the same type changes only when its reason or
    /// message differs; the transition time moves only when the status flips.
    pub fn set_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == condition.type_)
        {
            None => self.conditions.push(condition),
            Some(existing) => {
                if existing.reason == condition.reason && existing.message == condition.message {
                    return;
                }
                if existing.status != condition.status {
                    existing.last_transition_time = condition.last_transition_time;
                }
                existing.status = condition.status;
                existing.reason = condition.reason;
                existing.message = condition.message;
            }
        }
    }
}
