//! Error types for the Alibaba Cloud machine actuator
//!
//! Machine-facing failures carry the machine name and a message that is
//! surfaced verbatim in events. The variant decides whether the controller
//! should retry and which reason prefix the event carries.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for actuator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The Machine or its provider spec cannot work as written.
    /// Retrying without a user edit will not help.
    #[error("{message}")]
    InvalidConfiguration {
        /// Machine the configuration belongs to
        machine: String,
        /// What is wrong
        message: String,
    },

    /// Instance creation failed
    #[error("{message}")]
    CreateMachine {
        /// Machine being created
        machine: String,
        /// What failed
        message: String,
    },

    /// Instance update failed
    #[error("{message}")]
    UpdateMachine {
        /// Machine being updated
        machine: String,
        /// What failed
        message: String,
    },

    /// Instance deletion failed
    #[error("{message}")]
    DeleteMachine {
        /// Machine being deleted
        machine: String,
        /// What failed
        message: String,
    },

    /// A cloud API call failed
    #[error("{message}")]
    Cloud {
        /// API operation (e.g. "DescribeInstances")
        operation: String,
        /// Description of what failed
        message: String,
    },

    /// A bounded wait ran out of time
    #[error("wait for {operation} timeout")]
    Timeout {
        /// Name of the wait
        operation: String,
    },

    /// A wait was abandoned because shutdown was requested
    #[error("wait for {operation} cancelled")]
    Cancelled {
        /// Name of the wait
        operation: String,
    },

    /// Not a failure: reconcile again after the delay
    #[error("requeue in: {}s", .after.as_secs())]
    RequeueAfter {
        /// How long to wait before the next reconcile
        after: Duration,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "scope", "config")
        context: String,
    },
}

impl Error {
    /// Create an invalid-configuration error for a machine
    pub fn invalid_configuration(machine: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            machine: machine.into(),
            message: msg.into(),
        }
    }

    /// Create a create-machine error
    pub fn create_machine(machine: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CreateMachine {
            machine: machine.into(),
            message: msg.into(),
        }
    }

    /// Create an update-machine error
    pub fn update_machine(machine: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UpdateMachine {
            machine: machine.into(),
            message: msg.into(),
        }
    }

    /// Create a delete-machine error
    pub fn delete_machine(machine: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::DeleteMachine {
            machine: machine.into(),
            message: msg.into(),
        }
    }

    /// Create a cloud API error
    pub fn cloud(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Cloud {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error naming the wait
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Ask the controller to reconcile again after `after`
    pub fn requeue_after(after: Duration) -> Self {
        Self::RequeueAfter { after }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific kind
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Prefix the message, keeping the category.
    ///
    /// Variants without a free-form message become [`Error::Internal`] so the
    /// prefix is not lost; a requeue passes through untouched.
    pub fn context(self, prefix: impl Display) -> Self {
        match self {
            Self::InvalidConfiguration { machine, message } => Self::InvalidConfiguration {
                machine,
                message: format!("{prefix}: {message}"),
            },
            Self::CreateMachine { machine, message } => Self::CreateMachine {
                machine,
                message: format!("{prefix}: {message}"),
            },
            Self::UpdateMachine { machine, message } => Self::UpdateMachine {
                machine,
                message: format!("{prefix}: {message}"),
            },
            Self::DeleteMachine { machine, message } => Self::DeleteMachine {
                machine,
                message: format!("{prefix}: {message}"),
            },
            Self::Cloud { operation, message } => Self::Cloud {
                operation,
                message: format!("{prefix}: {message}"),
            },
            Self::Serialization { message, kind } => Self::Serialization {
                message: format!("{prefix}: {message}"),
                kind,
            },
            Self::Internal { message, context } => Self::Internal {
                message: format!("{prefix}: {message}"),
                context,
            },
            requeue @ Self::RequeueAfter { .. } => requeue,
            other => Self::Internal {
                message: format!("{prefix}: {other}"),
                context: UNKNOWN_CONTEXT.to_string(),
            },
        }
    }

    /// Returns true if the controller should retry the reconcile
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube { .. } => true,
            Self::InvalidConfiguration { .. } => false,
            Self::CreateMachine { .. } | Self::UpdateMachine { .. } | Self::DeleteMachine { .. } => {
                true
            }
            Self::Cloud { .. } => true,
            Self::Timeout { .. } => true,
            Self::Cancelled { .. } => true,
            // a scheduling signal, not a failure
            Self::RequeueAfter { .. } => false,
            Self::Serialization { .. } => false,
            Self::Internal { .. } => true,
        }
    }

    /// Delay before the next reconcile, if this is a requeue signal
    pub fn requeue_delay(&self) -> Option<Duration> {
        match self {
            Self::RequeueAfter { after } => Some(*after),
            _ => None,
        }
    }

    /// Returns true if this is a requeue signal rather than a failure
    pub fn is_requeue(&self) -> bool {
        matches!(self, Self::RequeueAfter { .. })
    }

    /// Reason prefix used in Machine events
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Kube { .. } => "KubernetesError",
            Self::InvalidConfiguration { .. } => "InvalidConfiguration",
            Self::CreateMachine { .. } => "CreateError",
            Self::UpdateMachine { .. } => "UpdateError",
            Self::DeleteMachine { .. } => "DeleteError",
            Self::Cloud { .. } => "CloudError",
            Self::Timeout { .. } => "Timeout",
            Self::Cancelled { .. } => "Cancelled",
            Self::RequeueAfter { .. } => "RequeueAfter",
            Self::Serialization { .. } => "SerializationError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Get the machine name if this error has one
    pub fn machine(&self) -> Option<&str> {
        match self {
            Self::InvalidConfiguration { machine, .. }
            | Self::CreateMachine { machine, .. }
            | Self::UpdateMachine { machine, .. }
            | Self::DeleteMachine { machine, .. } => Some(machine),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
