//! Failure counters for machine instance operations
//!
//! Each counter carries the machine's `name` and `namespace` plus a `reason`
//! label holding the error text.

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;

/// Global meter for actuator metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("alicloud-machine"));

/// Counter of failed instance creations
pub static INSTANCE_CREATE_FAILURES: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("alicloud_machine_instance_create_failures_total")
        .with_description("Total number of failed ECS instance creations")
        .with_unit("{failures}")
        .build()
});

/// Counter of failed instance updates
pub static INSTANCE_UPDATE_FAILURES: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("alicloud_machine_instance_update_failures_total")
        .with_description("Total number of failed ECS instance updates")
        .with_unit("{failures}")
        .build()
});

/// Counter of failed instance deletions
pub static INSTANCE_DELETE_FAILURES: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("alicloud_machine_instance_delete_failures_total")
        .with_description("Total number of failed ECS instance deletions")
        .with_unit("{failures}")
        .build()
});

/// Labels identifying the machine a failure belongs to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineLabels {
    /// Machine name
    pub name: String,
    /// Machine namespace
    pub namespace: String,
    /// Error text
    pub reason: String,
}

impl MachineLabels {
    /// Build labels for a machine failure
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    fn attributes(&self) -> [KeyValue; 3] {
        [
            KeyValue::new("name", self.name.clone()),
            KeyValue::new("namespace", self.namespace.clone()),
            KeyValue::new("reason", self.reason.clone()),
        ]
    }
}

/// Record a failed instance creation
pub fn record_failed_instance_create(labels: &MachineLabels) {
    INSTANCE_CREATE_FAILURES.add(1, &labels.attributes());
}

/// Record a failed instance update
pub fn record_failed_instance_update(labels: &MachineLabels) {
    INSTANCE_UPDATE_FAILURES.add(1, &labels.attributes());
}

/// Record a failed instance deletion
pub fn record_failed_instance_delete(labels: &MachineLabels) {
    INSTANCE_DELETE_FAILURES.add(1, &labels.attributes());
}
