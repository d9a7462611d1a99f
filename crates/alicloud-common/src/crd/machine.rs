//! Machine CRD as served by the Machine API
//!
//! Only the fields the actuator reads or writes are modelled. The provider
//! spec and provider status travel as raw JSON and are decoded by
//! [`super::ProviderSpecCodec`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label naming the cluster a Machine belongs to
pub const MACHINE_CLUSTER_ID_LABEL: &str = "machine.openshift.io/cluster-api-cluster";
/// Upstream Cluster API spelling of [`MACHINE_CLUSTER_ID_LABEL`]
pub const UPSTREAM_CLUSTER_ID_LABEL: &str = "sigs.k8s.io/cluster-api-cluster";
/// Annotation mirroring the instance's last observed status
pub const INSTANCE_STATE_ANNOTATION: &str = "machine.openshift.io/instance-state";
/// Label holding the instance type
pub const INSTANCE_TYPE_LABEL: &str = "machine.openshift.io/instance-type";
/// Label holding the region
pub const REGION_LABEL: &str = "machine.openshift.io/region";
/// Label holding the zone
pub const ZONE_LABEL: &str = "machine.openshift.io/zone";

/// A Machine: one compute instance the cluster wants to exist.
///
/// Example:
/// ```yaml
/// apiVersion: machine.openshift.io/v1beta1
/// kind: Machine
/// metadata:
///   name: worker-0
///   namespace: openshift-machine-api
///   labels:
///     machine.openshift.io/cluster-api-cluster: prod-7xk2p
/// spec:
///   providerSpec:
///     value:
///       apiVersion: machine.openshift.io/v1
///       kind: AlibabaCloudMachineProviderConfig
///       instanceType: ecs.g6.large
///       regionId: cn-beijing
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "machine.openshift.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced,
    status = "MachineStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".spec.providerID"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".metadata.annotations['machine\\.openshift\\.io/instance-state']"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Labels and annotations propagated to the Node
    #[serde(default)]
    pub metadata: MachineObjectMeta,

    /// Cloud specific instance configuration
    #[serde(default)]
    pub provider_spec: ProviderSpec,

    /// Cloud provider ID of the backing instance, set once it exists
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Metadata propagated to the Node backing a Machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineObjectMeta {
    /// Node labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Node annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Raw provider configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ProviderSpec {
    /// Provider config object, decoded by the actuator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Observed state of a Machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Last time the actuator changed this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Provider status object, encoded by the actuator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<serde_json::Value>,

    /// Addresses of the backing instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<NodeAddress>,

    /// Machine phase, owned by the machine controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Terminal error reason, owned by the machine controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// Terminal error message, owned by the machine controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Kind of a node address
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum NodeAddressType {
    /// Address reachable inside the VPC
    #[serde(rename = "InternalIP")]
    InternalIp,
    /// Address reachable from outside the VPC
    #[serde(rename = "ExternalIP")]
    ExternalIp,
    /// DNS name resolvable inside the VPC
    #[serde(rename = "InternalDNS")]
    InternalDns,
    /// Hostname
    Hostname,
}

/// A network address of the instance backing a Machine
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct NodeAddress {
    /// Address kind
    #[serde(rename = "type")]
    pub type_: NodeAddressType,
    /// The address
    pub address: String,
}

impl NodeAddress {
    /// Create an address
    pub fn new(type_: NodeAddressType, address: impl Into<String>) -> Self {
        Self {
            type_,
            address: address.into(),
        }
    }
}

impl Machine {
    /// Cluster the Machine belongs to.
    ///
    /// Reads [`MACHINE_CLUSTER_ID_LABEL`] and falls back to
    /// [`UPSTREAM_CLUSTER_ID_LABEL`]. Empty values count as absent.
    pub fn cluster_id(&self) -> Option<&str> {
        let labels = self.metadata.labels.as_ref()?;
        [MACHINE_CLUSTER_ID_LABEL, UPSTREAM_CLUSTER_ID_LABEL]
            .into_iter()
            .filter_map(|key| labels.get(key))
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }

    /// Provider ID if set and non-empty
    pub fn provider_id(&self) -> Option<&str> {
        self.spec.provider_id.as_deref().filter(|p| !p.is_empty())
    }

    /// Namespace, "default" when unset
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }
}
