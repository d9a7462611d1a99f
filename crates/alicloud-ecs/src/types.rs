//! Request and response model for the cloud client

use std::fmt;

use serde::{Deserialize, Serialize};

/// A key/value tag on a cloud resource
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key (case sensitive)
    #[serde(alias = "TagKey")]
    pub key: String,
    /// Tag value
    #[serde(alias = "TagValue")]
    pub value: String,
}

impl Tag {
    /// Create a tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Lifecycle status reported for an ECS instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    /// Being created
    Pending,
    /// Booting
    Starting,
    /// Running
    Running,
    /// Shutting down
    Stopping,
    /// Stopped, still billed for disks
    Stopped,
    /// Released; the instance is gone
    Released,
    /// Any status string this crate does not know
    Other(String),
}

impl InstanceStatus {
    /// Status string as reported by ECS
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Released => "Released",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for InstanceStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => Self::Pending,
            "Starting" => Self::Starting,
            "Running" => Self::Running,
            "Stopping" => Self::Stopping,
            "Stopped" => Self::Stopped,
            "Released" => Self::Released,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for InstanceStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network interface attached to an instance
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkInterface {
    /// ENI ID
    pub network_interface_id: String,
    /// Primary private IPv4 address
    pub primary_ip_address: String,
    /// All private IPv4 addresses, primary included
    pub private_ip_addresses: Vec<String>,
    /// IPv6 addresses as reported by the service (not necessarily canonical)
    pub ipv6_addresses: Vec<String>,
}

/// An ECS instance as returned by DescribeInstances
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Instance {
    /// Instance ID (e.g. "i-bp67acfmxazb4p****")
    pub instance_id: String,
    /// Display name
    pub instance_name: String,
    /// Guest hostname
    pub host_name: String,
    /// Region
    pub region_id: String,
    /// Zone
    pub zone_id: String,
    /// Image the instance was launched from
    pub image_id: String,
    /// Instance type (e.g. "ecs.g6.large")
    pub instance_type: String,
    /// Lifecycle status, absent when the service did not report one
    pub status: Option<InstanceStatus>,
    /// Launch time, "2006-01-02T15:04:05Z" layout, empty when unknown
    pub start_time: String,
    /// Tags on the instance
    pub tags: Vec<Tag>,
    /// Attached network interfaces
    pub network_interfaces: Vec<NetworkInterface>,
    /// Public IPv4 addresses
    pub public_ip_addresses: Vec<String>,
}

impl Instance {
    /// Status string, empty when the instance has no status
    pub fn status_str(&self) -> &str {
        self.status.as_ref().map(InstanceStatus::as_str).unwrap_or("")
    }

    /// Whether the instance reports the given status
    pub fn has_status(&self, status: &InstanceStatus) -> bool {
        self.status.as_ref() == Some(status)
    }

    /// Value of the tag with the given key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// System disk shape for RunInstances
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemDiskRequest {
    /// Disk category (e.g. "cloud_essd")
    pub category: String,
    /// Size in GiB, service default when unset
    pub size: Option<i64>,
    /// Disk name
    pub disk_name: Option<String>,
    /// ESSD performance level
    pub performance_level: Option<String>,
}

/// Data disk shape for RunInstances
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataDiskRequest {
    /// Size in GiB
    pub size: i64,
    /// Disk category
    pub category: String,
    /// Encrypt the disk
    pub encrypted: bool,
    /// Disk name
    pub disk_name: Option<String>,
    /// Snapshot to create the disk from
    pub snapshot_id: Option<String>,
    /// ESSD performance level
    pub performance_level: Option<String>,
    /// KMS key for encryption
    pub kms_key_id: Option<String>,
    /// Release the disk together with the instance
    pub delete_with_instance: Option<bool>,
}

/// RunInstances request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunInstancesRequest {
    /// Region
    pub region_id: String,
    /// Zone, service picks one when empty
    pub zone_id: String,
    /// Image
    pub image_id: String,
    /// Instance type
    pub instance_type: String,
    /// Security groups the primary ENI joins
    pub security_group_ids: Vec<String>,
    /// VSwitch for the primary ENI
    pub vswitch_id: String,
    /// Resource group, account default when empty
    pub resource_group_id: String,
    /// Display name
    pub instance_name: String,
    /// Guest hostname
    pub host_name: String,
    /// Number of instances to create
    pub amount: u32,
    /// Minimum number of instances; fewer fails the whole call
    pub min_amount: u32,
    /// RAM role attached to the instance
    pub ram_role_name: Option<String>,
    /// Outbound public bandwidth in Mbit/s
    pub internet_max_bandwidth_out: Option<i64>,
    /// Inbound public bandwidth in Mbit/s
    pub internet_max_bandwidth_in: Option<i64>,
    /// System disk
    pub system_disk: SystemDiskRequest,
    /// Data disks
    pub data_disks: Vec<DataDiskRequest>,
    /// Base64 encoded user data
    pub user_data: Option<String>,
    /// "default" or "host"
    pub tenancy: String,
    /// Tags applied at creation
    pub tags: Vec<Tag>,
}

/// RunInstances response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RunInstancesResponse {
    /// Request ID
    pub request_id: String,
    /// IDs of the created instances
    pub instance_ids: Vec<String>,
}

/// DescribeInstances request. IDs and tags combine as a conjunction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesRequest {
    /// Region
    pub region_id: String,
    /// Restrict to these IDs
    pub instance_ids: Vec<String>,
    /// Restrict to instances carrying all of these tags
    pub tags: Vec<Tag>,
}

/// DescribeInstances response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeInstancesResponse {
    /// Request ID
    pub request_id: String,
    /// Matching instances
    pub instances: Vec<Instance>,
}

/// DescribeImages request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeImagesRequest {
    /// Region
    pub region_id: String,
    /// Image ID
    pub image_id: String,
    /// Include images past their expiry
    pub show_expired: bool,
}

/// An image
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Image {
    /// Image ID
    pub image_id: String,
    /// Image name
    pub image_name: String,
    /// Image status (e.g. "Available", "Creating", "UnAvailable")
    pub status: String,
}

/// DescribeImages response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeImagesResponse {
    /// Request ID
    pub request_id: String,
    /// Matching images
    pub images: Vec<Image>,
}

/// DescribeSecurityGroups request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupsRequest {
    /// Region
    pub region_id: String,
    /// VPC the groups belong to
    pub vpc_id: String,
    /// Tags every returned group carries
    pub tags: Vec<Tag>,
}

/// A security group
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityGroup {
    /// Security group ID
    pub security_group_id: String,
    /// Security group name
    pub security_group_name: String,
    /// VPC
    pub vpc_id: String,
}

/// DescribeSecurityGroups response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeSecurityGroupsResponse {
    /// Request ID
    pub request_id: String,
    /// Matching groups
    pub security_groups: Vec<SecurityGroup>,
}

/// DescribeVSwitches request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeVSwitchesRequest {
    /// Region
    pub region_id: String,
    /// VPC the VSwitches belong to
    pub vpc_id: String,
    /// Tags every returned VSwitch carries
    pub tags: Vec<Tag>,
}

/// A VSwitch
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VSwitch {
    /// VSwitch ID
    #[serde(rename = "VSwitchId")]
    pub vswitch_id: String,
    /// VSwitch name
    #[serde(rename = "VSwitchName")]
    pub vswitch_name: String,
    /// Zone
    pub zone_id: String,
    /// VPC
    pub vpc_id: String,
}

/// DescribeVSwitches response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeVSwitchesResponse {
    /// Request ID
    pub request_id: String,
    /// Matching VSwitches
    #[serde(rename = "VSwitches")]
    pub vswitches: Vec<VSwitch>,
}

/// ListResourceGroups request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResourceGroupsRequest {
    /// Region
    pub region_id: String,
    /// Exact resource group name
    pub name: String,
}

/// A resource group
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ResourceGroup {
    /// Resource group ID
    pub id: String,
    /// Unique name
    pub name: String,
    /// Display name
    pub display_name: String,
    /// Status (e.g. "OK")
    pub status: String,
}

/// ListResourceGroups response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListResourceGroupsResponse {
    /// Request ID
    pub request_id: String,
    /// Matching groups
    pub resource_groups: Vec<ResourceGroup>,
}

/// TagResources request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagResourcesRequest {
    /// Region
    pub region_id: String,
    /// Resource type (e.g. "instance")
    pub resource_type: String,
    /// Resources to tag
    pub resource_ids: Vec<String>,
    /// Tags to add or replace
    pub tags: Vec<Tag>,
}

/// TagResources response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TagResourcesResponse {
    /// Request ID
    pub request_id: String,
}

/// StopInstances request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopInstancesRequest {
    /// Region
    pub region_id: String,
    /// Instances to stop
    pub instance_ids: Vec<String>,
}

/// Per-instance result of a batched call
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceResponse {
    /// Instance ID
    pub instance_id: String,
    /// Result code ("200" on success)
    pub code: String,
    /// Result message
    pub message: String,
    /// Status before the call
    pub previous_status: String,
    /// Status after the call
    pub current_status: String,
}

/// StopInstances response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StopInstancesResponse {
    /// Request ID
    pub request_id: String,
    /// Per-instance results
    pub instance_responses: Vec<InstanceResponse>,
}

/// DeleteInstances request
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteInstancesRequest {
    /// Region
    pub region_id: String,
    /// Instances to release
    pub instance_ids: Vec<String>,
    /// Release even if running
    pub force: bool,
}

/// DeleteInstances response
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeleteInstancesResponse {
    /// Request ID
    pub request_id: String,
}
