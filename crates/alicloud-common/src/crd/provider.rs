//! Alibaba Cloud provider configuration carried in `spec.providerSpec.value`

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A key/value tag
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
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

/// How a cloud resource is located.
///
/// Internally tagged by `type`. The payload field is optional on the wire so
/// a reference naming a mode without its value still decodes; resolving such
/// a reference is a configuration error.
///
/// ```yaml
/// securityGroups:
///   - type: ID
///     id: sg-h8ympu5av8hhtwks
///   - type: Tags
///     tags:
///       - Key: Name
///         Value: prod-7xk2p-sg-worker
/// resourceGroup:
///   type: Name
///   name: prod-rg
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(tag = "type")]
pub enum ResourceReference {
    /// A literal resource ID
    #[serde(rename = "ID")]
    Id {
        /// Resource ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Every resource carrying all of the tags
    Tags {
        /// Tag predicate
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<Tag>>,
    },
    /// The resource with this exact name
    Name {
        /// Resource name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ResourceReference {
    /// Reference by ID
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id {
            id: Some(id.into()),
        }
    }

    /// Reference by tags
    pub fn tags(tags: Vec<Tag>) -> Self {
        Self::Tags { tags: Some(tags) }
    }

    /// Reference by name
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name {
            name: Some(name.into()),
        }
    }

    /// Mode name as written in the manifest
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Id { .. } => "ID",
            Self::Tags { .. } => "Tags",
            Self::Name { .. } => "Name",
        }
    }
}

/// Tenancy of the instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum InstanceTenancy {
    /// Unset; launched as [`InstanceTenancy::Default`]
    #[default]
    Unset,
    /// Shared hardware
    Default,
    /// Dedicated host
    Host,
    /// Anything else, rejected at launch
    Other(String),
}

impl InstanceTenancy {
    /// Value as written in the manifest
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unset => "",
            Self::Default => "Default",
            Self::Host => "Host",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for InstanceTenancy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" => Self::Unset,
            "Default" => Self::Default,
            "Host" => Self::Host,
            _ => Self::Other(s),
        }
    }
}

impl From<InstanceTenancy> for String {
    fn from(t: InstanceTenancy) -> Self {
        t.as_str().to_string()
    }
}

/// Whether a data disk is encrypted
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum DiskEncryption {
    /// Encrypted
    Enabled,
    /// Not encrypted
    #[default]
    Disabled,
}

/// What happens to a data disk when the instance is released
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum DiskPreservation {
    /// Released with the instance
    DeleteWithInstance,
    /// Kept after the instance is released
    #[default]
    PreserveDisk,
}

/// System disk configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemDiskProperties {
    /// Disk category (e.g. "cloud_essd")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// ESSD performance level (e.g. "PL1")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub performance_level: String,
    /// Disk name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Size in GiB, service default when zero
    #[serde(default)]
    pub size: i64,
}

/// Data disk configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataDiskProperties {
    /// Disk name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Snapshot the disk starts from
    #[serde(default, rename = "snapshotID", skip_serializing_if = "String::is_empty")]
    pub snapshot_id: String,
    /// Size in GiB
    #[serde(default)]
    pub size: i64,
    /// Encryption
    #[serde(default)]
    pub disk_encryption: DiskEncryption,
    /// ESSD performance level
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub performance_level: String,
    /// Disk category
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// KMS key used for encryption
    #[serde(default, rename = "kmsKeyID", skip_serializing_if = "String::is_empty")]
    pub kms_key_id: String,
    /// Release behaviour
    #[serde(default)]
    pub disk_preservation: DiskPreservation,
}

/// Public bandwidth limits
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthProperties {
    /// Inbound limit in Mbit/s, service default when zero
    #[serde(default)]
    pub internet_max_bandwidth_in: i64,
    /// Outbound limit in Mbit/s; a public IP is allocated when positive
    #[serde(default)]
    pub internet_max_bandwidth_out: i64,
}

/// Reference to a Secret in the Machine's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct LocalSecretReference {
    /// Secret name
    pub name: String,
}

/// Desired shape of the ECS instance backing a Machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlibabaCloudMachineProviderConfig {
    /// API version of this object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of this object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Instance type (e.g. "ecs.g6.large")
    #[serde(default)]
    pub instance_type: String,

    /// VPC the instance joins
    #[serde(default)]
    pub vpc_id: String,

    /// Region
    #[serde(default)]
    pub region_id: String,

    /// Zone
    #[serde(default)]
    pub zone_id: String,

    /// Image, always a literal ID
    #[serde(default)]
    pub image_id: String,

    /// Data disks
    #[serde(default, rename = "dataDisk", skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<DataDiskProperties>,

    /// Security groups; every reference contributes its matches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<ResourceReference>,

    /// Public bandwidth
    #[serde(default)]
    pub bandwidth: BandwidthProperties,

    /// System disk
    #[serde(default)]
    pub system_disk: SystemDiskProperties,

    /// VSwitch for the primary network interface
    #[serde(default, rename = "vSwitch", skip_serializing_if = "Option::is_none")]
    pub vswitch: Option<ResourceReference>,

    /// RAM role attached to the instance
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ram_role_name: String,

    /// Resource group the instance is created in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<ResourceReference>,

    /// Tenancy
    #[serde(default)]
    #[schemars(with = "String")]
    pub tenancy: InstanceTenancy,

    /// Secret holding the `userData` key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_secret: Option<LocalSecretReference>,

    /// Secret holding cloud credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<LocalSecretReference>,

    /// Extra tags for the instance
    #[serde(default, rename = "tag", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}
