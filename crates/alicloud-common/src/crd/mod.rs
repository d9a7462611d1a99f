//! Custom resource types the actuator reads and writes
//!
//! The Machine CRD itself, the Alibaba Cloud provider config and status that
//! travel inside it, and the codec converting between the two.

mod codec;
mod machine;
mod provider;
mod status;

pub use codec::{
    ProviderSpecCodec, TypeKey, PROVIDER_API_VERSION, PROVIDER_CONFIG_KIND, PROVIDER_STATUS_KIND,
};
pub use machine::{
    Machine, MachineObjectMeta, MachineSpec, MachineStatus, NodeAddress, NodeAddressType,
    ProviderSpec, INSTANCE_STATE_ANNOTATION, INSTANCE_TYPE_LABEL, MACHINE_CLUSTER_ID_LABEL,
    REGION_LABEL, UPSTREAM_CLUSTER_ID_LABEL, ZONE_LABEL,
};
pub use provider::{
    AlibabaCloudMachineProviderConfig, BandwidthProperties, DataDiskProperties, DiskEncryption,
    DiskPreservation, InstanceTenancy, LocalSecretReference, ResourceReference,
    SystemDiskProperties, Tag,
};
pub use status::{
    AlibabaCloudMachineProviderStatus, Condition, ConditionStatus, MACHINE_CREATION_CONDITION,
    MACHINE_CREATION_FAILED, MACHINE_CREATION_SUCCEEDED,
};
