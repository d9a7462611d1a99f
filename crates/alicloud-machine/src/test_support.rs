//! Mocks and fixtures shared by the unit tests of this crate

use std::collections::BTreeMap;
use std::sync::Arc;

use alicloud_common::crd::{
    AlibabaCloudMachineProviderConfig, LocalSecretReference, Machine, MachineSpec,
    ProviderSpecCodec, ResourceReference, SystemDiskProperties, Tag, MACHINE_CLUSTER_ID_LABEL,
};
use alicloud_ecs::*;
use kube::api::ObjectMeta;
use mockall::mock;

pub const STUB_NAMESPACE: &str = "openshift-machine-api";
pub const STUB_MACHINE_NAME: &str = "alibabacloud-actuator-testing-machine";
pub const STUB_CLUSTER_ID: &str = "alibabacloud-actuator-cluster";
pub const STUB_REGION_ID: &str = "cn-beijing";
pub const STUB_ZONE_ID: &str = "cn-beijing-f";
pub const STUB_INSTANCE_ID: &str = "i-bg2ss7v5ck5skyp9";
pub const STUB_IMAGE_ID: &str = "centos_7_9_x64_20G_alibase_20210318.vhd";
pub const STUB_VSWITCH_ID: &str = "vsw-sc0w64w2s3d9s8cu";
pub const STUB_SECURITY_GROUP_ID: &str = "sg-h8ympu5av8hhtwks";
pub const STUB_RESOURCE_GROUP_ID: &str = "rg-6ljxzbpksxaa0buw";
pub const STUB_USER_DATA_SECRET: &str = "worker-user-data-secret";
pub const STUB_CREDENTIALS_SECRET: &str = "alibabacloud-credentials-secret";

mock! {
    pub Ecs {}

    #[async_trait::async_trait]
    impl EcsClient for Ecs {
        async fn run_instances(&self, request: RunInstancesRequest) -> Result<RunInstancesResponse, EcsError>;
        async fn describe_instances(&self, request: DescribeInstancesRequest) -> Result<DescribeInstancesResponse, EcsError>;
        async fn describe_images(&self, request: DescribeImagesRequest) -> Result<DescribeImagesResponse, EcsError>;
        async fn describe_security_groups(&self, request: DescribeSecurityGroupsRequest) -> Result<DescribeSecurityGroupsResponse, EcsError>;
        async fn describe_vswitches(&self, request: DescribeVSwitchesRequest) -> Result<DescribeVSwitchesResponse, EcsError>;
        async fn list_resource_groups(&self, request: ListResourceGroupsRequest) -> Result<ListResourceGroupsResponse, EcsError>;
        async fn tag_resources(&self, request: TagResourcesRequest) -> Result<TagResourcesResponse, EcsError>;
        async fn stop_instances(&self, request: StopInstancesRequest) -> Result<StopInstancesResponse, EcsError>;
        async fn delete_instances(&self, request: DeleteInstancesRequest) -> Result<DeleteInstancesResponse, EcsError>;
    }
}

mock! {
    pub EcsBuilder {}

    #[async_trait::async_trait]
    impl EcsClientBuilder for EcsBuilder {
        async fn build(
            &self,
            credentials_secret: Option<String>,
            namespace: &str,
            region: &str,
        ) -> Result<Arc<dyn EcsClient>, EcsError>;
    }
}

/// Provider config resolving everything by literal ID
pub fn stub_provider_config() -> AlibabaCloudMachineProviderConfig {
    AlibabaCloudMachineProviderConfig {
        instance_type: "ecs.c6.2xlarge".into(),
        image_id: STUB_IMAGE_ID.into(),
        region_id: STUB_REGION_ID.into(),
        zone_id: STUB_ZONE_ID.into(),
        vpc_id: "vpc-vk6f1qfd3w77gnmh".into(),
        security_groups: vec![ResourceReference::id(STUB_SECURITY_GROUP_ID)],
        vswitch: Some(ResourceReference::id(STUB_VSWITCH_ID)),
        resource_group: Some(ResourceReference::id(STUB_RESOURCE_GROUP_ID)),
        system_disk: SystemDiskProperties {
            category: "cloud_essd".into(),
            size: 120,
            ..Default::default()
        },
        user_data_secret: Some(LocalSecretReference {
            name: STUB_USER_DATA_SECRET.into(),
        }),
        credentials_secret: Some(LocalSecretReference {
            name: STUB_CREDENTIALS_SECRET.into(),
        }),
        tags: vec![Tag::new("openshift-node-group-config", "node-config-master")],
        ..Default::default()
    }
}

/// Machine labelled with the stub cluster and carrying `config`
pub fn stub_machine_with(config: &AlibabaCloudMachineProviderConfig) -> Machine {
    let provider_spec = ProviderSpecCodec::default()
        .encode_provider_spec(config)
        .expect("stub provider config encodes");
    Machine {
        metadata: ObjectMeta {
            name: Some(STUB_MACHINE_NAME.into()),
            namespace: Some(STUB_NAMESPACE.into()),
            labels: Some(BTreeMap::from([(
                MACHINE_CLUSTER_ID_LABEL.to_string(),
                STUB_CLUSTER_ID.to_string(),
            )])),
            ..Default::default()
        },
        spec: MachineSpec {
            provider_spec,
            ..Default::default()
        },
        status: None,
    }
}

/// Machine carrying [`stub_provider_config`]
pub fn stub_machine() -> Machine {
    stub_machine_with(&stub_provider_config())
}

/// Instance owned by the stub machine
pub fn stub_instance(id: &str, status: InstanceStatus, start_time: &str) -> Instance {
    Instance {
        instance_id: id.into(),
        instance_name: STUB_MACHINE_NAME.into(),
        host_name: STUB_MACHINE_NAME.into(),
        region_id: STUB_REGION_ID.into(),
        zone_id: STUB_ZONE_ID.into(),
        image_id: STUB_IMAGE_ID.into(),
        instance_type: "ecs.c6.2xlarge".into(),
        status: Some(status),
        start_time: start_time.into(),
        tags: vec![
            alicloud_ecs::Tag::new(format!("kubernetes.io/cluster/{STUB_CLUSTER_ID}"), "owned"),
            alicloud_ecs::Tag::new("Name", STUB_MACHINE_NAME),
            alicloud_ecs::Tag::new("sigs.k8s.io/cloud-provider-alibaba/origin", "ocp"),
        ],
        network_interfaces: vec![NetworkInterface {
            network_interface_id: "eni-1".into(),
            primary_ip_address: "192.168.1.1".into(),
            private_ip_addresses: vec!["192.168.1.1".into()],
            ipv6_addresses: vec![],
        }],
        public_ip_addresses: vec![],
    }
}

/// DescribeInstances response holding `instances`
pub fn describe_response(instances: Vec<Instance>) -> DescribeInstancesResponse {
    DescribeInstancesResponse {
        request_id: "req".into(),
        instances,
    }
}
