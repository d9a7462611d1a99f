//! In-memory cloud, store and event recorder shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alicloud_common::crd::Machine;
use alicloud_common::events::EventPublisher;
use alicloud_common::Result;
use alicloud_ecs::*;
use alicloud_machine::{Actuator, ActuatorConfig, MachineStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use k8s_openapi::ByteString;
use kube::runtime::events::EventType;

pub const MACHINE_YAML: &str = r#"
apiVersion: machine.openshift.io/v1beta1
kind: Machine
metadata:
  name: worker-0
  namespace: openshift-machine-api
  labels:
    machine.openshift.io/cluster-api-cluster: prod-7xk2p
spec:
  providerSpec:
    value:
      apiVersion: machine.openshift.io/v1
      kind: AlibabaCloudMachineProviderConfig
      instanceType: ecs.g6.large
      imageId: aliyun_3_x64_20G_alibase_20230727.vhd
      regionId: cn-beijing
      zoneId: cn-beijing-f
      vpcId: vpc-1
      vSwitch:
        type: Tags
        tags:
          - Key: Name
            Value: prod-7xk2p-vsw-f
      securityGroups:
        - type: Tags
          tags:
            - Key: Name
              Value: prod-7xk2p-sg-worker
      resourceGroup:
        type: Name
        name: prod-rg
      systemDisk:
        category: cloud_essd
        size: 120
      userDataSecret:
        name: worker-user-data
      credentialsSecret:
        name: alibabacloud-credentials
      tag:
        - Key: team
          Value: infra
"#;

#[derive(Default)]
pub struct FakeCloud {
    instances: Mutex<Vec<Instance>>,
    next_id: AtomicUsize,
    hold_pending: AtomicBool,
}

impl FakeCloud {
    /// Launch new instances as `Pending` and leave them there
    pub fn hold_pending(&self) {
        self.hold_pending.store(true, Ordering::SeqCst);
    }

    pub fn instances(&self) -> Vec<Instance> {
        self.instances.lock().unwrap().clone()
    }
}

fn carries_all(instance: &Instance, tags: &[Tag]) -> bool {
    tags.iter()
        .all(|t| instance.tag(&t.key) == Some(t.value.as_str()))
}

#[async_trait]
impl EcsClient for FakeCloud {
    async fn run_instances(
        &self,
        request: RunInstancesRequest,
    ) -> std::result::Result<RunInstancesResponse, EcsError> {
        let id = format!("i-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let status = if self.hold_pending.load(Ordering::SeqCst) {
            InstanceStatus::Pending
        } else {
            InstanceStatus::Running
        };
        self.instances.lock().unwrap().push(Instance {
            instance_id: id.clone(),
            instance_name: request.instance_name,
            host_name: request.host_name,
            region_id: request.region_id,
            zone_id: request.zone_id,
            image_id: request.image_id,
            instance_type: request.instance_type,
            status: Some(status),
            start_time: "2024-05-02T17:04:05Z".into(),
            tags: request.tags,
            network_interfaces: vec![NetworkInterface {
                network_interface_id: format!("eni-{id}"),
                primary_ip_address: "192.168.1.10".into(),
                private_ip_addresses: vec!["192.168.1.10".into()],
                ipv6_addresses: vec![],
            }],
            public_ip_addresses: vec![],
        });
        Ok(RunInstancesResponse {
            request_id: "run".into(),
            instance_ids: vec![id],
        })
    }

    async fn describe_instances(
        &self,
        request: DescribeInstancesRequest,
    ) -> std::result::Result<DescribeInstancesResponse, EcsError> {
        let instances = self
            .instances()
            .into_iter()
            .filter(|i| {
                request.instance_ids.is_empty() || request.instance_ids.contains(&i.instance_id)
            })
            .filter(|i| carries_all(i, &request.tags))
            .collect();
        Ok(DescribeInstancesResponse {
            request_id: "describe".into(),
            instances,
        })
    }

    async fn describe_images(
        &self,
        request: DescribeImagesRequest,
    ) -> std::result::Result<DescribeImagesResponse, EcsError> {
        Ok(DescribeImagesResponse {
            request_id: "images".into(),
            images: vec![Image {
                image_id: request.image_id,
                image_name: "aliyun".into(),
                status: IMAGE_STATUS_AVAILABLE.into(),
            }],
        })
    }

    async fn describe_security_groups(
        &self,
        _request: DescribeSecurityGroupsRequest,
    ) -> std::result::Result<DescribeSecurityGroupsResponse, EcsError> {
        Ok(DescribeSecurityGroupsResponse {
            request_id: "sg".into(),
            security_groups: vec![SecurityGroup {
                security_group_id: "sg-worker".into(),
                ..Default::default()
            }],
        })
    }

    async fn describe_vswitches(
        &self,
        _request: DescribeVSwitchesRequest,
    ) -> std::result::Result<DescribeVSwitchesResponse, EcsError> {
        Ok(DescribeVSwitchesResponse {
            request_id: "vsw".into(),
            vswitches: vec![VSwitch {
                vswitch_id: "vsw-f".into(),
                ..Default::default()
            }],
        })
    }

    async fn list_resource_groups(
        &self,
        request: ListResourceGroupsRequest,
    ) -> std::result::Result<ListResourceGroupsResponse, EcsError> {
        Ok(ListResourceGroupsResponse {
            request_id: "rg".into(),
            resource_groups: vec![ResourceGroup {
                id: "rg-prod".into(),
                name: request.name,
                ..Default::default()
            }],
        })
    }

    async fn tag_resources(
        &self,
        request: TagResourcesRequest,
    ) -> std::result::Result<TagResourcesResponse, EcsError> {
        let mut instances = self.instances.lock().unwrap();
        for instance in instances
            .iter_mut()
            .filter(|i| request.resource_ids.contains(&i.instance_id))
        {
            for tag in &request.tags {
                instance.tags.retain(|t| t.key != tag.key);
                instance.tags.push(tag.clone());
            }
        }
        Ok(TagResourcesResponse::default())
    }

    async fn stop_instances(
        &self,
        request: StopInstancesRequest,
    ) -> std::result::Result<StopInstancesResponse, EcsError> {
        let mut instances = self.instances.lock().unwrap();
        let mut responses = Vec::new();
        for instance in instances
            .iter_mut()
            .filter(|i| request.instance_ids.contains(&i.instance_id))
        {
            responses.push(InstanceResponse {
                instance_id: instance.instance_id.clone(),
                code: "200".into(),
                previous_status: instance.status_str().to_string(),
                current_status: "Stopping".into(),
                ..Default::default()
            });
            instance.status = Some(InstanceStatus::Stopped);
        }
        Ok(StopInstancesResponse {
            request_id: "stop".into(),
            instance_responses: responses,
        })
    }

    async fn delete_instances(
        &self,
        request: DeleteInstancesRequest,
    ) -> std::result::Result<DeleteInstancesResponse, EcsError> {
        assert!(request.force);
        self.instances
            .lock()
            .unwrap()
            .retain(|i| !request.instance_ids.contains(&i.instance_id));
        Ok(DeleteInstancesResponse::default())
    }
}

pub struct FakeBuilder(pub Arc<FakeCloud>);

#[async_trait]
impl EcsClientBuilder for FakeBuilder {
    async fn build(
        &self,
        credentials_secret: Option<String>,
        _namespace: &str,
        region: &str,
    ) -> std::result::Result<Arc<dyn EcsClient>, EcsError> {
        assert_eq!(credentials_secret.as_deref(), Some("alibabacloud-credentials"));
        assert_eq!(region, "cn-beijing");
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct FakeStore {
    machine: Mutex<Option<Machine>>,
}

impl FakeStore {
    pub fn current(&self) -> Machine {
        self.machine
            .lock()
            .unwrap()
            .clone()
            .expect("machine was written")
    }
}

#[async_trait]
impl MachineStore for FakeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        assert_eq!(namespace, "openshift-machine-api");
        if name != "worker-user-data" {
            return Ok(None);
        }
        Ok(Some(Secret {
            data: Some(BTreeMap::from([(
                "userData".to_string(),
                ByteString(b"{\"ignition\":{}}".to_vec()),
            )])),
            ..Default::default()
        }))
    }

    async fn patch_machine(&self, machine: &Machine) -> Result<Machine> {
        *self.machine.lock().unwrap() = Some(machine.clone());
        Ok(machine.clone())
    }

    async fn patch_machine_status(&self, machine: &Machine) -> Result<Machine> {
        *self.machine.lock().unwrap() = Some(machine.clone());
        Ok(machine.clone())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Mutex<Vec<(EventType, String, Option<String>)>>,
}

impl RecordingEvents {
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, reason, _)| reason.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.events
            .lock()
            .unwrap()
            .push((type_, reason.to_string(), note));
    }
}

pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub store: Arc<FakeStore>,
    pub events: Arc<RecordingEvents>,
    pub actuator: Actuator,
}

pub fn harness() -> Harness {
    let cloud = Arc::new(FakeCloud::default());
    let store = Arc::new(FakeStore::default());
    let events = Arc::new(RecordingEvents::default());
    let actuator = Actuator::builder(Arc::new(FakeBuilder(cloud.clone())), store.clone())
        .events(events.clone())
        .config(ActuatorConfig {
            instance_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
            ..ActuatorConfig::default()
        })
        .build();
    Harness {
        cloud,
        store,
        events,
        actuator,
    }
}

pub fn machine() -> Machine {
    serde_yaml::from_str(MACHINE_YAML).expect("fixture parses")
}
