//! ECS instance lifecycle
//!
//! Launching, looking up, stopping and releasing the instances that back a
//! Machine. Instances are owned by a machine when they carry its cluster
//! ownership tag and its `Name` tag; several may exist after a partial
//! failure, and callers decide which one wins with
//! [`sort_instances_by_launch_time_desc`].

use std::cmp::Reverse;

use alicloud_common::crd::{
    AlibabaCloudMachineProviderConfig, DiskEncryption, DiskPreservation, InstanceTenancy, Machine,
};
use alicloud_common::metrics::{record_failed_instance_create, MachineLabels};
use alicloud_common::poll::{wait_for_result, PollOptions, PollStep};
use alicloud_common::{Error, Result};
use alicloud_ecs::{
    DataDiskRequest, DeleteInstancesRequest, DescribeInstancesRequest, EcsClient, Instance,
    InstanceResponse, InstanceStatus, RunInstancesRequest, StopInstancesRequest,
    SystemDiskRequest, TagResourcesRequest, TAG_RESOURCE_TYPE_INSTANCE,
};
use chrono::{DateTime, NaiveDateTime};
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::resolver::Resolver;
use crate::tags::{
    build_tag_list, cluster_tag_filter, cluster_tag_key, tag_resource_tags, to_ecs_tags,
    CLUSTER_TAG_VALUE, NAME_TAG_KEY, OWNED_TAG_KEY, OWNED_TAG_VALUE,
};

/// Layouts of `Instance::start_time`. DescribeInstances reports minutes
/// (`2024-05-02T17:04Z`), some regions add seconds.
pub const START_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%SZ"];

/// Tenancy sent when the provider config leaves it unset
const DEFAULT_TENANCY: &str = "Default";

/// States in which an instance still counts as backing its machine
pub fn supported_instance_states() -> Vec<InstanceStatus> {
    vec![
        InstanceStatus::Pending,
        InstanceStatus::Starting,
        InstanceStatus::Running,
        InstanceStatus::Stopping,
        InstanceStatus::Stopped,
    ]
}

/// Launch the instance for `machine` and wait until it is `Running`.
///
/// Resolver failures are configuration errors. A failed launch or wait is a
/// create error and is counted in the create-failure metric.
pub async fn create_instance(
    machine: &Machine,
    config: &AlibabaCloudMachineProviderConfig,
    user_data: &str,
    client: &dyn EcsClient,
    poll: &PollOptions,
    cancel: &CancellationToken,
) -> Result<Instance> {
    let name = machine.name_any();
    let namespace = machine.namespace_or_default();
    let resolver = Resolver::new(&name, &namespace, config, client);

    let image_id = resolver
        .image_id()
        .await
        .map_err(|e| Error::invalid_configuration(&name, format!("error getting ImageID: {e}")))?;

    let security_group_ids = resolver.security_group_ids().await.map_err(|e| {
        Error::invalid_configuration(&name, format!("error getting security groups ID: {e}"))
    })?;

    let vswitch_id = resolver
        .vswitch_id()
        .await
        .map_err(|e| Error::invalid_configuration(&name, format!("error getting vswitch ID: {e}")))?;

    let Some(cluster_id) = machine.cluster_id() else {
        error!(machine = %name, "unable to get cluster ID");
        return Err(Error::invalid_configuration(
            &name,
            format!("Unable to get cluster ID for machine: {name:?}"),
        ));
    };

    let resource_group_id = resolver.resource_group_id().await.map_err(|e| {
        error!(machine = %name, error = %e, "unable to determine resource group ID");
        Error::invalid_configuration(&name, format!("error getting resource group ID: {e}"))
    })?;

    let tenancy = match &config.tenancy {
        InstanceTenancy::Unset => DEFAULT_TENANCY.to_string(),
        t @ (InstanceTenancy::Default | InstanceTenancy::Host) => t.as_str().to_string(),
        InstanceTenancy::Other(other) => {
            return Err(Error::create_machine(
                &name,
                format!("invalid instance tenancy: {other}. Allowed options are: Default,Host"),
            ));
        }
    };

    let request = RunInstancesRequest {
        region_id: config.region_id.clone(),
        zone_id: config.zone_id.clone(),
        image_id,
        instance_type: config.instance_type.clone(),
        security_group_ids,
        vswitch_id,
        resource_group_id,
        instance_name: name.clone(),
        host_name: name.clone(),
        amount: 1,
        min_amount: 1,
        ram_role_name: non_empty(&config.ram_role_name),
        internet_max_bandwidth_out: Some(config.bandwidth.internet_max_bandwidth_out)
            .filter(|b| *b > 0),
        internet_max_bandwidth_in: Some(config.bandwidth.internet_max_bandwidth_in)
            .filter(|b| *b != 0),
        system_disk: SystemDiskRequest {
            category: config.system_disk.category.clone(),
            size: Some(config.system_disk.size).filter(|s| *s > 0),
            disk_name: non_empty(&config.system_disk.name),
            performance_level: non_empty(&config.system_disk.performance_level),
        },
        data_disks: config
            .data_disks
            .iter()
            .map(|disk| DataDiskRequest {
                size: disk.size,
                category: disk.category.clone(),
                encrypted: disk.disk_encryption == DiskEncryption::Enabled,
                disk_name: non_empty(&disk.name),
                snapshot_id: non_empty(&disk.snapshot_id),
                performance_level: non_empty(&disk.performance_level),
                kms_key_id: non_empty(&disk.kms_key_id),
                delete_with_instance: (disk.disk_preservation
                    == DiskPreservation::DeleteWithInstance)
                    .then_some(true),
            })
            .collect(),
        user_data: non_empty(user_data),
        tenancy,
        tags: to_ecs_tags(&build_tag_list(&name, cluster_id, &config.tags)),
    };

    let labels = |reason: String| MachineLabels::new(&name, &namespace, reason);

    let response = client.run_instances(request).await.map_err(|e| {
        record_failed_instance_create(&labels(e.to_string()));
        error!(machine = %name, error = %e, "error creating ECS instance");
        Error::create_machine(&name, format!("error creating ECS instance: {e}"))
    })?;

    let [instance_id] = response.instance_ids.as_slice() else {
        error!(
            machine = %name,
            instance_ids = ?response.instance_ids,
            "unexpected reservation creating instance"
        );
        return Err(Error::create_machine(
            &name,
            "unexpected reservation creating instance",
        ));
    };
    info!(machine = %name, instance_id = %instance_id, "instance launched, waiting for Running");

    let mut running = wait_for_instances_status(
        client,
        &config.region_id,
        std::slice::from_ref(instance_id),
        InstanceStatus::Running,
        poll,
        cancel,
    )
    .await
    .map_err(|e| {
        record_failed_instance_create(&labels(e.to_string()));
        error!(machine = %name, instance_id = %instance_id, error = %e, "error waiting for instance");
        Error::create_machine(&name, format!("error waiting ECS instance to Running: {e}"))
    })?;

    running.pop().ok_or_else(|| {
        Error::create_machine(&name, format!("ECS instance {instance_id} not found"))
    })
}

/// Wait until every instance in `ids` reports `status`.
///
/// Instances that are not visible yet keep the wait going; the wait ends
/// only on success, the deadline or cancellation.
pub async fn wait_for_instances_status(
    client: &dyn EcsClient,
    region: &str,
    ids: &[String],
    status: InstanceStatus,
    poll: &PollOptions,
    cancel: &CancellationToken,
) -> Result<Vec<Instance>> {
    let name = format!("the instances {ids:?} state to change to {status}");
    let status = &status;

    wait_for_result(&name, poll, cancel, || async move {
        let instances = describe_instances(ids, region, client).await?;
        if instances.is_empty() {
            debug!(?ids, "instances not visible yet");
            return Ok(PollStep::Pending);
        }

        let matched: Vec<Instance> = instances
            .into_iter()
            .filter(|i| i.has_status(status))
            .collect();
        if matched.len() == ids.len() {
            Ok(PollStep::Done(matched))
        } else {
            Ok(PollStep::Pending)
        }
    })
    .await
}

/// Describe instances by ID.
///
/// A `*.NotFound` answer means none of `ids` exists any more.
pub async fn describe_instances(
    ids: &[String],
    region: &str,
    client: &dyn EcsClient,
) -> Result<Vec<Instance>> {
    if ids.is_empty() {
        return Err(Error::cloud("DescribeInstances", "instance-ids not specified"));
    }

    let result = client
        .describe_instances(DescribeInstancesRequest {
            region_id: region.to_string(),
            instance_ids: ids.to_vec(),
            tags: Vec::new(),
        })
        .await;
    match result {
        Ok(response) => Ok(response.instances),
        Err(e) if e.is_not_found() => {
            debug!(ids = ?ids, error = %e, "instances not found");
            Ok(Vec::new())
        }
        Err(e) => Err(Error::cloud("DescribeInstances", e.to_string())),
    }
}

/// The instance with `id`, which must be in one of `allowed` states
pub async fn get_instance_by_id(
    id: &str,
    region: &str,
    client: &dyn EcsClient,
    allowed: &[InstanceStatus],
) -> Result<Instance> {
    if id.is_empty() {
        return Err(Error::cloud("DescribeInstances", "instance-id not specified"));
    }

    let mut instances = describe_instances(&[id.to_string()], region, client).await?;
    if instances.len() != 1 {
        return Err(Error::cloud(
            "DescribeInstances",
            format!("found {} instances for instance-id {id}", instances.len()),
        ));
    }

    let instance = instances.remove(0);
    instance_has_supported_state(&instance, allowed)?;
    Ok(instance)
}

/// The instance with `id` if it has not been released
pub async fn get_existing_instance_by_id(
    id: &str,
    region: &str,
    client: &dyn EcsClient,
) -> Result<Instance> {
    get_instance_by_id(id, region, client, &supported_instance_states()).await
}

/// Check that `instance` has an ID, a status, and a status in `allowed`.
///
/// An empty `allowed` accepts every status.
pub fn instance_has_supported_state(instance: &Instance, allowed: &[InstanceStatus]) -> Result<()> {
    if instance.instance_id.is_empty() {
        return Err(Error::cloud("DescribeInstances", "instance has nil ID"));
    }

    let status = instance.status_str();
    if status.is_empty() {
        return Err(Error::cloud(
            "DescribeInstances",
            format!("instance {} has nil state", instance.instance_id),
        ));
    }

    if allowed.is_empty() || allowed.iter().any(|s| s.as_str() == status) {
        return Ok(());
    }

    let allowed: Vec<&str> = allowed.iter().map(InstanceStatus::as_str).collect();
    Err(Error::cloud(
        "DescribeInstances",
        format!(
            "instance {} state {status:?} is not in {}",
            instance.instance_id,
            allowed.join(", ")
        ),
    ))
}

/// Instances tagged as belonging to `machine` whose state is in `allowed`.
///
/// Instances in other states are logged and skipped.
pub async fn get_instances(
    machine: &Machine,
    region: &str,
    client: &dyn EcsClient,
    allowed: &[InstanceStatus],
) -> Result<Vec<Instance>> {
    let name = machine.name_any();
    let Some(cluster_id) = machine.cluster_id() else {
        return Err(Error::invalid_configuration(
            &name,
            format!("unable to get cluster ID for machine: {name:?}"),
        ));
    };

    let response = client
        .describe_instances(DescribeInstancesRequest {
            region_id: region.to_string(),
            instance_ids: Vec::new(),
            tags: cluster_tag_filter(cluster_id, &name),
        })
        .await
        .map_err(|e| Error::cloud("DescribeInstances", e.to_string()))?;

    Ok(response
        .instances
        .into_iter()
        .filter(|instance| match instance_has_supported_state(instance, allowed) {
            Ok(()) => true,
            Err(e) => {
                warn!(machine = %name, error = %e, "excluding instance");
                false
            }
        })
        .collect())
}

/// Instances of `machine` that have not been released
pub async fn get_existing_instances(
    machine: &Machine,
    region: &str,
    client: &dyn EcsClient,
) -> Result<Vec<Instance>> {
    get_instances(machine, region, client, &supported_instance_states()).await
}

/// Stop every instance in `instances` that is currently `Running`.
///
/// The instances are described again first; only those still `Running` are
/// stopped, with one request. Nothing is sent when none is running.
pub async fn stop_instances(
    client: &dyn EcsClient,
    region: &str,
    instances: &[Instance],
) -> Result<Vec<InstanceResponse>> {
    let ids: Vec<String> = instances
        .iter()
        .map(|instance| {
            info!(
                instance_id = %instance.instance_id,
                status = %instance.status_str(),
                launch_time = %instance.start_time,
                "cleaning up instance"
            );
            instance.instance_id.clone()
        })
        .collect();

    let existing = describe_instances(&ids, region, client).await.map_err(|e| {
        error!(error = %e, "failed to describe instances");
        e
    })?;
    if existing.is_empty() {
        return Err(Error::cloud(
            "DescribeInstances",
            format!("instances {ids:?} not exist"),
        ));
    }

    let running: Vec<String> = existing
        .into_iter()
        .filter(|i| i.has_status(&InstanceStatus::Running))
        .map(|i| i.instance_id)
        .collect();
    if running.is_empty() {
        return Ok(Vec::new());
    }
    info!(instance_ids = ?running, "stopping instances");

    let response = client
        .stop_instances(StopInstancesRequest {
            region_id: region.to_string(),
            instance_ids: running,
        })
        .await
        .map_err(|e| {
            error!(error = %e, "error stopping instances");
            Error::cloud("StopInstances", format!("error stopping instances: {e}"))
        })?;

    Ok(response.instance_responses)
}

/// Stop `instances`, wait for the stopped ones to reach `Stopped`, then
/// release all of them.
///
/// Returns the per-instance results of the stop request.
pub async fn delete_instances(
    client: &dyn EcsClient,
    region: &str,
    instances: &[Instance],
    poll: &PollOptions,
    cancel: &CancellationToken,
) -> Result<Vec<InstanceResponse>> {
    if instances.is_empty() {
        return Ok(Vec::new());
    }

    let stopped = stop_instances(client, region, instances).await?;
    let stopped_ids: Vec<String> = stopped.iter().map(|r| r.instance_id.clone()).collect();
    if !stopped_ids.is_empty() {
        wait_for_instances_status(
            client,
            region,
            &stopped_ids,
            InstanceStatus::Stopped,
            poll,
            cancel,
        )
        .await?;
    }

    let ids: Vec<String> = instances.iter().map(|i| i.instance_id.clone()).collect();
    info!(instance_ids = ?ids, "releasing instances");
    client
        .delete_instances(DeleteInstancesRequest {
            region_id: region.to_string(),
            instance_ids: ids,
            force: true,
        })
        .await
        .map_err(|e| Error::cloud("DeleteInstances", format!("error deleting instances: {e}")))?;

    Ok(stopped)
}

/// Sort newest first.
///
/// Instances without a start time have just been created and come first.
/// Start times that do not parse are never newer than anything and go last.
/// The sort is stable.
pub fn sort_instances_by_launch_time_desc(instances: &mut [Instance]) {
    instances.sort_by_key(launch_order);
}

fn launch_order(instance: &Instance) -> (u8, Reverse<Option<NaiveDateTime>>) {
    if instance.start_time.is_empty() {
        return (0, Reverse(None));
    }
    match parse_start_time(&instance.start_time) {
        Some(t) => (1, Reverse(Some(t))),
        None => (2, Reverse(None)),
    }
}

fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    START_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|t| t.naive_utc())
        })
}

/// The `Running` members of `instances`
pub fn running_instances(instances: &[Instance]) -> Vec<&Instance> {
    instances
        .iter()
        .filter(|i| i.has_status(&InstanceStatus::Running))
        .collect()
}

/// Restore the ownership tags of `instance` if any is missing or wrong.
///
/// TagResources only adds or replaces the tags it names, so unrelated tags
/// on the instance survive.
pub async fn correct_existing_tags(
    machine: &Machine,
    region: &str,
    instance: &Instance,
    client: &dyn EcsClient,
) -> Result<()> {
    let name = machine.name_any();
    if instance.instance_id.is_empty() {
        return Err(Error::internal_with_context(
            "tags",
            "unexpected instance without an ID",
        ));
    }
    let Some(cluster_id) = machine.cluster_id() else {
        return Err(Error::invalid_configuration(
            &name,
            format!("unable to get cluster ID for machine: {name:?}"),
        ));
    };

    let cluster_key = cluster_tag_key(cluster_id);
    let name_ok = instance.tag(NAME_TAG_KEY) == Some(name.as_str());
    let cluster_ok = instance.tag(&cluster_key) == Some(CLUSTER_TAG_VALUE);
    let owned_ok = instance.tag(OWNED_TAG_KEY) == Some(OWNED_TAG_VALUE);
    if name_ok && cluster_ok && owned_ok {
        return Ok(());
    }

    info!(
        machine = %name,
        instance_id = %instance.instance_id,
        "invalid or missing instance tags, updating"
    );
    client
        .tag_resources(TagResourcesRequest {
            region_id: region.to_string(),
            resource_type: TAG_RESOURCE_TYPE_INSTANCE.to_string(),
            resource_ids: vec![instance.instance_id.clone()],
            tags: tag_resource_tags(cluster_id, &name),
        })
        .await
        .map_err(|e| Error::cloud("TagResources", e.to_string()))?;

    Ok(())
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
