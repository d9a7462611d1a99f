//! Machine reconciliation
//!
//! Drives one [`MachineScope`] towards its desired state. The reconciler
//! only mutates the scope; writing the Machine back is left to the caller so
//! that status is persisted even when a step fails.

use chrono::Utc;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use alicloud_common::crd::{Condition, MACHINE_CLUSTER_ID_LABEL};
use alicloud_common::{Error, Result};
use alicloud_ecs::{Instance, InstanceStatus};

use crate::addresses::derive_node_addresses;
use crate::config::ActuatorConfig;
use crate::instances::{
    correct_existing_tags, create_instance, delete_instances, get_existing_instance_by_id,
    get_existing_instances, running_instances, sort_instances_by_launch_time_desc, stop_instances,
};
use crate::scope::MachineScope;

/// Reconciles one machine
pub struct Reconciler<'a> {
    scope: &'a mut MachineScope,
    config: &'a ActuatorConfig,
    cancel: &'a CancellationToken,
}

impl<'a> Reconciler<'a> {
    /// Reconciler for `scope`
    pub fn new(
        scope: &'a mut MachineScope,
        config: &'a ActuatorConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            scope,
            config,
            cancel,
        }
    }

    /// Make sure an instance backs the machine.
    ///
    /// An instance that already exists for the machine's provider ID is
    /// adopted instead of launching another one.
    pub async fn create(&mut self) -> Result<()> {
        self.validate_machine()?;
        let name = self.scope.name();

        if self.scope.machine.provider_id().is_some() {
            let mut existing = self.get_machine_instances().await?;
            if !existing.is_empty() {
                sort_instances_by_launch_time_desc(&mut existing);
                let instance = existing.swap_remove(0);
                info!(
                    machine = %name,
                    instance_id = %instance.instance_id,
                    "instance already exists, skipping creation"
                );
                self.update_machine_state(&instance);
                return self.requeue_if_pending(&instance);
            }
        }

        let user_data = self
            .scope
            .get_user_data()
            .await
            .map_err(|e| e.context("failed to get user data"))?;

        let result = create_instance(
            &self.scope.machine,
            &self.scope.provider_config,
            &user_data,
            self.scope.client.as_ref(),
            &self.config.poll_options(),
            self.cancel,
        )
        .await;
        let instance = match result {
            Ok(instance) => instance,
            Err(e) => {
                self.scope
                    .provider_status
                    .set_condition(Condition::creation_failed(e.to_string()));
                return Err(e.context("failed to create instance"));
            }
        };

        info!(machine = %name, instance_id = %instance.instance_id, "created instance");
        self.scope
            .provider_status
            .set_condition(Condition::creation_succeeded());
        self.update_machine_state(&instance);
        self.requeue_if_pending(&instance)
    }

    /// Bring the machine's status in line with its instances.
    ///
    /// When several instances carry the machine's tags the newest running one
    /// wins and the others are stopped.
    pub async fn update(&mut self) -> Result<()> {
        self.validate_machine()?;
        let name = self.scope.name();

        let mut instances = self.get_machine_instances().await?;
        if instances.is_empty() {
            if self.within_consistency_window() {
                warn!(
                    machine = %name,
                    "instance not found yet, requeueing for eventual consistency"
                );
                return Err(Error::requeue_after(self.config.requeue_after));
            }

            warn!(machine = %name, "attempted to update machine but no instances found");
            let status = &mut self.scope.provider_status;
            status.instance_id = None;
            status.instance_state = None;
            status.set_condition(Condition::creation_failed(
                "Instance not found on cloud provider",
            ));
            return Err(Error::requeue_after(self.config.requeue_after_fatal));
        }

        sort_instances_by_launch_time_desc(&mut instances);
        let region = self.scope.provider_config.region_id.clone();
        let client = self.scope.client.clone();

        let newest = match running_instances(&instances).first() {
            Some(running) => {
                correct_existing_tags(&self.scope.machine, &region, running, client.as_ref())
                    .await
                    .map_err(|e| {
                        Error::update_machine(
                            &name,
                            format!("failed to correct existing instance tags: {e}"),
                        )
                    })?;
                (*running).clone()
            }
            None => {
                warn!(machine = %name, "no running instances found");
                instances[0].clone()
            }
        };

        let extraneous: Vec<Instance> = instances
            .into_iter()
            .filter(|i| i.instance_id != newest.instance_id)
            .collect();
        if !extraneous.is_empty() {
            info!(
                machine = %name,
                count = extraneous.len(),
                "stopping instances that are not the newest"
            );
            stop_instances(client.as_ref(), &region, &extraneous)
                .await
                .map_err(|e| {
                    Error::update_machine(
                        &name,
                        format!("failed to stop extraneous instances: {e}"),
                    )
                })?;
        }

        self.update_machine_state(&newest);
        self.requeue_if_pending(&newest)
    }

    /// Stop and release every instance of the machine
    pub async fn delete(&mut self) -> Result<()> {
        let name = self.scope.name();

        let instances = self.get_machine_instances().await?;
        if instances.is_empty() {
            warn!(machine = %name, "no instances found to delete");
            return Ok(());
        }

        let stopped = delete_instances(
            self.scope.client.as_ref(),
            &self.scope.provider_config.region_id,
            &instances,
            &self.config.poll_options(),
            self.cancel,
        )
        .await
        .map_err(|e| Error::delete_machine(&name, format!("failed to delete instances: {e}")))?;

        let state = stopped
            .first()
            .map(|r| r.current_status.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| instances[0].status_str().to_string());
        info!(machine = %name, state = %state, "instances released");
        self.scope.set_instance_state_annotation(&state);
        Ok(())
    }

    /// Whether an instance in a supported state backs the machine
    pub async fn exists(&mut self) -> Result<bool> {
        let name = self.scope.name();

        let instances = self.get_machine_instances().await?;
        if instances.is_empty() {
            if self.within_consistency_window() {
                warn!(
                    machine = %name,
                    "instance not found yet, requeueing for eventual consistency"
                );
                return Err(Error::requeue_after(self.config.requeue_after));
            }
            info!(machine = %name, "instance does not exist");
            return Ok(false);
        }
        Ok(true)
    }

    fn validate_machine(&self) -> Result<()> {
        if self.scope.machine.cluster_id().is_none() {
            let name = self.scope.name();
            return Err(Error::invalid_configuration(
                &name,
                format!("{name}: missing {MACHINE_CLUSTER_ID_LABEL:?} label"),
            ));
        }
        Ok(())
    }

    /// Instances of the machine, by recorded instance ID first and by tags
    /// when that fails.
    async fn get_machine_instances(&self) -> Result<Vec<Instance>> {
        let region = &self.scope.provider_config.region_id;
        let client = self.scope.client.as_ref();

        if let Some(id) = self.scope.provider_status.instance_id() {
            match get_existing_instance_by_id(id, region, client).await {
                Ok(instance) => return Ok(vec![instance]),
                Err(e) => warn!(
                    machine = %self.scope.machine.name_any(),
                    instance_id = %id,
                    error = %e,
                    "failed to find existing instance by id, searching by tags"
                ),
            }
        }

        get_existing_instances(&self.scope.machine, region, client).await
    }

    /// A missing instance is not conclusive right after the provider ID was
    /// written: the cloud API is eventually consistent.
    fn within_consistency_window(&self) -> bool {
        if self.scope.machine.provider_id().is_none() {
            return false;
        }
        let last_updated = self
            .scope
            .machine
            .status
            .as_ref()
            .and_then(|s| s.last_updated);
        match last_updated {
            None => true,
            Some(t) => chrono::Duration::from_std(self.config.requeue_after)
                .map(|window| t + window > Utc::now())
                .unwrap_or(true),
        }
    }

    fn update_machine_state(&mut self, instance: &Instance) {
        let name = self.scope.name();
        let state = instance.status_str().to_string();

        let status = &mut self.scope.provider_status;
        status.instance_id = Some(instance.instance_id.clone());
        status.instance_state = Some(state.clone());

        self.scope.set_provider_id(&instance.instance_id);
        self.scope.set_cloud_provider_labels();
        self.scope.set_instance_state_annotation(&state);
        self.scope
            .set_addresses(derive_node_addresses(Some(instance), &name).unwrap_or_default());
    }

    fn requeue_if_pending(&self, instance: &Instance) -> Result<()> {
        if instance.has_status(&InstanceStatus::Pending) {
            info!(
                machine = %self.scope.name(),
                instance_id = %instance.instance_id,
                "instance is pending, requeueing"
            );
            return Err(Error::requeue_after(self.config.requeue_after));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockMachineStore;
    use crate::test_support::*;
    use alicloud_common::crd::{
        ConditionStatus, Machine, MachineStatus, ProviderSpecCodec, ResourceReference, Tag,
        INSTANCE_STATE_ANNOTATION, MACHINE_CREATION_CONDITION,
    };
    use alicloud_ecs::{
        DeleteInstancesResponse, DescribeImagesResponse, EcsClient, EcsError, Image,
        RunInstancesResponse, StopInstancesResponse, TagResourcesResponse,
    };
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config() -> ActuatorConfig {
        ActuatorConfig {
            instance_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
            ..ActuatorConfig::default()
        }
    }

    fn user_data_store() -> MockMachineStore {
        let mut store = MockMachineStore::new();
        store.expect_get_secret().returning(|_, _| {
            Ok(Some(Secret {
                data: Some(BTreeMap::from([(
                    "userData".to_string(),
                    ByteString(b"userdata".to_vec()),
                )])),
                ..Default::default()
            }))
        });
        store
    }

    async fn scope_for(machine: Machine, client: MockEcs, store: MockMachineStore) -> MachineScope {
        let client: Arc<dyn EcsClient> = Arc::new(client);
        let mut builder = MockEcsBuilder::new();
        builder
            .expect_build()
            .returning(move |_, _, _| Ok(client.clone()));
        MachineScope::new(
            machine,
            &builder,
            Arc::new(store),
            ProviderSpecCodec::default(),
        )
        .await
        .unwrap()
    }

    fn machine_with_provider_id() -> Machine {
        let mut machine = stub_machine();
        machine.spec.provider_id = Some(format!("alicloud://{STUB_REGION_ID}.{STUB_INSTANCE_ID}"));
        machine
    }

    fn available_image(client: &mut MockEcs) {
        client.expect_describe_images().returning(|req| {
            Ok(DescribeImagesResponse {
                images: vec![Image {
                    image_id: req.image_id,
                    status: "Available".into(),
                    ..Default::default()
                }],
                ..Default::default()
            })
        });
    }

    #[tokio::test]
    async fn create_launches_and_records_the_instance() {
        let mut client = MockEcs::new();
        available_image(&mut client);
        client.expect_run_instances().times(1).returning(|_| {
            Ok(RunInstancesResponse {
                request_id: "r".into(),
                instance_ids: vec![STUB_INSTANCE_ID.into()],
            })
        });
        client.expect_describe_instances().returning(|_| {
            Ok(describe_response(vec![stub_instance(
                STUB_INSTANCE_ID,
                InstanceStatus::Running,
                "",
            )]))
        });

        let mut scope = scope_for(stub_machine(), client, user_data_store()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        Reconciler::new(&mut scope, &config, &cancel)
            .create()
            .await
            .unwrap();

        assert_eq!(scope.provider_status.instance_id(), Some(STUB_INSTANCE_ID));
        assert_eq!(scope.provider_status.instance_state.as_deref(), Some("Running"));
        let condition = scope
            .provider_status
            .condition(MACHINE_CREATION_CONDITION)
            .unwrap();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(
            scope.machine.spec.provider_id.as_deref(),
            Some("alicloud://cn-beijing.i-bg2ss7v5ck5skyp9")
        );
        assert_eq!(
            scope.machine.annotations()[INSTANCE_STATE_ANNOTATION],
            "Running"
        );
        let addresses = &scope.machine.status.as_ref().unwrap().addresses;
        assert_eq!(addresses.last().unwrap().address, STUB_MACHINE_NAME);
    }

    #[tokio::test]
    async fn create_requires_the_cluster_label() {
        let mut machine = stub_machine();
        machine.metadata.labels = None;

        let mut scope = scope_for(machine, MockEcs::new(), MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &config, &cancel)
            .create()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration { .. }));
        assert_eq!(
            err.to_string(),
            format!(
                "{STUB_MACHINE_NAME}: missing \"machine.openshift.io/cluster-api-cluster\" label"
            )
        );
    }

    #[tokio::test]
    async fn create_reports_bad_user_data() {
        let mut store = MockMachineStore::new();
        store.expect_get_secret().returning(|_, _| {
            Ok(Some(Secret {
                data: Some(BTreeMap::from([(
                    "badKey".to_string(),
                    ByteString(b"userdata".to_vec()),
                )])),
                ..Default::default()
            }))
        });
        let mut client = MockEcs::new();
        client.expect_run_instances().never();

        let mut scope = scope_for(stub_machine(), client, store).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &config, &cancel)
            .create()
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                "failed to get user data: secret {STUB_NAMESPACE}/{STUB_USER_DATA_SECRET} \
                 does not have userData field set. thus, no user data applied when creating an instance"
            )
        );
    }

    #[tokio::test]
    async fn create_failure_sets_the_failed_condition() {
        let mut config = stub_provider_config();
        config.security_groups = vec![ResourceReference::tags(vec![Tag::new("Name", "machine-sg")])];

        let mut client = MockEcs::new();
        available_image(&mut client);
        client
            .expect_describe_security_groups()
            .returning(|_| Err(EcsError::Transport("describeSecurityGroups error".into())));
        client.expect_run_instances().never();

        let mut scope = scope_for(stub_machine_with(&config), client, user_data_store()).await;
        let actuator_config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &actuator_config, &cancel)
            .create()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration { .. }));
        assert_eq!(
            err.to_string(),
            "failed to create instance: error getting security groups ID: \
             error describing securitygroup: transport error: describeSecurityGroups error"
        );
        let condition = scope
            .provider_status
            .condition(MACHINE_CREATION_CONDITION)
            .unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
    }

    #[tokio::test]
    async fn create_adopts_an_existing_instance() {
        let mut client = MockEcs::new();
        client.expect_describe_instances().returning(|_| {
            Ok(describe_response(vec![stub_instance(
                STUB_INSTANCE_ID,
                InstanceStatus::Pending,
                "",
            )]))
        });
        client.expect_run_instances().never();
        let mut store = MockMachineStore::new();
        store.expect_get_secret().never();

        let mut scope = scope_for(machine_with_provider_id(), client, store).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &config, &cancel)
            .create()
            .await
            .unwrap_err();

        assert_eq!(err.requeue_delay(), Some(config.requeue_after));
        assert_eq!(scope.provider_status.instance_id(), Some(STUB_INSTANCE_ID));
    }

    #[tokio::test]
    async fn update_keeps_the_newest_running_instance() {
        let mut client = MockEcs::new();
        client.expect_describe_instances().returning(|req| {
            if req.instance_ids.is_empty() {
                let mut drifted =
                    stub_instance("i-new", InstanceStatus::Running, "2024-05-02T17:04:05Z");
                drifted.tags.retain(|t| t.key != "Name");
                return Ok(describe_response(vec![
                    stub_instance("i-old", InstanceStatus::Running, "2020-01-02T15:04:05Z"),
                    drifted,
                ]));
            }
            // stop_instances re-describes the extraneous instance
            assert_eq!(req.instance_ids, vec!["i-old"]);
            Ok(describe_response(vec![stub_instance(
                "i-old",
                InstanceStatus::Running,
                "2020-01-02T15:04:05Z",
            )]))
        });
        client.expect_tag_resources().times(1).returning(|req| {
            assert_eq!(req.resource_ids, vec!["i-new"]);
            Ok(TagResourcesResponse::default())
        });
        client.expect_stop_instances().times(1).returning(|req| {
            assert_eq!(req.instance_ids, vec!["i-old"]);
            Ok(StopInstancesResponse::default())
        });

        let mut scope = scope_for(stub_machine(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        Reconciler::new(&mut scope, &config, &cancel)
            .update()
            .await
            .unwrap();

        assert_eq!(scope.provider_status.instance_id(), Some("i-new"));
        assert_eq!(
            scope.machine.spec.provider_id.as_deref(),
            Some("alicloud://cn-beijing.i-new")
        );
    }

    #[tokio::test]
    async fn update_requeues_while_a_new_instance_is_not_visible() {
        let mut client = MockEcs::new();
        client
            .expect_describe_instances()
            .returning(|_| Ok(describe_response(vec![])));

        let mut scope = scope_for(machine_with_provider_id(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &config, &cancel)
            .update()
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "requeue in: 20s");
    }

    #[tokio::test]
    async fn update_gives_up_on_a_long_gone_instance() {
        let mut machine = machine_with_provider_id();
        machine.status = Some(MachineStatus {
            last_updated: Some(Utc::now() - chrono::Duration::hours(1)),
            ..Default::default()
        });
        let mut client = MockEcs::new();
        client
            .expect_describe_instances()
            .returning(|_| Ok(describe_response(vec![])));

        let mut scope = scope_for(machine, client, MockMachineStore::new()).await;
        scope.provider_status.instance_id = Some("i-gone".into());
        let config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &config, &cancel)
            .update()
            .await
            .unwrap_err();

        assert_eq!(err.requeue_delay(), Some(config.requeue_after_fatal));
        assert_eq!(scope.provider_status.instance_id, None);
        let condition = scope
            .provider_status
            .condition(MACHINE_CREATION_CONDITION)
            .unwrap();
        assert_eq!(condition.message, "Instance not found on cloud provider");
    }

    #[tokio::test]
    async fn delete_without_instances_is_a_no_op() {
        let mut client = MockEcs::new();
        client
            .expect_describe_instances()
            .returning(|_| Ok(describe_response(vec![])));
        client.expect_stop_instances().never();
        client.expect_delete_instances().never();

        let mut scope = scope_for(stub_machine(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        Reconciler::new(&mut scope, &config, &cancel)
            .delete()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_releases_stopped_instances() {
        let mut client = MockEcs::new();
        client.expect_describe_instances().returning(|_| {
            Ok(describe_response(vec![stub_instance(
                STUB_INSTANCE_ID,
                InstanceStatus::Stopped,
                "",
            )]))
        });
        client.expect_stop_instances().never();
        client
            .expect_delete_instances()
            .times(1)
            .returning(|_| Ok(DeleteInstancesResponse::default()));

        let mut scope = scope_for(stub_machine(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        Reconciler::new(&mut scope, &config, &cancel)
            .delete()
            .await
            .unwrap();

        assert_eq!(
            scope.machine.annotations()[INSTANCE_STATE_ANNOTATION],
            "Stopped"
        );
    }

    #[tokio::test]
    async fn delete_failures_are_delete_errors() {
        let mut client = MockEcs::new();
        client.expect_describe_instances().returning(|_| {
            Ok(describe_response(vec![stub_instance(
                STUB_INSTANCE_ID,
                InstanceStatus::Running,
                "",
            )]))
        });
        client
            .expect_stop_instances()
            .returning(|_| Err(EcsError::api("IncorrectInstanceStatus", "busy")));

        let mut scope = scope_for(stub_machine(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &config, &cancel)
            .delete()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DeleteMachine { .. }));
        assert!(err
            .to_string()
            .starts_with("failed to delete instances: error stopping instances: IncorrectInstanceStatus: busy"));
    }

    #[tokio::test]
    async fn exists_reports_found_instances() {
        let mut client = MockEcs::new();
        client.expect_describe_instances().returning(|_| {
            Ok(describe_response(vec![stub_instance(
                STUB_INSTANCE_ID,
                InstanceStatus::Running,
                "",
            )]))
        });

        let mut scope = scope_for(stub_machine(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        assert!(Reconciler::new(&mut scope, &config, &cancel)
            .exists()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn exists_without_instances() {
        let mut client = MockEcs::new();
        client
            .expect_describe_instances()
            .returning(|_| Ok(describe_response(vec![])));

        let mut scope = scope_for(stub_machine(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        assert!(!Reconciler::new(&mut scope, &config, &cancel)
            .exists()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn exists_requeues_for_a_fresh_provider_id() {
        let mut client = MockEcs::new();
        client
            .expect_describe_instances()
            .returning(|_| Ok(describe_response(vec![])));

        let mut scope = scope_for(machine_with_provider_id(), client, MockMachineStore::new()).await;
        let config = test_config();
        let cancel = CancellationToken::new();
        let err = Reconciler::new(&mut scope, &config, &cancel)
            .exists()
            .await
            .unwrap_err();
        assert!(err.is_requeue());
    }

    #[tokio::test]
    async fn recorded_instance_id_is_tried_before_tags() {
        let mut client = MockEcs::new();
        client.expect_describe_instances().returning(|req| {
            if req.instance_ids == vec!["i-released".to_string()] {
                return Ok(describe_response(vec![stub_instance(
                    "i-released",
                    InstanceStatus::Released,
                    "",
                )]));
            }
            assert!(!req.tags.is_empty());
            Ok(describe_response(vec![stub_instance(
                "i-tagged",
                InstanceStatus::Running,
                "",
            )]))
        });

        let mut scope = scope_for(stub_machine(), client, MockMachineStore::new()).await;
        scope.provider_status.instance_id = Some("i-released".into());
        let config = test_config();
        let cancel = CancellationToken::new();
        let reconciler = Reconciler::new(&mut scope, &config, &cancel);

        let instances = reconciler.get_machine_instances().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_id, "i-tagged");
    }
}
