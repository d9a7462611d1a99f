//! Per-reconcile view of one Machine
//!
//! A [`MachineScope`] is built at the start of every actuator call. It holds
//! the decoded provider config and status, a cloud client for the machine's
//! region, and a snapshot of the Machine as it was read so that
//! [`MachineScope::patch_machine`] writes only what changed.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, info};

use alicloud_common::crd::{
    AlibabaCloudMachineProviderConfig, AlibabaCloudMachineProviderStatus, Machine, NodeAddress,
    ProviderSpecCodec, INSTANCE_STATE_ANNOTATION, INSTANCE_TYPE_LABEL, REGION_LABEL, ZONE_LABEL,
};
use alicloud_common::{Error, Result, PROVIDER_ID_SCHEME};
use alicloud_ecs::{EcsClient, EcsClientBuilder};

use crate::store::MachineStore;

/// Key of the user data Secret entry holding the ignition payload
pub const USER_DATA_SECRET_KEY: &str = "userData";

/// One Machine being reconciled
pub struct MachineScope {
    /// The Machine, including changes not yet written
    pub machine: Machine,
    /// Decoded `spec.providerSpec`
    pub provider_config: AlibabaCloudMachineProviderConfig,
    /// Decoded `status.providerStatus`, written back on patch
    pub provider_status: AlibabaCloudMachineProviderStatus,
    /// Client for the machine's region
    pub client: Arc<dyn EcsClient>,
    original: Machine,
    store: Arc<dyn MachineStore>,
    codec: ProviderSpecCodec,
}

impl MachineScope {
    /// Decode `machine` and build its cloud client
    pub async fn new(
        machine: Machine,
        builder: &dyn EcsClientBuilder,
        store: Arc<dyn MachineStore>,
        codec: ProviderSpecCodec,
    ) -> Result<Self> {
        let name = machine.name_any();
        let namespace = machine.namespace_or_default();

        let provider_config = codec
            .decode_provider_spec(&machine.spec.provider_spec)
            .map_err(|e| {
                Error::invalid_configuration(&name, format!("failed to get machine config: {e}"))
            })?;

        let provider_status = codec
            .decode_provider_status(
                machine
                    .status
                    .as_ref()
                    .and_then(|s| s.provider_status.as_ref()),
            )
            .map_err(|e| {
                Error::invalid_configuration(
                    &name,
                    format!("failed to get machine provider status: {e}"),
                )
            })?;

        let credentials_secret = provider_config
            .credentials_secret
            .as_ref()
            .map(|s| s.name.clone())
            .filter(|s| !s.is_empty());

        let client = builder
            .build(credentials_secret, &namespace, &provider_config.region_id)
            .await
            .map_err(|e| {
                Error::cloud(
                    "BuildClient",
                    format!("failed to create alibabacloud client: {e}"),
                )
            })?;

        Ok(Self {
            original: machine.clone(),
            machine,
            provider_config,
            provider_status,
            client,
            store,
            codec,
        })
    }

    /// Machine name
    pub fn name(&self) -> String {
        self.machine.name_any()
    }

    /// Machine namespace
    pub fn namespace(&self) -> String {
        self.machine.namespace_or_default()
    }

    /// Base64 encoded user data, empty when the machine names no Secret.
    ///
    /// A named Secret must exist and carry [`USER_DATA_SECRET_KEY`].
    pub async fn get_user_data(&self) -> Result<String> {
        let Some(secret_ref) = self
            .provider_config
            .user_data_secret
            .as_ref()
            .filter(|s| !s.name.is_empty())
        else {
            return Ok(String::new());
        };

        let namespace = self.namespace();
        let secret = self
            .store
            .get_secret(&namespace, &secret_ref.name)
            .await?
            .ok_or_else(|| {
                Error::create_machine(
                    self.name(),
                    format!("secret {namespace}/{} not found", secret_ref.name),
                )
            })?;

        let Some(user_data) = secret
            .data
            .as_ref()
            .and_then(|data| data.get(USER_DATA_SECRET_KEY))
        else {
            return Err(Error::create_machine(
                self.name(),
                format!(
                    "secret {namespace}/{} does not have {USER_DATA_SECRET_KEY} field set. \
                     thus, no user data applied when creating an instance",
                    secret_ref.name
                ),
            ));
        };

        Ok(STANDARD.encode(&user_data.0))
    }

    /// Set `spec.providerID` for `instance_id` in the configured region
    pub fn set_provider_id(&mut self, instance_id: &str) {
        let provider_id = format!(
            "{PROVIDER_ID_SCHEME}://{}.{instance_id}",
            self.provider_config.region_id
        );
        if self.machine.spec.provider_id.as_deref() != Some(provider_id.as_str()) {
            info!(machine = %self.name(), provider_id = %provider_id, "setting provider ID");
            self.machine.spec.provider_id = Some(provider_id);
        }
    }

    /// Record the instance status in the instance-state annotation
    pub fn set_instance_state_annotation(&mut self, state: &str) {
        self.machine
            .annotations_mut()
            .insert(INSTANCE_STATE_ANNOTATION.to_string(), state.to_string());
    }

    /// Label the machine with its instance type, region and zone
    pub fn set_cloud_provider_labels(&mut self) {
        let labels = [
            (INSTANCE_TYPE_LABEL, self.provider_config.instance_type.clone()),
            (REGION_LABEL, self.provider_config.region_id.clone()),
            (ZONE_LABEL, self.provider_config.zone_id.clone()),
        ];
        let machine_labels = self.machine.labels_mut();
        for (key, value) in labels {
            machine_labels.insert(key.to_string(), value);
        }
    }

    /// Replace the addresses reported in the machine status
    pub fn set_addresses(&mut self, addresses: Vec<NodeAddress>) {
        self.machine.status.get_or_insert_with(Default::default).addresses = addresses;
    }

    /// Write the machine back, skipping requests that would change nothing.
    ///
    /// The provider status is encoded into the machine status first. A status
    /// change also moves `lastUpdated`.
    pub async fn patch_machine(&mut self) -> Result<()> {
        let provider_status = self.codec.encode_provider_status(&self.provider_status)?;
        self.machine
            .status
            .get_or_insert_with(Default::default)
            .provider_status = Some(provider_status);

        let name = self.name();
        if self.machine.metadata.labels != self.original.metadata.labels
            || self.machine.metadata.annotations != self.original.metadata.annotations
            || self.machine.spec.provider_id != self.original.spec.provider_id
        {
            let patched = self.store.patch_machine(&self.machine).await?;
            self.machine.metadata.resource_version = patched.metadata.resource_version;
        } else {
            debug!(machine = %name, "machine metadata unchanged");
        }

        let original_status = self.original.status.clone().unwrap_or_default();
        let status = self.machine.status.get_or_insert_with(Default::default);
        if *status != original_status {
            status.last_updated = Some(Utc::now());
            let patched = self.store.patch_machine_status(&self.machine).await?;
            self.machine.metadata.resource_version = patched.metadata.resource_version;
        } else {
            debug!(machine = %name, "machine status unchanged");
        }

        self.original = self.machine.clone();
        Ok(())
    }
}
