//! Access to the Kubernetes objects the actuator reads and writes

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::debug;

use alicloud_common::crd::Machine;
use alicloud_common::Result;

/// Reads Secrets and writes Machines.
///
/// Writes are merge patches of the fields the actuator owns; conflicts are
/// returned to the caller and retried by the next reconcile.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MachineStore: Send + Sync {
    /// Secret `name` in `namespace`, `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Write the labels, annotations and provider ID of `machine`
    async fn patch_machine(&self, machine: &Machine) -> Result<Machine>;

    /// Write the status subresource of `machine`
    async fn patch_machine_status(&self, machine: &Machine) -> Result<Machine>;
}

/// [`MachineStore`] backed by the API server
pub struct KubeMachineStore {
    client: Client,
    field_manager: String,
}

impl KubeMachineStore {
    /// Store using `client`, writing as `field_manager`
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn machines(&self, machine: &Machine) -> Api<Machine> {
        Api::namespaced(self.client.clone(), &machine.namespace_or_default())
    }
}

#[async_trait]
impl MachineStore for KubeMachineStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match secrets.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_machine(&self, machine: &Machine) -> Result<Machine> {
        let name = machine.name_any();
        let patch = json!({
            "metadata": {
                "labels": machine.metadata.labels,
                "annotations": machine.metadata.annotations,
            },
            "spec": {
                "providerID": machine.spec.provider_id,
            }
        });
        debug!(machine = %name, "patching machine");

        let patched = self
            .machines(machine)
            .patch(
                &name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(patched)
    }

    async fn patch_machine_status(&self, machine: &Machine) -> Result<Machine> {
        let name = machine.name_any();
        let patch = json!({ "status": machine.status });
        debug!(machine = %name, "patching machine status");

        let patched = self
            .machines(machine)
            .patch_status(
                &name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(patched)
    }
}
