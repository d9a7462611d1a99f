//! Machine actuator entry points
//!
//! The machine controller calls [`Actuator::create`], [`Actuator::update`],
//! [`Actuator::delete`] and [`Actuator::exists`] for every Machine it
//! reconciles. Each call builds a [`MachineScope`], runs the [`Reconciler`],
//! writes the Machine back and records one Event.
//!
//! Use [`ActuatorBuilder`] to construct instances:
//!
//! ```text
//! let actuator = Actuator::builder(ecs_builder, store)
//!     .events(events)
//!     .config(ActuatorConfig::from_env()?)
//!     .build();
//! ```

use std::sync::Arc;

use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use alicloud_common::crd::{Machine, ProviderSpecCodec};
use alicloud_common::events::{
    actions, reasons, EventPublisher, KubeEventPublisher, NoopEventPublisher,
};
use alicloud_common::metrics::{
    record_failed_instance_delete, record_failed_instance_update, MachineLabels,
};
use alicloud_common::{Error, Result, CONTROLLER_NAME};
use alicloud_ecs::EcsClientBuilder;

use crate::config::ActuatorConfig;
use crate::reconciler::Reconciler;
use crate::scope::MachineScope;
use crate::store::{KubeMachineStore, MachineStore};

/// The operation an actuator call performs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Create,
    Update,
    Delete,
    Exists,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => actions::CREATE,
            Self::Update => actions::UPDATE,
            Self::Delete => actions::DELETE,
            Self::Exists => actions::EXISTS,
        }
    }

    fn failure_reason(self) -> &'static str {
        match self {
            Self::Create => reasons::FAILED_CREATE,
            Self::Update => reasons::FAILED_UPDATE,
            Self::Delete => reasons::FAILED_DELETE,
            Self::Exists => reasons::FAILED_EXISTS,
        }
    }

    /// Give `err` the machine category of this action unless it has one.
    /// Existence checks keep the original error.
    fn categorize(self, machine: &str, err: Error) -> Error {
        if err.machine().is_some() {
            return err;
        }
        match self {
            Self::Create => Error::create_machine(machine, err.to_string()),
            Self::Update => Error::update_machine(machine, err.to_string()),
            Self::Delete => Error::delete_machine(machine, err.to_string()),
            Self::Exists => err,
        }
    }
}

/// Alibaba Cloud machine actuator
pub struct Actuator {
    ecs: Arc<dyn EcsClientBuilder>,
    store: Arc<dyn MachineStore>,
    events: Arc<dyn EventPublisher>,
    codec: ProviderSpecCodec,
    config: ActuatorConfig,
    cancel: CancellationToken,
}

impl Actuator {
    /// Create a builder for constructing an Actuator
    pub fn builder(
        ecs: Arc<dyn EcsClientBuilder>,
        store: Arc<dyn MachineStore>,
    ) -> ActuatorBuilder {
        ActuatorBuilder::new(ecs, store)
    }

    /// Actuator talking to the API server through `client`.
    ///
    /// This is a convenience method equivalent to wiring a
    /// [`KubeMachineStore`] and a [`KubeEventPublisher`] into
    /// [`Actuator::builder`].
    pub fn new(client: Client, ecs: Arc<dyn EcsClientBuilder>, config: ActuatorConfig) -> Self {
        let store = Arc::new(KubeMachineStore::new(
            client.clone(),
            config.field_manager.clone(),
        ));
        Self::builder(ecs, store)
            .events(Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)))
            .config(config)
            .build()
    }

    /// Launch the instance backing `machine`
    #[instrument(skip(self, machine), fields(machine = %machine.name_any()))]
    pub async fn create(&self, machine: &Machine) -> Result<()> {
        info!("creating machine");
        let mut scope = self.scope(machine, Action::Create).await?;
        let result = Reconciler::new(&mut scope, &self.config, &self.cancel)
            .create()
            .await;
        self.finish(machine, &mut scope, Action::Create, result)
            .await
    }

    /// Refresh `machine` from its instances
    #[instrument(skip(self, machine), fields(machine = %machine.name_any()))]
    pub async fn update(&self, machine: &Machine) -> Result<()> {
        info!("updating machine");
        let mut scope = self.scope(machine, Action::Update).await?;
        let result = Reconciler::new(&mut scope, &self.config, &self.cancel)
            .update()
            .await;
        self.finish(machine, &mut scope, Action::Update, result)
            .await
    }

    /// Release the instances backing `machine`
    #[instrument(skip(self, machine), fields(machine = %machine.name_any()))]
    pub async fn delete(&self, machine: &Machine) -> Result<()> {
        info!("deleting machine");
        let mut scope = self.scope(machine, Action::Delete).await?;
        let result = Reconciler::new(&mut scope, &self.config, &self.cancel)
            .delete()
            .await;
        self.finish(machine, &mut scope, Action::Delete, result)
            .await
    }

    /// Whether an instance backs `machine`.
    ///
    /// Nothing is written and no Event is recorded on success.
    #[instrument(skip(self, machine), fields(machine = %machine.name_any()))]
    pub async fn exists(&self, machine: &Machine) -> Result<bool> {
        info!("checking if machine exists");
        let mut scope = self.scope(machine, Action::Exists).await?;
        let result = Reconciler::new(&mut scope, &self.config, &self.cancel)
            .exists()
            .await;
        match result {
            Ok(exists) => Ok(exists),
            Err(e) => Err(self.handle_machine_error(machine, e, Action::Exists).await),
        }
    }

    async fn scope(&self, machine: &Machine, action: Action) -> Result<MachineScope> {
        let name = machine.name_any();
        match MachineScope::new(
            machine.clone(),
            self.ecs.as_ref(),
            self.store.clone(),
            self.codec.clone(),
        )
        .await
        {
            Ok(scope) => Ok(scope),
            Err(e) => {
                let message = format!("failed to create machine {name:?} scope: {e}");
                let err = match action {
                    Action::Delete => Error::delete_machine(&name, message),
                    _ => Error::invalid_configuration(&name, message),
                };
                Err(self.handle_machine_error(machine, err, action).await)
            }
        }
    }

    /// Write the machine back, then report the outcome of `result`.
    ///
    /// The machine is written even when the reconcile failed so that partial
    /// progress such as a failed creation condition is kept.
    async fn finish(
        &self,
        machine: &Machine,
        scope: &mut MachineScope,
        action: Action,
        result: Result<()>,
    ) -> Result<()> {
        let patched = scope.patch_machine().await;

        if let Err(e) = result {
            if let Err(patch_err) = patched {
                warn!(error = %patch_err, "failed to write machine after reconcile error");
            }
            return Err(self.handle_machine_error(machine, e, action).await);
        }

        let name = machine.name_any();
        let (reason, note) = match action {
            Action::Create => (reasons::CREATE, format!("Created Machine {name}")),
            Action::Update => (reasons::UPDATE, format!("Updated Machine {name}")),
            Action::Delete => (reasons::DELETE, format!("Deleted machine {name:?}")),
            Action::Exists => return patched,
        };
        self.events
            .publish(
                &machine.object_ref(&()),
                EventType::Normal,
                reason,
                action.as_str(),
                Some(note),
            )
            .await;

        patched
    }

    /// Classify `err`, record it and return it to the caller.
    ///
    /// Requeue signals pass through without an Event.
    async fn handle_machine_error(&self, machine: &Machine, err: Error, action: Action) -> Error {
        if err.is_requeue() {
            info!(delay = ?err.requeue_delay(), "requeueing machine");
            return err;
        }

        let name = machine.name_any();
        let err = action
            .categorize(&name, err)
            .context(format!("failed to reconcile machine {name:?}"));

        let labels = MachineLabels::new(&name, machine.namespace_or_default(), err.to_string());
        match action {
            Action::Update => record_failed_instance_update(&labels),
            Action::Delete => record_failed_instance_delete(&labels),
            Action::Create | Action::Exists => {}
        }

        warn!(error = %err, reason = err.reason(), "machine {} failed", action.as_str());
        self.events
            .publish(
                &machine.object_ref(&()),
                EventType::Warning,
                action.failure_reason(),
                action.as_str(),
                Some(format!("{}: {err}", err.reason())),
            )
            .await;
        err
    }
}

/// Builder for constructing [`Actuator`] instances
pub struct ActuatorBuilder {
    ecs: Arc<dyn EcsClientBuilder>,
    store: Arc<dyn MachineStore>,
    events: Option<Arc<dyn EventPublisher>>,
    codec: Option<ProviderSpecCodec>,
    config: ActuatorConfig,
    cancel: Option<CancellationToken>,
}

impl ActuatorBuilder {
    fn new(ecs: Arc<dyn EcsClientBuilder>, store: Arc<dyn MachineStore>) -> Self {
        Self {
            ecs,
            store,
            events: None,
            codec: None,
            config: ActuatorConfig::default(),
            cancel: None,
        }
    }

    /// Publish Events through `events` (default: none are published)
    pub fn events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Decode provider specs with `codec`
    pub fn codec(mut self, codec: ProviderSpecCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Override the timing configuration
    pub fn config(mut self, config: ActuatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Abandon in-flight waits when `cancel` fires
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the Actuator
    pub fn build(self) -> Actuator {
        Actuator {
            ecs: self.ecs,
            store: self.store,
            events: self.events.unwrap_or_else(|| Arc::new(NoopEventPublisher)),
            codec: self.codec.unwrap_or_default(),
            config: self.config,
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}
