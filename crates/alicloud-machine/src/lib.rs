//! Cluster API machine actuator for Alibaba Cloud ECS
//!
//! Keeps one ECS instance running for every Machine: it resolves the
//! provider config into cloud resources, launches and tags instances, adopts
//! or stops duplicates, reports addresses and status, and releases instances
//! when the Machine goes away.

#![deny(missing_docs)]

pub mod actuator;
pub mod addresses;
pub mod config;
pub mod instances;
pub mod reconciler;
pub mod resolver;
pub mod scope;
pub mod store;
pub mod tags;

#[cfg(test)]
mod test_support;

pub use actuator::{Actuator, ActuatorBuilder};
pub use config::ActuatorConfig;
pub use scope::MachineScope;
pub use store::{KubeMachineStore, MachineStore};
