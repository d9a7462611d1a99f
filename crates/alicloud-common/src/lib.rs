//! Common types for the Alibaba Cloud machine actuator: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod metrics;
pub mod poll;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Scheme of the provider ID written to `spec.providerID`
pub const PROVIDER_ID_SCHEME: &str = "alicloud";

/// Controller name used when reporting events
pub const CONTROLLER_NAME: &str = "alibabacloud-controller";
