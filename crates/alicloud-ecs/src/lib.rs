//! Alibaba Cloud client seam for the machine actuator
//!
//! The actuator never speaks the ECS wire protocol itself. It talks to an
//! [`EcsClient`] implementation supplied by the hosting controller, built per
//! reconcile by an [`EcsClientBuilder`]. This crate owns those traits and the
//! request/response model they exchange.

#![deny(missing_docs)]

mod client;
mod error;
mod types;

pub use client::{EcsClient, EcsClientBuilder};
pub use error::EcsError;
pub use types::{
    DataDiskRequest, DeleteInstancesRequest, DeleteInstancesResponse, DescribeImagesRequest,
    DescribeImagesResponse, DescribeInstancesRequest, DescribeInstancesResponse,
    DescribeSecurityGroupsRequest, DescribeSecurityGroupsResponse, DescribeVSwitchesRequest,
    DescribeVSwitchesResponse, Image, Instance, InstanceResponse, InstanceStatus,
    ListResourceGroupsRequest, ListResourceGroupsResponse, NetworkInterface, ResourceGroup,
    RunInstancesRequest, RunInstancesResponse, SecurityGroup, StopInstancesRequest,
    StopInstancesResponse, SystemDiskRequest, Tag, TagResourcesRequest, TagResourcesResponse,
    VSwitch,
};

/// Image status the actuator requires before launching from an image
pub const IMAGE_STATUS_AVAILABLE: &str = "Available";

/// Resource type used by TagResources for ECS instances
pub const TAG_RESOURCE_TYPE_INSTANCE: &str = "instance";
