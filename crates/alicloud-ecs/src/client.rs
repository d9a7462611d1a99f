//! Client traits consumed by the actuator

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EcsError;
use crate::types::*;

/// Remote procedure interface to ECS, VPC and ResourceManager.
///
/// Every call may fail. Implementations must not retry below this trait; the
/// actuator decides when a failure is worth another attempt.
#[async_trait]
pub trait EcsClient: Send + Sync {
    /// Launch instances
    async fn run_instances(
        &self,
        request: RunInstancesRequest,
    ) -> Result<RunInstancesResponse, EcsError>;

    /// Describe instances by ID or by tag filter
    async fn describe_instances(
        &self,
        request: DescribeInstancesRequest,
    ) -> Result<DescribeInstancesResponse, EcsError>;

    /// Describe images by ID
    async fn describe_images(
        &self,
        request: DescribeImagesRequest,
    ) -> Result<DescribeImagesResponse, EcsError>;

    /// Describe security groups in a VPC filtered by tags
    async fn describe_security_groups(
        &self,
        request: DescribeSecurityGroupsRequest,
    ) -> Result<DescribeSecurityGroupsResponse, EcsError>;

    /// Describe VSwitches in a VPC filtered by tags
    async fn describe_vswitches(
        &self,
        request: DescribeVSwitchesRequest,
    ) -> Result<DescribeVSwitchesResponse, EcsError>;

    /// List resource groups by name
    async fn list_resource_groups(
        &self,
        request: ListResourceGroupsRequest,
    ) -> Result<ListResourceGroupsResponse, EcsError>;

    /// Add or replace tags on resources. Tags not named in the request are untouched.
    async fn tag_resources(
        &self,
        request: TagResourcesRequest,
    ) -> Result<TagResourcesResponse, EcsError>;

    /// Stop instances
    async fn stop_instances(
        &self,
        request: StopInstancesRequest,
    ) -> Result<StopInstancesResponse, EcsError>;

    /// Release instances
    async fn delete_instances(
        &self,
        request: DeleteInstancesRequest,
    ) -> Result<DeleteInstancesResponse, EcsError>;
}

/// Builds a region-scoped client from the credentials Secret a Machine names.
#[async_trait]
pub trait EcsClientBuilder: Send + Sync {
    /// Build a client.
    ///
    /// # Arguments
    ///
    /// * `credentials_secret` - Secret holding the access key, if the Machine names one
    /// * `namespace` - Namespace of the Machine and its Secrets
    /// * `region` - Region all calls are scoped to
    async fn build(
        &self,
        credentials_secret: Option<String>,
        namespace: &str,
        region: &str,
    ) -> Result<Arc<dyn EcsClient>, EcsError>;
}
