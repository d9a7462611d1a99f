//! Resolution of provider config references into cloud resource IDs
//!
//! Security groups, the VSwitch and the resource group are written in the
//! provider config as [`ResourceReference`]s: a literal ID, a tag query or a
//! name query depending on the resource. The image is always a literal ID
//! that must name an `Available` image.

use alicloud_common::crd::{AlibabaCloudMachineProviderConfig, ResourceReference, Tag};
use alicloud_common::metrics::{record_failed_instance_create, MachineLabels};
use alicloud_common::{Error, Result};
use alicloud_ecs::{
    DescribeImagesRequest, DescribeSecurityGroupsRequest, DescribeVSwitchesRequest, EcsClient,
    EcsError, ListResourceGroupsRequest, IMAGE_STATUS_AVAILABLE,
};
use tracing::{error, info};

use crate::tags::to_ecs_tags;

/// Resolves the references of one machine's provider config
pub struct Resolver<'a> {
    machine: &'a str,
    namespace: &'a str,
    config: &'a AlibabaCloudMachineProviderConfig,
    client: &'a dyn EcsClient,
}

impl<'a> Resolver<'a> {
    /// Resolver for the machine `machine` in `namespace`
    pub fn new(
        machine: &'a str,
        namespace: &'a str,
        config: &'a AlibabaCloudMachineProviderConfig,
        client: &'a dyn EcsClient,
    ) -> Self {
        Self {
            machine,
            namespace,
            config,
            client,
        }
    }

    /// ID of the configured image, which must be `Available`
    pub async fn image_id(&self) -> Result<String> {
        info!(
            image_id = %self.config.image_id,
            region = %self.config.region_id,
            "validating image"
        );
        let response = self
            .client
            .describe_images(DescribeImagesRequest {
                region_id: self.config.region_id.clone(),
                image_id: self.config.image_id.clone(),
                show_expired: true,
            })
            .await
            .map_err(|e| self.cloud_failure("DescribeImages", "error describing Images", e))?;

        let Some(image) = response.images.into_iter().next() else {
            error!(image_id = %self.config.image_id, "no image found");
            return Err(self.invalid("no image for given filters not found"));
        };

        if image.status != IMAGE_STATUS_AVAILABLE {
            return Err(self.invalid(format!(
                "{} invalid image status: {}",
                self.config.image_id, image.status
            )));
        }

        Ok(image.image_id)
    }

    /// IDs of every configured security group, in reference order.
    ///
    /// A tag reference contributes every group it matches.
    pub async fn security_group_ids(&self) -> Result<Vec<String>> {
        info!(region = %self.config.region_id, "resolving security groups");
        if self.config.security_groups.is_empty() {
            return Err(self.invalid("no security configuration provided"));
        }

        let mut ids = Vec::new();
        for reference in &self.config.security_groups {
            match reference {
                ResourceReference::Id { id: Some(id) } if !id.is_empty() => ids.push(id.clone()),
                ResourceReference::Id { .. } => {
                    return Err(self.invalid("No security group ID provided"));
                }
                ResourceReference::Tags { tags } => {
                    ids.extend(self.security_group_ids_by_tags(tags.as_deref()).await?);
                }
                other => {
                    return Err(self.invalid(format!(
                        "Unknown security group resource reference type: {}",
                        other.type_name()
                    )));
                }
            }
        }

        if ids.is_empty() {
            return Err(self.invalid("no securitygroup IDs found from configuration"));
        }
        Ok(ids)
    }

    async fn security_group_ids_by_tags(&self, tags: Option<&[Tag]>) -> Result<Vec<String>> {
        let Some(tags) = tags else {
            return Err(self.invalid(format!(
                "No tags provided for security group ID search for machine: {:?}",
                self.machine
            )));
        };

        let response = self
            .client
            .describe_security_groups(DescribeSecurityGroupsRequest {
                region_id: self.config.region_id.clone(),
                vpc_id: self.config.vpc_id.clone(),
                tags: to_ecs_tags(tags),
            })
            .await
            .map_err(|e| {
                self.cloud_failure(
                    "DescribeSecurityGroups",
                    "error describing securitygroup",
                    e,
                )
            })?;

        if response.security_groups.is_empty() {
            error!(machine = %self.machine, "no security group matches the configured tags");
            return Err(self.invalid("no securitygroup for given tags not found"));
        }

        Ok(response
            .security_groups
            .into_iter()
            .map(|sg| sg.security_group_id)
            .collect())
    }

    /// ID of the configured VSwitch
    pub async fn vswitch_id(&self) -> Result<String> {
        info!(region = %self.config.region_id, "resolving vswitch");
        match &self.config.vswitch {
            None => Err(self.invalid("no vswitch configuration provided")),
            Some(ResourceReference::Id { id: Some(id) }) if !id.is_empty() => Ok(id.clone()),
            Some(ResourceReference::Id { .. }) => {
                Err(self.invalid("No vswitch resource id provided"))
            }
            Some(ResourceReference::Tags { tags }) => {
                self.vswitch_id_by_tags(tags.as_deref()).await
            }
            Some(other) => Err(self.invalid(format!(
                "Unknown vswitch resource reference type: {}",
                other.type_name()
            ))),
        }
    }

    async fn vswitch_id_by_tags(&self, tags: Option<&[Tag]>) -> Result<String> {
        let Some(tags) = tags else {
            return Err(self.invalid(format!(
                "No tags provided for VSwitch ID search for machine: {:?}",
                self.machine
            )));
        };

        let response = self
            .client
            .describe_vswitches(DescribeVSwitchesRequest {
                region_id: self.config.region_id.clone(),
                vpc_id: self.config.vpc_id.clone(),
                tags: to_ecs_tags(tags),
            })
            .await
            .map_err(|e| self.cloud_failure("DescribeVSwitches", "error describing vswitches", e))?;

        let mut ids: Vec<String> = response
            .vswitches
            .into_iter()
            .map(|v| v.vswitch_id)
            .collect();
        match ids.len() {
            0 => Err(self.invalid("no vswitches found for given tags, vpcid, and regionid")),
            1 => Ok(ids.remove(0)),
            n => Err(self.invalid(format!(
                "found {n} vswitches for given tags, vpcid, and regionid: {}",
                ids.join(", ")
            ))),
        }
    }

    /// ID of the configured resource group
    pub async fn resource_group_id(&self) -> Result<String> {
        match &self.config.resource_group {
            None => Err(self.invalid("no resource group configuration provided")),
            Some(ResourceReference::Id { id: Some(id) }) if !id.is_empty() => Ok(id.clone()),
            Some(ResourceReference::Id { .. }) => {
                Err(self.invalid("No resource group ID provided"))
            }
            Some(ResourceReference::Name { name }) => {
                self.resource_group_id_by_name(name.as_deref()).await
            }
            Some(other) => Err(self.invalid(format!(
                "unknown resource group reference type: {}",
                other.type_name()
            ))),
        }
    }

    async fn resource_group_id_by_name(&self, name: Option<&str>) -> Result<String> {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return Err(self.invalid(format!(
                "No name provided for resource Group ID search for machine: {:?}",
                self.machine
            )));
        };

        let response = self
            .client
            .list_resource_groups(ListResourceGroupsRequest {
                region_id: self.config.region_id.clone(),
                name: name.to_string(),
            })
            .await
            .map_err(|e| self.cloud_failure("ListResourceGroups", "error list resourcegroups", e))?;

        let mut ids: Vec<String> = response.resource_groups.into_iter().map(|g| g.id).collect();
        match ids.len() {
            0 => Err(self.invalid("no resourcegroups for given name  found")),
            1 => Ok(ids.remove(0)),
            n => Err(self.invalid(format!(
                "found {n} resourcegroups named {name:?}: {}",
                ids.join(", ")
            ))),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        Error::invalid_configuration(self.machine, message)
    }

    fn cloud_failure(&self, operation: &str, prefix: &str, err: EcsError) -> Error {
        record_failed_instance_create(&MachineLabels::new(
            self.machine,
            self.namespace,
            err.to_string(),
        ));
        error!(machine = %self.machine, operation, error = %err, "{prefix}");
        Error::cloud(operation, format!("{prefix}: {err}"))
    }
}
