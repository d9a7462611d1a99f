//! Ownership tags on ECS instances
//!
//! Every instance the actuator launches carries the cluster ownership tag,
//! a `Name` tag equal to the machine name and a fixed set of provenance tags.
//! Instances are found again by the first two.

use std::collections::HashSet;

use alicloud_common::crd::Tag;
use alicloud_ecs::Tag as EcsTag;

/// Prefix of the cluster ownership tag key; the cluster ID follows it
pub const CLUSTER_TAG_KEY_PREFIX: &str = "kubernetes.io/cluster/";
/// Value of the cluster ownership tag
pub const CLUSTER_TAG_VALUE: &str = "owned";
/// Key of the tag holding the machine name
pub const NAME_TAG_KEY: &str = "Name";
/// Key of the tag marking instances owned by the cloud provider integration
pub const OWNED_TAG_KEY: &str = "sigs.k8s.io/cloud-provider-alibaba/origin";
/// Value of [`OWNED_TAG_KEY`]
pub const OWNED_TAG_VALUE: &str = "ocp";
/// Key of the provenance tag naming the integrating vendor
pub const ORIGIN_TAG_KEY: &str = "GISV";
/// Key of the ISV integration tag
pub const ISV_INTEGRATION_TAG_KEY: &str = "ISVIntegration";
/// Value of the provenance tags
pub const ORIGIN_TAG_VALUE: &str = "ocp";

/// Key of the cluster ownership tag for `cluster_id`
pub fn cluster_tag_key(cluster_id: &str) -> String {
    format!("{CLUSTER_TAG_KEY_PREFIX}{cluster_id}")
}

/// Tags for a new instance.
///
/// User tags whose key starts with [`CLUSTER_TAG_KEY_PREFIX`] or equals
/// [`NAME_TAG_KEY`] are dropped, then the ownership and provenance tags are
/// appended and duplicates removed. Reserved keys therefore always carry
/// their reserved values.
pub fn build_tag_list(machine_name: &str, cluster_id: &str, user_tags: &[Tag]) -> Vec<Tag> {
    let mut tags: Vec<Tag> = user_tags
        .iter()
        .filter(|t| !t.key.starts_with(CLUSTER_TAG_KEY_PREFIX) && t.key != NAME_TAG_KEY)
        .cloned()
        .collect();

    tags.extend([
        Tag::new(cluster_tag_key(cluster_id), CLUSTER_TAG_VALUE),
        Tag::new(NAME_TAG_KEY, machine_name),
        Tag::new(OWNED_TAG_KEY, OWNED_TAG_VALUE),
        Tag::new(ORIGIN_TAG_KEY, ORIGIN_TAG_VALUE),
        Tag::new(ISV_INTEGRATION_TAG_KEY, ORIGIN_TAG_VALUE),
    ]);

    remove_duplicated_tags(tags)
}

/// Keep the first tag of every key, preserving order
pub fn remove_duplicated_tags(tags: Vec<Tag>) -> Vec<Tag> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|t| seen.insert(t.key.clone()))
        .collect()
}

/// Tags identifying the instances of one machine
pub fn cluster_tag_filter(cluster_id: &str, machine_name: &str) -> Vec<EcsTag> {
    vec![
        EcsTag::new(cluster_tag_key(cluster_id), CLUSTER_TAG_VALUE),
        EcsTag::new(NAME_TAG_KEY, machine_name),
    ]
}

/// Tags written back onto an instance whose ownership tags drifted
pub fn tag_resource_tags(cluster_id: &str, machine_name: &str) -> Vec<EcsTag> {
    let mut tags = cluster_tag_filter(cluster_id, machine_name);
    tags.push(EcsTag::new(OWNED_TAG_KEY, OWNED_TAG_VALUE));
    tags
}

/// Convert provider config tags to cloud tags
pub fn to_ecs_tags(tags: &[Tag]) -> Vec<EcsTag> {
    tags.iter()
        .map(|t| EcsTag::new(t.key.clone(), t.value.clone()))
        .collect()
}
