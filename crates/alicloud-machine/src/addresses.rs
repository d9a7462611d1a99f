//! Node addresses derived from an ECS instance

use std::net::Ipv6Addr;

use alicloud_common::crd::{NodeAddress, NodeAddressType};
use alicloud_ecs::Instance;

/// Addresses reported on the Machine for `instance`.
///
/// Order: every IPv6 address and then every private IPv4 address of every
/// network interface (InternalIP), every public IPv4 address (ExternalIP),
/// and finally `dns_name` as InternalDNS. IPv6 addresses are written in
/// canonical form; ones that do not parse are kept as reported.
pub fn derive_node_addresses(instance: Option<&Instance>, dns_name: &str) -> Option<Vec<NodeAddress>> {
    let instance = instance?;
    let mut addresses = Vec::new();

    for eni in &instance.network_interfaces {
        for ip in &eni.ipv6_addresses {
            addresses.push(NodeAddress::new(NodeAddressType::InternalIp, canonical_ipv6(ip)));
        }
    }

    for eni in &instance.network_interfaces {
        for ip in &eni.private_ip_addresses {
            addresses.push(NodeAddress::new(NodeAddressType::InternalIp, ip.clone()));
        }
    }

    for ip in &instance.public_ip_addresses {
        addresses.push(NodeAddress::new(NodeAddressType::ExternalIp, ip.clone()));
    }

    addresses.push(NodeAddress::new(NodeAddressType::InternalDns, dns_name));

    Some(addresses)
}

fn canonical_ipv6(raw: &str) -> String {
    raw.parse::<Ipv6Addr>()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| raw.to_string())
}
