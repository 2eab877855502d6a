// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Address and port allocation.

use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;

use ipnet::{Ipv4AddrRange, Ipv4Net};

use crate::error::{Error, Result};
use crate::runtime::NetworkInfo;

fn strip_prefix_len(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}

/// First address of the network's subnet that no one holds.
///
/// The subnet's network address, the gateway and every attached endpoint
/// count as taken. The scan covers the whole range in ascending order.
pub fn first_free_address(network: &NetworkInfo) -> Result<Ipv4Addr> {
    let subnet: Ipv4Net = network
        .subnet
        .as_deref()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::MissingField("subnet".to_string()))?;

    let mut taken: HashSet<Ipv4Addr> = network
        .endpoints
        .iter()
        .filter_map(|e| strip_prefix_len(e).parse().ok())
        .collect();
    taken.insert(subnet.network());
    if let Some(gateway) = network
        .gateway
        .as_deref()
        .and_then(|g| strip_prefix_len(g).parse().ok())
    {
        taken.insert(gateway);
    }

    Ipv4AddrRange::new(subnet.network(), subnet.broadcast())
        .find(|address| !taken.contains(address))
        .ok_or_else(|| Error::PoolExhausted(network.name.clone()))
}

/// First port at or above `start` that is neither occupied nor excluded.
pub fn next_free_port(start: u16, occupied: &BTreeSet<u16>) -> Option<u16> {
    (start..=u16::MAX).find(|port| !occupied.contains(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(subnet: &str, gateway: Option<&str>, endpoints: &[&str]) -> NetworkInfo {
        NetworkInfo {
            name: "proxy-runner".into(),
            subnet: Some(subnet.into()),
            gateway: gateway.map(String::from),
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_skips_network_gateway_and_endpoints() {
        let net = network("10.10.0.0/24", Some("10.10.0.1"), &["10.10.0.2/24", "10.10.0.4/24"]);
        assert_eq!(first_free_address(&net).unwrap(), Ipv4Addr::new(10, 10, 0, 3));
    }

    #[test]
    fn test_exhausted_pool() {
        let net = network("10.10.0.0/31", None, &["10.10.0.1"]);
        match first_free_address(&net) {
            Err(Error::PoolExhausted(name)) => assert_eq!(name, "proxy-runner"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_subnet() {
        let net = NetworkInfo {
            name: "n".into(),
            ..NetworkInfo::default()
        };
        assert!(matches!(first_free_address(&net), Err(Error::MissingField(_))));
    }

    #[test]
    fn test_next_free_port() {
        let occupied = BTreeSet::from([8080, 8081, 8083]);
        assert_eq!(next_free_port(8080, &occupied), Some(8082));
        assert_eq!(next_free_port(3128, &occupied), Some(3128));
        assert_eq!(next_free_port(u16::MAX, &BTreeSet::from([u16::MAX])), None);
    }
}
