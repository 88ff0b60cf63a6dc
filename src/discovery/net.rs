// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::{IpAddr, Ipv4Addr};

use local_ip_address::list_afinet_netifas;
use tracing::{debug, warn};

/// One IPv4 interface usable for multicast discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// OS interface name (e.g. "eth0", "en0").
    pub name: String,
    /// IPv4 address bound to the interface.
    pub address: Ipv4Addr,
}

/// Lists every non-loopback, non-link-local IPv4 interface.
pub fn valid_interfaces() -> Vec<InterfaceInfo> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            warn!("failed to list network interfaces: {e}");
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| match addr {
            IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_link_local() => {
                debug!("using interface {name} ({ip})");
                Some(InterfaceInfo { name, address: ip })
            },
            _ => None,
        })
        .collect()
}
