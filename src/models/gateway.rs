// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything needed to reach one gateway, immutable after discovery.
///
/// Credentials are kept in cleartext here; persisting them (base64 or
/// otherwise) is the host application's business.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GatewayDescriptor {
    /// Serial number, the unique identity of the gateway.
    pub gw_sn: String,
    /// IPv4 address the broker listens on.
    pub gw_ip: String,
    /// Broker TCP port.
    pub port: u16,
    /// Whether the broker expects TLS.
    #[serde(default)]
    pub is_tls: bool,
    /// Human-readable name; defaults to `"Dali Gateway <gw_sn>"`.
    #[serde(default)]
    pub name: String,
    /// Broker username.
    pub username: String,
    /// Broker password.
    pub passwd: String,
    /// DALI bus channels the gateway exposes.
    #[serde(default = "default_channel_total")]
    pub channel_total: Vec<u8>,
    /// Override for the bundled CA certificate used on TLS connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

fn default_channel_total() -> Vec<u8> {
    vec![0]
}

/// Builds the default display name for a gateway serial.
pub fn default_gateway_name(gw_sn: &str) -> String {
    format!("Dali Gateway {gw_sn}")
}

impl GatewayDescriptor {
    /// Fills in defaultable fields left empty by discovery or config.
    pub fn normalize(&mut self) {
        if self.name.is_empty() {
            self.name = default_gateway_name(&self.gw_sn);
        }
        if self.channel_total.is_empty() {
            self.channel_total = default_channel_total();
        }
    }
}

/// Software/firmware pair reported by `getVersion`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub software: String,
    pub firmware: String,
}
