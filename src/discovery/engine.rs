// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashSet, time::Duration};

use serde::Deserialize;
use serde_json::Value;
use tokio::time::{Instant, interval, sleep_until};
use tracing::{Instrument, debug, info, warn};

use crate::{
    crypto,
    discovery::{
        multicast::{self, MulticastListener},
        net,
    },
    error::{ErrorCode, GatewayError},
    models::gateway::{GatewayDescriptor, default_gateway_name},
};

/// Overall budget for one discovery call.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(180);
/// Interval between multicast bursts.
pub const SEND_INTERVAL: Duration = Duration::from_secs(2);

/// LAN gateway discovery driver.
///
/// One call sends the encrypted discovery datagram on every interface
/// every [`SEND_INTERVAL`] and collects replies until the first gateway
/// (or the requested serial) answers, or [`DISCOVERY_TIMEOUT`] expires.
#[derive(Debug, Clone)]
pub struct GatewayDiscovery {
    timeout: Duration,
    send_interval: Duration,
}

impl Default for GatewayDiscovery {
    fn default() -> Self {
        Self {
            timeout: DISCOVERY_TIMEOUT,
            send_interval: SEND_INTERVAL,
        }
    }
}

impl GatewayDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the overall timeout. Mostly useful in tests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Discovers gateways on the local network.
    ///
    /// With `gateway_sn = None` the call completes at the first valid
    /// reply; with a serial it keeps listening until that gateway
    /// answers. Timing out is not an error: the accumulated (possibly
    /// empty) list is returned.
    pub async fn discover(
        &self,
        gateway_sn: Option<&str>,
    ) -> Result<Vec<GatewayDescriptor>, GatewayError> {
        let interfaces = net::valid_interfaces();
        if interfaces.is_empty() {
            return Err(GatewayError::Discovery {
                gw_sn: gateway_sn.map(str::to_string),
                code: ErrorCode::DiscoveryNoInterfaces,
                message: "no usable network interfaces".to_string(),
            });
        }

        let message =
            crypto::build_discovery_message().map_err(|e| GatewayError::Discovery {
                gw_sn: gateway_sn.map(str::to_string),
                code: ErrorCode::DiscoveryMessageError,
                message: format!("failed to build discovery message: {e}"),
            })?;

        let listener = MulticastListener::open(&interfaces).map_err(|e| {
            GatewayError::Network {
                gw_sn: gateway_sn.map(str::to_string),
                code: ErrorCode::DiscoveryFailed,
                message: format!("failed to open discovery listener: {e}"),
            }
        })?;

        let span = tracing::info_span!(
            "gateway_discovery",
            filter = gateway_sn.unwrap_or_default(),
            interfaces = interfaces.len(),
        );
        let result = self
            .run(&listener, &interfaces, &message, gateway_sn)
            .instrument(span)
            .await;
        listener.close();
        Ok(result)
    }

    async fn run(
        &self,
        listener: &MulticastListener,
        interfaces: &[net::InterfaceInfo],
        message: &[u8],
        gateway_sn: Option<&str>,
    ) -> Vec<GatewayDescriptor> {
        let deadline = Instant::now() + self.timeout;
        let mut send_tick = interval(self.send_interval);
        let mut seen: HashSet<String> = HashSet::new();
        let mut found: Vec<GatewayDescriptor> = Vec::new();
        let mut buf = vec![0u8; 2048];

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    warn!("gateway discovery timed out");
                    break;
                },
                _ = send_tick.tick() => {
                    multicast::send_to_all(interfaces, message);
                },
                received = listener.recv(&mut buf) => {
                    let (len, addr) = match received {
                        Ok(ok) => ok,
                        Err(e) => {
                            debug!("discovery recv error: {e}");
                            continue;
                        },
                    };
                    let Some(gateway) = parse_gateway_datagram(&buf[..len]) else {
                        continue;
                    };
                    if !seen.insert(gateway.gw_sn.clone()) {
                        continue;
                    }
                    info!(
                        "discovered gateway {} ({}) at {addr}",
                        gateway.gw_sn, gateway.name
                    );
                    let done = match gateway_sn {
                        Some(wanted) => gateway.gw_sn == wanted,
                        None => true,
                    };
                    found.push(gateway);
                    if done {
                        break;
                    }
                },
            }
        }

        found
    }
}

#[derive(Deserialize, Debug)]
struct DiscoveryReply {
    data: Option<DiscoveryData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DiscoveryData {
    gw_sn: Option<String>,
    gw_ip: Option<String>,
    port: Option<u16>,
    #[serde(rename = "isMqttTls", default)]
    is_mqtt_tls: bool,
    #[serde(default)]
    name: Option<String>,
    username: Option<String>,
    passwd: Option<String>,
    #[serde(rename = "channelTotal", default)]
    channel_total: Vec<Value>,
}

/// Parses one discovery reply datagram into a descriptor.
///
/// Malformed datagrams, missing fields and credential decryption
/// failures all yield `None`; discovery keeps listening.
pub fn parse_gateway_datagram(datagram: &[u8]) -> Option<GatewayDescriptor> {
    let reply: DiscoveryReply = match serde_json::from_slice(datagram) {
        Ok(reply) => reply,
        Err(e) => {
            debug!("skipping malformed discovery datagram: {e}");
            return None;
        },
    };
    let data = reply.data?;

    let gw_sn = data.gw_sn?;
    let gw_ip = data.gw_ip?;
    let port = data.port?;

    let username = match crypto::decrypt(data.username?.as_str(), crypto::MASTER_KEY) {
        Ok(username) => username,
        Err(e) => {
            debug!("failed to decrypt username for {gw_sn}: {e}");
            return None;
        },
    };
    let passwd = match crypto::decrypt(data.passwd?.as_str(), crypto::MASTER_KEY) {
        Ok(passwd) => passwd,
        Err(e) => {
            debug!("failed to decrypt password for {gw_sn}: {e}");
            return None;
        },
    };

    let name = match data.name {
        Some(name) if !name.is_empty() => name,
        _ => default_gateway_name(&gw_sn),
    };

    let channel_total = data
        .channel_total
        .iter()
        .filter_map(coerce_channel)
        .collect();

    Some(GatewayDescriptor {
        gw_sn,
        gw_ip,
        port,
        is_tls: data.is_mqtt_tls,
        name,
        username,
        passwd,
        channel_total,
        ca_cert: None,
    })
}

/// Gateways report channel indices as a mix of ints and digit strings.
fn coerce_channel(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.parse::<u8>().ok(),
        _ => None,
    }
}
