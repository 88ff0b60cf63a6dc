//! LAN multicast gateway discovery.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Discovery engine driving send/receive loops.
pub mod engine;
/// Multicast listener and per-interface senders.
pub mod multicast;
/// Network interface enumeration.
pub mod net;

pub use engine::{DISCOVERY_TIMEOUT, GatewayDiscovery, SEND_INTERVAL, parse_gateway_datagram};
