//! Minimal MQTT 3.1.1 client speaking to the gateway's broker.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Packet serialization.
pub mod codec;
/// Connection lifecycle, read loop and keep-alive.
pub mod connection;
/// TLS client configuration.
pub mod tls;

pub use codec::{Packet, Publish};
pub use connection::{MqttConnection, MqttError, MqttOptions};
