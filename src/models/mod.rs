//! Data model and JSON codec layer for the gateway wire protocol.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Device addressing, descriptors and catalog lookups.
pub mod device;
/// Gateway descriptor and version info.
pub mod gateway;
/// Device/sensor parameter key translation tables.
pub mod params;
/// DPID property encoding (brightness, color, energy).
pub mod property;
/// Scene and group descriptors.
pub mod scene;
/// Typed status decoding from property lists.
pub mod status;
/// Wire message shapes and the outbound envelope.
pub mod wire;
