// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

/// Type code addressing every device of the matching category at once.
pub const BROADCAST_DEV_TYPE: &str = "FFFF";

/// Coarse device category, taken from the first two hex digits of the
/// type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCategory {
    Light,
    Sensor,
    Panel,
    Broadcast,
    Unknown,
}

/// The `(dev_type, channel, address)` triple addressing one device on
/// one gateway.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAddress {
    pub dev_type: String,
    pub channel: u8,
    pub address: u8,
}

impl DeviceAddress {
    pub fn new(dev_type: impl Into<String>, channel: u8, address: u8) -> Self {
        Self {
            dev_type: dev_type.into(),
            channel,
            address,
        }
    }

    pub fn category(&self) -> DeviceCategory {
        if self.dev_type == BROADCAST_DEV_TYPE {
            return DeviceCategory::Broadcast;
        }
        match self.dev_type.get(..2) {
            Some("01") => DeviceCategory::Light,
            Some("02") => DeviceCategory::Sensor,
            Some("03") => DeviceCategory::Panel,
            _ => DeviceCategory::Unknown,
        }
    }

    /// Stable per-device identifier, scoped by gateway serial.
    pub fn unique_id(&self, gw_sn: &str) -> String {
        format!("{}-{}-{}-{gw_sn}", self.dev_type, self.channel, self.address)
    }

    /// Key used to coalesce per-device requests inside one batch window.
    pub fn batch_key(&self) -> String {
        format!("{}_{}_{}", self.dev_type, self.channel, self.address)
    }
}

/// One device as reported by a bus scan (`searchDevRes`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub dev_type: String,
    pub channel: u8,
    pub address: u8,
    pub status: String,
    pub name: String,
    pub dev_sn: String,
    pub area_name: String,
    pub area_id: String,
    pub id: String,
    pub unique_id: String,
}

impl DeviceDescriptor {
    pub fn address(&self) -> DeviceAddress {
        DeviceAddress::new(self.dev_type.clone(), self.channel, self.address)
    }
}

/// Marketing model string for a device type code.
pub fn device_model(dev_type: &str) -> Option<&'static str> {
    let model = match dev_type {
        "0101" => "DALI DT6 Dimmable Driver",
        "0102" => "DALI DT8 Tc Dimmable Driver",
        "0103" => "DALI DT8 RGB Dimmable Driver",
        "0104" => "DALI DT8 XY Dimmable Driver",
        "0105" => "DALI DT8 RGBW Dimmable Driver",
        "0106" => "DALI DT8 RGBWA Dimmable Driver",
        "0201" => "DALI-2 Motion Sensor",
        "0202" => "DALI-2 Illuminance Sensor",
        "0302" => "DALI-2 2-Key Push Button Panel",
        "0304" => "DALI-2 4-Key Push Button Panel",
        "0306" => "DALI-2 6-Key Push Button Panel",
        "0308" => "DALI-2 8-Key Push Button Panel",
        other if motion_variant_index(other).is_some() => "DALI-2 Motion Sensor",
        _ => return None,
    };
    Some(model)
}

/// Short human-readable type name for a device type code. Motion-sensor
/// variants keep their index (`"Motion (1)"` .. `"Motion (20)"`).
pub fn device_type_name(dev_type: &str) -> Option<String> {
    let name = match dev_type {
        "0101" => "Dimmer",
        "0102" => "CCT",
        "0103" => "RGB",
        "0104" => "XY",
        "0105" => "RGBW",
        "0106" => "RGBWA",
        "0201" => "Motion",
        "0202" => "Illuminance",
        "0302" => "2-Key Panel",
        "0304" => "4-Key Panel",
        "0306" => "6-Key Panel",
        "0308" => "8-Key Panel",
        other => {
            return motion_variant_index(other).map(|i| format!("Motion ({i})"));
        },
    };
    Some(name.to_string())
}

/// Motion sensors report 6-digit variant codes 020101..020120; returns
/// the variant index.
fn motion_variant_index(dev_type: &str) -> Option<u8> {
    if dev_type.len() != 6 || !dev_type.starts_with("0201") {
        return None;
    }
    dev_type
        .get(4..)
        .and_then(|s| s.parse::<u8>().ok())
        .filter(|n| (1..=20).contains(n))
}

/// Default name for an unnamed device found on a bus scan.
pub fn default_device_name(dev_type: &str, channel: u8, address: u8) -> String {
    let type_name =
        device_type_name(dev_type).unwrap_or_else(|| "Device".to_string());
    format!("{type_name} {channel:02}-{address:02}")
}

/// Number of keys on a push-button panel type, if it is one.
pub fn panel_button_count(dev_type: &str) -> Option<u8> {
    match dev_type {
        "0300" => Some(1),
        "0302" => Some(2),
        "0304" => Some(4),
        "0306" => Some(6),
        "0308" => Some(8),
        _ => None,
    }
}
