// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Power state (on/off).
pub const DPID_POWER: u32 = 20;
/// White level for RGBW devices (0-255).
pub const DPID_WHITE_LEVEL: u32 = 21;
/// Brightness level (0-1000, the gateway maps to 0-100%).
pub const DPID_BRIGHTNESS: u32 = 22;
/// Color temperature in Kelvin.
pub const DPID_COLOR_TEMP: u32 = 23;
/// HSV color as a 12-hex-digit string.
pub const DPID_HSV_COLOR: u32 = 24;
/// Energy consumption value, stringified float.
pub const DPID_ENERGY: u32 = 30;

/// Wire data type of a property value.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "uint8")]
    Uint8,
    #[serde(rename = "uint16")]
    Uint16,
    #[serde(rename = "string")]
    String,
}

/// One `{dpid, dataType, value}` triple.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DeviceProperty {
    pub dpid: u32,
    #[serde(rename = "dataType")]
    pub data_type: DataType,
    pub value: Value,
}

impl DeviceProperty {
    pub fn power(on: bool) -> Self {
        Self {
            dpid: DPID_POWER,
            data_type: DataType::Bool,
            value: Value::Bool(on),
        }
    }

    pub fn white_level(level: u8) -> Self {
        Self {
            dpid: DPID_WHITE_LEVEL,
            data_type: DataType::Uint8,
            value: Value::from(level),
        }
    }

    /// Brightness, clamped into the gateway's 0..=1000 range.
    pub fn brightness(level: i64) -> Self {
        Self {
            dpid: DPID_BRIGHTNESS,
            data_type: DataType::Uint16,
            value: Value::from(clamp_brightness(level)),
        }
    }

    pub fn color_temp(kelvin: u16) -> Self {
        Self {
            dpid: DPID_COLOR_TEMP,
            data_type: DataType::Uint16,
            value: Value::from(kelvin),
        }
    }

    pub fn hsv(h: u16, s: u16, v: u16) -> Self {
        Self {
            dpid: DPID_HSV_COLOR,
            data_type: DataType::String,
            value: Value::String(pack_hsv(h, s, v)),
        }
    }
}

/// Clamps a requested brightness into 0..=1000.
pub fn clamp_brightness(level: i64) -> u16 {
    level.clamp(0, 1000) as u16
}

/// Converts 8-bit RGB into the gateway's HSV scale: hue in degrees
/// 0..=359, saturation and value in 0..=1000. Fractional components
/// truncate toward zero.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u16, u16, u16) {
    let rf = f64::from(r) / 255.0;
    let gf = f64::from(g) / 255.0;
    let bf = f64::from(b) / 255.0;

    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * ((gf - bf) / delta).rem_euclid(6.0)
    } else if max == gf {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };

    let sat = if max == 0.0 { 0.0 } else { delta / max * 1000.0 };
    let val = max * 1000.0;

    ((hue as u16) % 360, sat as u16, val as u16)
}

/// Packs an HSV triple into the wire's 12-lowercase-hex-digit string.
pub fn pack_hsv(h: u16, s: u16, v: u16) -> String {
    format!("{h:04x}{s:04x}{v:04x}")
}

/// Inverse of [`pack_hsv`]; `None` on anything but 12 hex digits.
pub fn parse_hsv(packed: &str) -> Option<(u16, u16, u16)> {
    if packed.len() != 12 || !packed.is_char_boundary(4) || !packed.is_char_boundary(8)
    {
        return None;
    }
    let h = u16::from_str_radix(&packed[..4], 16).ok()?;
    let s = u16::from_str_radix(&packed[4..8], 16).ok()?;
    let v = u16::from_str_radix(&packed[8..], 16).ok()?;
    Some((h, s, v))
}

/// Assembles the property list for a turn-on command.
///
/// The HSV property is emitted only when at least one of R, G, B is
/// non-zero; the white-level property only when W > 0.
pub fn light_on_properties(
    brightness: Option<i64>,
    color_temp_kelvin: Option<u16>,
    rgbw: Option<(u8, u8, u8, u8)>,
) -> Vec<DeviceProperty> {
    let mut properties = vec![DeviceProperty::power(true)];

    if let Some(level) = brightness {
        properties.push(DeviceProperty::brightness(level));
    }
    if let Some(kelvin) = color_temp_kelvin {
        properties.push(DeviceProperty::color_temp(kelvin));
    }
    if let Some((r, g, b, w)) = rgbw {
        if r != 0 || g != 0 || b != 0 {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            properties.push(DeviceProperty::hsv(h, s, v));
        }
        if w > 0 {
            properties.push(DeviceProperty::white_level(w));
        }
    }

    properties
}

/// Property list for a turn-off command.
pub fn light_off_properties() -> Vec<DeviceProperty> {
    vec![DeviceProperty::power(false)]
}
