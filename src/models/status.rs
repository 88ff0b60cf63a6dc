// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::models::property::{
    DPID_BRIGHTNESS, DPID_COLOR_TEMP, DPID_HSV_COLOR, DPID_POWER, DPID_WHITE_LEVEL,
    DeviceProperty, parse_hsv,
};

/// Motion state arrives on this dpid for 02xx sensors.
pub const SENSOR_DPID_MOTION: u32 = 1;
/// Illuminance (lux) arrives on this dpid for 02xx sensors.
pub const SENSOR_DPID_ILLUMINANCE: u32 = 4;

/// Decoded light driver state.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct LightStatus {
    pub is_on: Option<bool>,
    pub brightness: Option<u16>,
    pub white_level: Option<u8>,
    pub color_temp_kelvin: Option<u16>,
    pub hsv: Option<(u16, u16, u16)>,
}

/// Folds a property list into a [`LightStatus`]; unknown dpids are
/// ignored.
pub fn decode_light_status(properties: &[DeviceProperty]) -> LightStatus {
    let mut status = LightStatus::default();
    for prop in properties {
        match prop.dpid {
            DPID_POWER => status.is_on = prop.value.as_bool(),
            DPID_BRIGHTNESS => {
                status.brightness = prop.value.as_u64().map(|v| v.min(1000) as u16);
            },
            DPID_WHITE_LEVEL => {
                status.white_level = prop.value.as_u64().map(|v| v.min(255) as u8);
            },
            DPID_COLOR_TEMP => {
                status.color_temp_kelvin =
                    prop.value.as_u64().map(|v| v.min(u64::from(u16::MAX)) as u16);
            },
            DPID_HSV_COLOR => {
                status.hsv = prop.value.as_str().and_then(parse_hsv);
            },
            _ => {},
        }
    }
    status
}

/// Decoded motion sensor state.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MotionStatus {
    pub state: u8,
    pub is_occupied: bool,
}

pub fn decode_motion_status(properties: &[DeviceProperty]) -> Option<MotionStatus> {
    properties
        .iter()
        .find(|p| p.dpid == SENSOR_DPID_MOTION)
        .and_then(|p| p.value.as_u64())
        .map(|v| MotionStatus {
            state: v.min(255) as u8,
            is_occupied: v == 1,
        })
}

/// Decoded illuminance sensor reading.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IlluminanceStatus {
    pub illuminance: u32,
}

pub fn decode_illuminance_status(
    properties: &[DeviceProperty],
) -> Option<IlluminanceStatus> {
    properties
        .iter()
        .find(|p| p.dpid == SENSOR_DPID_ILLUMINANCE)
        .and_then(|p| p.value.as_u64())
        .map(|v| IlluminanceStatus {
            illuminance: v.min(u64::from(u32::MAX)) as u32,
        })
}

/// Key event kinds a push-button panel can report.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    Press,
    Hold,
    DoublePress,
    Rotate,
    Release,
}

impl PanelEvent {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(PanelEvent::Press),
            2 => Some(PanelEvent::Hold),
            3 => Some(PanelEvent::DoublePress),
            4 => Some(PanelEvent::Rotate),
            5 => Some(PanelEvent::Release),
            _ => None,
        }
    }
}

impl fmt::Display for PanelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PanelEvent::Press => "press",
            PanelEvent::Hold => "hold",
            PanelEvent::DoublePress => "double_press",
            PanelEvent::Rotate => "rotate",
            PanelEvent::Release => "release",
        })
    }
}

/// One key event from a panel.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PanelStatus {
    pub key_no: u8,
    pub event: PanelEvent,
    /// Signed rotation delta, meaningful only for [`PanelEvent::Rotate`].
    pub rotate_value: i16,
}

/// Decodes panel key events from a property list.
///
/// The key number is the property dpid; the event code sits in the low
/// byte of the value, the rotation delta in the next byte (two's
/// complement). Properties with unknown event codes are skipped.
pub fn decode_panel_events(properties: &[DeviceProperty]) -> Vec<PanelStatus> {
    properties
        .iter()
        .filter_map(|prop| {
            let raw = prop.value.as_u64()?;
            let event = PanelEvent::from_code((raw & 0xff) as u8)?;
            let rotate_value = if event == PanelEvent::Rotate {
                i16::from(((raw >> 8) & 0xff) as u8 as i8)
            } else {
                0
            };
            Some(PanelStatus {
                key_no: prop.dpid.min(255) as u8,
                event,
                rotate_value,
            })
        })
        .collect()
}
