// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use dali_gateway_rs::models::{
    property::{DataType, DeviceProperty},
    status::{
        PanelEvent, decode_illuminance_status, decode_light_status,
        decode_motion_status, decode_panel_events,
    },
};
use serde_json::json;

fn prop(dpid: u32, data_type: DataType, value: serde_json::Value) -> DeviceProperty {
    DeviceProperty {
        dpid,
        data_type,
        value,
    }
}

#[test]
fn light_status_decodes_power_and_brightness() {
    let props = vec![
        prop(20, DataType::Bool, json!(true)),
        prop(22, DataType::Uint16, json!(500)),
    ];
    let status = decode_light_status(&props);
    assert_eq!(status.is_on, Some(true));
    assert_eq!(status.brightness, Some(500));
    assert_eq!(status.color_temp_kelvin, None);
    assert_eq!(status.hsv, None);
}

#[test]
fn light_status_decodes_color() {
    let props = vec![
        prop(23, DataType::Uint16, json!(4000)),
        prop(24, DataType::String, json!("016703e803e8")),
        prop(21, DataType::Uint8, json!(64)),
    ];
    let status = decode_light_status(&props);
    assert_eq!(status.color_temp_kelvin, Some(4000));
    assert_eq!(status.hsv, Some((359, 1000, 1000)));
    assert_eq!(status.white_level, Some(64));
}

#[test]
fn light_status_ignores_unknown_dpids() {
    let props = vec![prop(99, DataType::Uint16, json!(1))];
    assert_eq!(decode_light_status(&props), Default::default());
}

#[test]
fn panel_hold_event() {
    let props = vec![prop(1, DataType::Uint8, json!(2))];
    let events = decode_panel_events(&props);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key_no, 1);
    assert_eq!(events[0].event, PanelEvent::Hold);
    assert_eq!(events[0].event.to_string(), "hold");
    assert_eq!(events[0].rotate_value, 0);
}

#[test]
fn panel_multiple_keys_in_one_message() {
    let props = vec![
        prop(1, DataType::Uint8, json!(1)),
        prop(2, DataType::Uint8, json!(5)),
    ];
    let events = decode_panel_events(&props);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, PanelEvent::Press);
    assert_eq!(events[1].key_no, 2);
    assert_eq!(events[1].event, PanelEvent::Release);
}

#[test]
fn panel_rotate_carries_signed_delta() {
    let raw = (u64::from((-3i8) as u8) << 8) | 4;
    let props = vec![prop(1, DataType::Uint16, json!(raw))];
    let events = decode_panel_events(&props);
    assert_eq!(events[0].event, PanelEvent::Rotate);
    assert_eq!(events[0].rotate_value, -3);

    let raw = (7u64 << 8) | 4;
    let props = vec![prop(1, DataType::Uint16, json!(raw))];
    assert_eq!(decode_panel_events(&props)[0].rotate_value, 7);
}

#[test]
fn panel_unknown_code_skipped() {
    let props = vec![prop(2, DataType::Uint8, json!(9))];
    assert!(decode_panel_events(&props).is_empty());
}

#[test]
fn motion_state() {
    let props = vec![prop(1, DataType::Uint8, json!(1))];
    let motion = decode_motion_status(&props).expect("motion");
    assert!(motion.is_occupied);
    assert_eq!(motion.state, 1);

    let props = vec![prop(1, DataType::Uint8, json!(0))];
    assert!(!decode_motion_status(&props).expect("motion").is_occupied);

    assert!(decode_motion_status(&[]).is_none());
}

#[test]
fn illuminance_reading() {
    let props = vec![prop(4, DataType::Uint16, json!(250))];
    let lux = decode_illuminance_status(&props).expect("illuminance");
    assert_eq!(lux.illuminance, 250);

    assert!(decode_illuminance_status(&[]).is_none());
}
