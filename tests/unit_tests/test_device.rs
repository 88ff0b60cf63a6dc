// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use dali_gateway_rs::models::{
    device::{
        BROADCAST_DEV_TYPE, DeviceAddress, DeviceCategory, default_device_name,
        device_model, device_type_name, panel_button_count,
    },
    scene::{group_unique_id, scene_unique_id},
};

#[test]
fn unique_id_format() {
    let addr = DeviceAddress::new("0101", 0, 1);
    assert_eq!(addr.unique_id("GW-1"), "0101-0-1-GW-1");
    assert_eq!(addr.batch_key(), "0101_0_1");
}

#[test]
fn scene_and_group_id_format() {
    assert_eq!(scene_unique_id(0, 5, "GW-1"), "0-5-GW-1");
    assert_eq!(group_unique_id(1, 12, "GW-1"), "1-12-GW-1");
}

#[test]
fn categories() {
    assert_eq!(DeviceAddress::new("0101", 0, 1).category(), DeviceCategory::Light);
    assert_eq!(DeviceAddress::new("0105", 0, 1).category(), DeviceCategory::Light);
    assert_eq!(
        DeviceAddress::new("020107", 1, 2).category(),
        DeviceCategory::Sensor
    );
    assert_eq!(DeviceAddress::new("0302", 0, 3).category(), DeviceCategory::Panel);
    assert_eq!(
        DeviceAddress::new(BROADCAST_DEV_TYPE, 0, 0).category(),
        DeviceCategory::Broadcast
    );
    assert_eq!(DeviceAddress::new("xx", 0, 0).category(), DeviceCategory::Unknown);
}

#[test]
fn catalog_lookups() {
    assert_eq!(device_model("0101"), Some("DALI DT6 Dimmable Driver"));
    assert_eq!(device_model("0308"), Some("DALI-2 8-Key Push Button Panel"));
    assert_eq!(device_type_name("0105").as_deref(), Some("RGBW"));
    assert_eq!(device_model("beef"), None);
    assert_eq!(device_type_name("beef"), None);
}

#[test]
fn motion_variants_resolve() {
    assert_eq!(device_model("020101"), Some("DALI-2 Motion Sensor"));
    assert_eq!(device_model("020120"), Some("DALI-2 Motion Sensor"));
    assert_eq!(device_model("020121"), None);
    assert_eq!(device_model("020100"), None);
    // variants keep their index in the short name
    assert_eq!(device_type_name("0201").as_deref(), Some("Motion"));
    assert_eq!(device_type_name("020104").as_deref(), Some("Motion (4)"));
    assert_eq!(device_type_name("020120").as_deref(), Some("Motion (20)"));
}

#[test]
fn default_names() {
    assert_eq!(default_device_name("0101", 0, 1), "Dimmer 00-01");
    assert_eq!(default_device_name("0302", 1, 3), "2-Key Panel 01-03");
    assert_eq!(default_device_name("020104", 0, 2), "Motion (4) 00-02");
    assert_eq!(default_device_name("9999", 2, 10), "Device 02-10");
}

#[test]
fn panel_buttons() {
    assert_eq!(panel_button_count("0302"), Some(2));
    assert_eq!(panel_button_count("0308"), Some(8));
    assert_eq!(panel_button_count("0300"), Some(1));
    assert_eq!(panel_button_count("0101"), None);
}
