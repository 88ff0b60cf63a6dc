// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire message shapes for the broker session.
//!
//! Field spellings mirror the gateway firmware exactly; a few of them
//! are historical (`reciver` in the topic names, `searchFlag: "exited"`)
//! and must never be "fixed".

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::models::property::DeviceProperty;

/// Topic the session subscribes to for inbound traffic.
pub fn inbound_topic(gw_sn: &str) -> String {
    format!("/{gw_sn}/client/reciver/")
}

/// Topic the session publishes commands on.
pub fn outbound_topic(gw_sn: &str) -> String {
    format!("/{gw_sn}/server/publish/")
}

/// Starts an outbound envelope: `cmd`, `msgId` (decimal seconds since
/// epoch) and `gwSn` are present on every command.
pub fn envelope(cmd: &str, gw_sn: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("cmd".to_string(), json!(cmd));
    map.insert(
        "msgId".to_string(),
        json!(chrono::Utc::now().timestamp().to_string()),
    );
    map.insert("gwSn".to_string(), json!(gw_sn));
    map
}

/// `devStatus` / `readDevRes` body.
#[derive(Deserialize, Debug)]
pub struct DeviceStatusMessage {
    pub data: DeviceStatusData,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusData {
    pub dev_type: String,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub address: u8,
    #[serde(default)]
    pub property: Vec<DeviceProperty>,
}

/// `onlineStatus` body: one entry per device.
#[derive(Deserialize, Debug)]
pub struct OnlineStatusMessage {
    #[serde(default)]
    pub data: Vec<OnlineStatusEntry>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatusEntry {
    pub dev_type: String,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub address: u8,
    #[serde(default)]
    pub status: bool,
}

/// `searchDevRes` body. `search_status` 1 (final) or 0 (empty) ends the
/// scan; other values mark intermediate chunks.
#[derive(Deserialize, Debug)]
pub struct SearchDeviceMessage {
    #[serde(rename = "searchStatus")]
    pub search_status: i32,
    #[serde(default)]
    pub data: Vec<RawDeviceEntry>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RawDeviceEntry {
    #[serde(default)]
    pub dev_type: String,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub address: u8,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dev_sn: String,
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub dev_id: Option<String>,
}

/// `getSceneRes` body; note the `scene` top-level key.
#[derive(Deserialize, Debug)]
pub struct SceneListMessage {
    #[serde(default)]
    pub scene: Vec<ChannelScenes>,
}

#[derive(Deserialize, Debug)]
pub struct ChannelScenes {
    #[serde(default)]
    pub channel: u8,
    pub data: Option<Vec<RawSceneEntry>>,
}

#[derive(Deserialize, Debug)]
pub struct RawSceneEntry {
    #[serde(rename = "sceneId", default)]
    pub scene_id: u16,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "areaId", default)]
    pub area_id: String,
}

/// `getGroupRes` body; note the `group` top-level key.
#[derive(Deserialize, Debug)]
pub struct GroupListMessage {
    #[serde(default)]
    pub group: Vec<ChannelGroups>,
}

#[derive(Deserialize, Debug)]
pub struct ChannelGroups {
    #[serde(default)]
    pub channel: u8,
    pub data: Option<Vec<RawGroupEntry>>,
}

#[derive(Deserialize, Debug)]
pub struct RawGroupEntry {
    #[serde(rename = "groupId", default)]
    pub group_id: u16,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "areaId", default)]
    pub area_id: String,
}

/// `getVersionRes` body.
#[derive(Deserialize, Debug)]
pub struct VersionMessage {
    #[serde(default)]
    pub data: VersionData,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersionData {
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub fw_version: String,
}

/// `writeDevRes` / `writeGroupRes` / `writeSceneRes` /
/// `setSensorOnOffRes` ack body.
#[derive(Deserialize, Debug)]
pub struct WriteAckMessage {
    #[serde(rename = "msgId", default)]
    pub msg_id: Option<String>,
    #[serde(default)]
    pub ack: bool,
}

/// `identifyDevRes` body.
#[derive(Deserialize, Debug)]
pub struct IdentifyResponseMessage {
    #[serde(default)]
    pub ack: bool,
}

/// `getSensorOnOffRes` body.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SensorOnOffMessage {
    #[serde(default)]
    pub dev_type: String,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub address: u8,
    #[serde(default)]
    pub value: bool,
}

/// `getDevParamRes` / `getSensorParamRes` body: a parameter bag in wire
/// casing next to the device address.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ParamResponseMessage {
    #[serde(default)]
    pub dev_type: String,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub address: u8,
    #[serde(default)]
    pub data: Map<String, Value>,
}
