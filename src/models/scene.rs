// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

/// Stable scene identifier, scoped by channel and gateway serial.
pub fn scene_unique_id(channel: u8, scene_id: u16, gw_sn: &str) -> String {
    format!("{channel}-{scene_id}-{gw_sn}")
}

/// Stable group identifier, scoped by channel and gateway serial.
pub fn group_unique_id(channel: u8, group_id: u16, gw_sn: &str) -> String {
    format!("{channel}-{group_id}-{gw_sn}")
}

/// One stored scene as reported by `getScene`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SceneDescriptor {
    pub id: u16,
    pub name: String,
    pub channel: u8,
    pub area_id: String,
    pub unique_id: String,
}

/// One group as reported by `getGroup`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub id: u16,
    pub name: String,
    pub channel: u8,
    pub area_id: String,
    pub unique_id: String,
}
