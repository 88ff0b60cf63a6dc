// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Translation tables between library-side snake_case parameter names
//! and their wire spellings.
//!
//! The wire spellings are historical and must stay bit-exact, typos
//! included (`occpyTime`, `waringRuntimeMax`).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

/// Parameter bag passed to and from the configuration commands.
pub type ParamMap = Map<String, Value>;

const DEVICE_PARAM_KEY_PAIRS: &[(&str, &str)] = &[
    ("address", "address"),
    ("fade_time", "fadeTime"),
    ("fade_rate", "fadeRate"),
    ("power_status", "powerStatus"),
    ("system_failure_status", "systemFailureStatus"),
    ("max_brightness", "maxBrightness"),
    ("min_brightness", "minBrightness"),
    ("standby_power", "standbyPower"),
    ("max_power", "maxPower"),
    ("cct_cool", "cctCool"),
    ("cct_warm", "cctWarm"),
    ("phy_cct_cool", "phyCctCool"),
    ("phy_cct_warm", "phyCctWarm"),
    ("step_cct", "stepCCT"),
    ("temp_thresholds", "tempThresholds"),
    ("runtime_thresholds", "runtimeThresholds"),
    ("waring_runtime_max", "waringRuntimeMax"),
    ("waring_temperature_max", "waringTemperatureMax"),
];

const SENSOR_PARAM_KEY_PAIRS: &[(&str, &str)] = &[
    ("enable", "enable"),
    ("occpy_time", "occpyTime"),
    ("report_time", "reportTime"),
    ("down_time", "downTime"),
    ("coverage", "coverage"),
    ("sensitivity", "sensitivity"),
];

static DEVICE_PARAM_TO_WIRE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| DEVICE_PARAM_KEY_PAIRS.iter().copied().collect());

static DEVICE_PARAM_FROM_WIRE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| DEVICE_PARAM_KEY_PAIRS.iter().map(|&(k, v)| (v, k)).collect());

static SENSOR_PARAM_TO_WIRE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| SENSOR_PARAM_KEY_PAIRS.iter().copied().collect());

static SENSOR_PARAM_FROM_WIRE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| SENSOR_PARAM_KEY_PAIRS.iter().map(|&(k, v)| (v, k)).collect());

fn translate(params: &ParamMap, table: &HashMap<&'static str, &'static str>) -> ParamMap {
    params
        .iter()
        .map(|(key, value)| {
            let key = table.get(key.as_str()).map_or_else(
                || key.clone(),
                |mapped| (*mapped).to_string(),
            );
            (key, value.clone())
        })
        .collect()
}

/// snake_case device parameters → wire casing. Unknown keys pass through.
pub fn device_params_to_wire(params: &ParamMap) -> ParamMap {
    translate(params, &DEVICE_PARAM_TO_WIRE)
}

/// Wire device parameters → snake_case. Unknown keys pass through.
pub fn device_params_from_wire(params: &ParamMap) -> ParamMap {
    translate(params, &DEVICE_PARAM_FROM_WIRE)
}

/// snake_case sensor parameters → wire casing. Unknown keys pass through.
pub fn sensor_params_to_wire(params: &ParamMap) -> ParamMap {
    translate(params, &SENSOR_PARAM_TO_WIRE)
}

/// Wire sensor parameters → snake_case. Unknown keys pass through.
pub fn sensor_params_from_wire(params: &ParamMap) -> ParamMap {
    translate(params, &SENSOR_PARAM_FROM_WIRE)
}
