// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{cfg::logger::LogConfig, models::gateway::GatewayDescriptor};

/// Host-application configuration: where the gateway is, how to talk to
/// it, and how to log. One YAML document carries both sections;
/// [`crate::cfg::logger::init_logger`] consumes the `logger` section of
/// the same file. Protocol timing (discovery windows, batch window,
/// query budgets) is compile-time and intentionally absent here.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// The gateway this process talks to.
    pub gateway: GatewayDescriptor,
    /// Logging setup; optional so library embedders that install their
    /// own subscriber can omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<LogConfig>,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.gateway.gw_sn.is_empty(),
            "gateway serial must not be empty"
        );
        ensure!(!self.gateway.gw_ip.is_empty(), "gateway ip must not be empty");
        ensure!(self.gateway.port != 0, "gateway port must not be 0");
        if let Some(ca_cert) = &self.gateway.ca_cert {
            ensure!(
                self.gateway.is_tls,
                "ca_cert is set but is_tls is false"
            );
            ensure!(
                !ca_cert.as_os_str().is_empty(),
                "ca_cert must not be empty when set"
            );
        }

        self.gateway.normalize();
        Ok(())
    }
}
