// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use thiserror::Error;

/// Stable error codes carried by [`GatewayError`].
///
/// The string form of each code is part of the public contract: host
/// applications key retry/help-text logic off it, so the spellings never
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NetworkError,
    ConnectionTimeout,
    DisconnectError,
    SslConfigError,
    /// The gateway only admits new broker credentials after its
    /// provisioning button has been pressed.
    AuthRequired,
    AuthInvalidCredentials,
    MqttConnectionRefused,
    MqttProtocolError,
    MqttBrokerUnavailable,
    DiscoveryNoInterfaces,
    DiscoveryTimeout,
    DiscoveryMessageError,
    DiscoveryFailed,
    /// Fallback for broker result codes without a dedicated mapping.
    Mqtt(u8),
}

impl ErrorCode {
    /// Maps an MQTT CONNACK return code to an error code.
    pub fn from_connack(rc: u8) -> Self {
        match rc {
            1 => ErrorCode::MqttProtocolError,
            2 | 3 => ErrorCode::MqttBrokerUnavailable,
            4 => ErrorCode::AuthRequired,
            5 => ErrorCode::AuthInvalidCredentials,
            n => ErrorCode::Mqtt(n),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::NetworkError => f.write_str("NETWORK_ERROR"),
            ErrorCode::ConnectionTimeout => f.write_str("CONNECTION_TIMEOUT"),
            ErrorCode::DisconnectError => f.write_str("DISCONNECT_ERROR"),
            ErrorCode::SslConfigError => f.write_str("SSL_CONFIG_ERROR"),
            ErrorCode::AuthRequired => f.write_str("AUTH_REQUIRED"),
            ErrorCode::AuthInvalidCredentials => {
                f.write_str("AUTH_INVALID_CREDENTIALS")
            },
            ErrorCode::MqttConnectionRefused => f.write_str("MQTT_CONNECTION_REFUSED"),
            ErrorCode::MqttProtocolError => f.write_str("MQTT_PROTOCOL_ERROR"),
            ErrorCode::MqttBrokerUnavailable => {
                f.write_str("MQTT_BROKER_UNAVAILABLE")
            },
            ErrorCode::DiscoveryNoInterfaces => f.write_str("DISCOVERY_NO_INTERFACES"),
            ErrorCode::DiscoveryTimeout => f.write_str("DISCOVERY_TIMEOUT"),
            ErrorCode::DiscoveryMessageError => f.write_str("DISCOVERY_MESSAGE_ERROR"),
            ErrorCode::DiscoveryFailed => f.write_str("DISCOVERY_FAILED"),
            ErrorCode::Mqtt(n) => write!(f, "MQTT_ERROR_{n}"),
        }
    }
}

/// Errors surfaced by the public gateway API.
///
/// Every variant carries the serial of the gateway involved (when known)
/// and a stable [`ErrorCode`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("connection error{} [{code}]: {message}", fmt_sn(.gw_sn))]
    Connection {
        gw_sn: Option<String>,
        code: ErrorCode,
        message: String,
    },

    #[error("authentication failed{} [{code}]: {message}", fmt_sn(.gw_sn))]
    Authentication {
        gw_sn: Option<String>,
        code: ErrorCode,
        message: String,
    },

    #[error("discovery error{} [{code}]: {message}", fmt_sn(.gw_sn))]
    Discovery {
        gw_sn: Option<String>,
        code: ErrorCode,
        message: String,
    },

    #[error("network error{} [{code}]: {message}", fmt_sn(.gw_sn))]
    Network {
        gw_sn: Option<String>,
        code: ErrorCode,
        message: String,
    },

    #[error("timeout{} [{code}]: {message}", fmt_sn(.gw_sn))]
    Timeout {
        gw_sn: Option<String>,
        code: ErrorCode,
        message: String,
    },
}

fn fmt_sn(gw_sn: &Option<String>) -> String {
    match gw_sn {
        Some(sn) => format!(" for gateway {sn}"),
        None => String::new(),
    }
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Connection { code, .. }
            | GatewayError::Authentication { code, .. }
            | GatewayError::Discovery { code, .. }
            | GatewayError::Network { code, .. }
            | GatewayError::Timeout { code, .. } => *code,
        }
    }

    pub fn gw_sn(&self) -> Option<&str> {
        match self {
            GatewayError::Connection { gw_sn, .. }
            | GatewayError::Authentication { gw_sn, .. }
            | GatewayError::Discovery { gw_sn, .. }
            | GatewayError::Network { gw_sn, .. }
            | GatewayError::Timeout { gw_sn, .. } => gw_sn.as_deref(),
        }
    }

    /// Broker rejected the credentials pending a provisioning button press.
    pub fn auth_required(gw_sn: &str) -> Self {
        GatewayError::Authentication {
            gw_sn: Some(gw_sn.to_string()),
            code: ErrorCode::AuthRequired,
            message: format!(
                "authentication failed for gateway {gw_sn}: press the gateway \
                 button and retry"
            ),
        }
    }

    pub fn invalid_credentials(gw_sn: &str) -> Self {
        GatewayError::Authentication {
            gw_sn: Some(gw_sn.to_string()),
            code: ErrorCode::AuthInvalidCredentials,
            message: format!(
                "gateway {gw_sn} rejected the supplied credentials: press the \
                 gateway button and retry"
            ),
        }
    }

    /// The session was closed while a caller was waiting on a response.
    pub fn session_closed(gw_sn: &str) -> Self {
        GatewayError::Connection {
            gw_sn: Some(gw_sn.to_string()),
            code: ErrorCode::DisconnectError,
            message: "session closed".to_string(),
        }
    }
}
