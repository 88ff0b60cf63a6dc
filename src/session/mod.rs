//! Broker session: connection lifecycle, inbound demultiplexing and the
//! publish API.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Per-command batching and request/response correlation.
pub(crate) mod dispatcher;
/// Typed listener registry.
pub mod events;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{Map, Value, json};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::{
    error::{ErrorCode, GatewayError},
    models::{
        device::{DeviceAddress, DeviceCategory, DeviceDescriptor, default_device_name},
        gateway::{GatewayDescriptor, VersionInfo},
        params::{
            ParamMap, device_params_from_wire, device_params_to_wire,
            sensor_params_from_wire, sensor_params_to_wire,
        },
        property::{DPID_ENERGY, DeviceProperty},
        scene::{
            GroupDescriptor, SceneDescriptor, group_unique_id, scene_unique_id,
        },
        status::{
            decode_illuminance_status, decode_light_status, decode_motion_status,
            decode_panel_events,
        },
        wire::{
            self, DeviceStatusMessage, GroupListMessage, IdentifyResponseMessage,
            OnlineStatusMessage, ParamResponseMessage, SceneListMessage,
            SearchDeviceMessage, SensorOnOffMessage, VersionMessage, WriteAckMessage,
            envelope,
        },
    },
    mqtt::{MqttConnection, MqttError, MqttOptions, tls},
    session::{
        dispatcher::{Dispatcher, PublishSink, ResponseSlot, SlotWait},
        events::{Event, EventKind, EventRegistry, ListenerFn, ListenerHandle},
    },
};

/// Budget for discovery-style queries (`searchDev`, `getGroup`,
/// `getScene`, `getVersion`).
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for an `identifyDev` acknowledgement.
pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of one broker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Closed,
}

struct QuerySlots {
    devices: ResponseSlot<Vec<DeviceDescriptor>>,
    groups: ResponseSlot<Vec<GroupDescriptor>>,
    scenes: ResponseSlot<Vec<SceneDescriptor>>,
    version: ResponseSlot<Option<VersionInfo>>,
    identify: ResponseSlot<bool>,
}

impl QuerySlots {
    fn new() -> Self {
        Self {
            devices: ResponseSlot::new(),
            groups: ResponseSlot::new(),
            scenes: ResponseSlot::new(),
            version: ResponseSlot::new(),
            identify: ResponseSlot::new(),
        }
    }

    /// Wakes every waiter with the session-closed marker.
    fn close_all(&self) {
        self.devices.close();
        self.groups.close();
        self.scenes.close();
        self.version.close();
        self.identify.close();
    }
}

/// One gateway session.
///
/// Owns the request dispatcher and the event registry; all inbound
/// traffic is funnelled through a single pump task so shared state sees
/// messages in arrival order.
pub struct Session {
    gateway: GatewayDescriptor,
    sub_topic: String,
    pub_topic: String,
    state: Mutex<SessionState>,
    conn: AsyncMutex<Option<Arc<MqttConnection>>>,
    sink: Arc<PublishSink>,
    dispatcher: Arc<Dispatcher>,
    events: EventRegistry,
    queries: QuerySlots,
    tasks: Mutex<Option<CancellationToken>>,
}

impl Session {
    pub fn new(mut gateway: GatewayDescriptor) -> Arc<Self> {
        gateway.normalize();
        let sink = Arc::new(PublishSink::default());
        let dispatcher = Arc::new(Dispatcher::new(&gateway.gw_sn, Arc::clone(&sink)));
        Arc::new(Self {
            sub_topic: wire::inbound_topic(&gateway.gw_sn),
            pub_topic: wire::outbound_topic(&gateway.gw_sn),
            state: Mutex::new(SessionState::Idle),
            conn: AsyncMutex::new(None),
            sink,
            dispatcher,
            events: EventRegistry::new(),
            queries: QuerySlots::new(),
            tasks: Mutex::new(None),
            gateway,
        })
    }

    pub fn gw_sn(&self) -> &str {
        &self.gateway.gw_sn
    }

    pub fn descriptor(&self) -> &GatewayDescriptor {
        &self.gateway
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Registers a listener; the handle removes it again.
    pub fn register_listener(
        &self,
        kind: EventKind,
        target: &str,
        listener: ListenerFn,
    ) -> ListenerHandle {
        self.events.register(kind, target, listener)
    }

    /// Removes one listener registration. Idempotent.
    pub fn remove_listener(&self, handle: &ListenerHandle) -> bool {
        self.events.remove(handle)
    }

    // ─────────────────────────────────────────────────────────────────
    // Connection lifecycle

    /// Connects to the gateway broker and subscribes to its inbound
    /// topic. The ONLINE connectivity event fires before this returns.
    pub async fn connect(self: &Arc<Self>) -> Result<(), GatewayError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                SessionState::Connected => {
                    warn!(gw_sn = %self.gw_sn(), "connect on an already connected session");
                    return Ok(());
                },
                SessionState::Connecting | SessionState::Disconnecting => {
                    return Err(GatewayError::Connection {
                        gw_sn: Some(self.gw_sn().to_string()),
                        code: ErrorCode::NetworkError,
                        message: "session is busy".to_string(),
                    });
                },
                SessionState::Idle | SessionState::Closed => {
                    *state = SessionState::Connecting;
                },
            }
        }

        let mut opts = MqttOptions::new(
            format!("ha_dali_center_{}", self.gw_sn()),
            self.gateway.gw_ip.clone(),
            self.gateway.port,
        );
        opts.username = Some(self.gateway.username.clone());
        opts.password = Some(self.gateway.passwd.clone());
        if self.gateway.is_tls {
            opts.tls_ca = Some(
                self.gateway
                    .ca_cert
                    .clone()
                    .unwrap_or_else(tls::bundled_ca_path),
            );
        }

        let connect_span = tracing::debug_span!(
            "broker_connect",
            gw_sn = %self.gw_sn(),
            host = %self.gateway.gw_ip,
            port = self.gateway.port,
        );
        let (conn, mut inbound) = match MqttConnection::connect(&opts)
            .instrument(connect_span.clone())
            .await
        {
            Ok(connected) => connected,
            Err(e) => {
                self.set_state(SessionState::Closed);
                return Err(self.map_mqtt_error(e));
            },
        };

        if let Err(e) = conn
            .subscribe(&self.sub_topic)
            .instrument(connect_span)
            .await
        {
            conn.disconnect().await;
            self.set_state(SessionState::Closed);
            return Err(self.map_mqtt_error(e));
        }
        debug!(gw_sn = %self.gw_sn(), topic = %self.sub_topic, "subscribed to inbound topic");

        let cancel = CancellationToken::new();
        *self.tasks.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.sink.attach(outbound_tx);

        let writer_conn = Arc::clone(&conn);
        let writer_topic = self.pub_topic.clone();
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => break,
                    payload = outbound_rx.recv() => {
                        let Some(payload) = payload else { break };
                        if let Err(e) = writer_conn.publish(&writer_topic, payload).await {
                            warn!("publish failed: {e}");
                        }
                    },
                }
            }
        });

        let pump_session = Arc::clone(self);
        let pump_cancel = cancel;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = pump_cancel.cancelled() => break,
                    message = inbound.recv() => {
                        match message {
                            Some(publish) => {
                                pump_session.dispatch_payload(&publish.payload);
                            },
                            None => {
                                pump_session.on_connection_lost();
                                break;
                            },
                        }
                    },
                }
            }
        });

        *self.conn.lock().await = Some(conn);
        self.set_state(SessionState::Connected);
        self.emit_connectivity(true);
        info!(
            gw_sn = %self.gw_sn(),
            "connected to gateway at {}:{}", self.gateway.gw_ip, self.gateway.port
        );
        Ok(())
    }

    /// Commanded disconnect. The OFFLINE connectivity event fires before
    /// this returns; listeners are cleared afterwards.
    pub async fn disconnect(&self) -> Result<(), GatewayError> {
        match self.state() {
            SessionState::Idle | SessionState::Closed => return Ok(()),
            _ => self.set_state(SessionState::Disconnecting),
        }

        if let Some(cancel) = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            cancel.cancel();
        }

        if let Some(conn) = self.conn.lock().await.take() {
            conn.disconnect().await;
        }
        self.sink.detach();

        self.emit_connectivity(false);
        self.dispatcher.drain();
        self.queries.close_all();
        self.events.clear();
        self.set_state(SessionState::Closed);
        info!(gw_sn = %self.gw_sn(), "disconnected from gateway");
        Ok(())
    }

    /// Spontaneous close detected by the inbound pump.
    fn on_connection_lost(&self) {
        if self.state() != SessionState::Connected {
            return;
        }
        warn!(gw_sn = %self.gw_sn(), "broker connection lost");
        self.sink.detach();
        self.dispatcher.drain();
        self.queries.close_all();
        self.emit_connectivity(false);
        self.set_state(SessionState::Closed);
    }

    fn emit_connectivity(&self, online: bool) {
        self.events.emit(&Event::OnlineStatus {
            target: self.gw_sn().to_string(),
            online,
        });
    }

    fn map_mqtt_error(&self, e: MqttError) -> GatewayError {
        let gw_sn = self.gw_sn();
        match e {
            MqttError::Refused(4) => GatewayError::auth_required(gw_sn),
            MqttError::Refused(5) => GatewayError::invalid_credentials(gw_sn),
            MqttError::Refused(rc) => GatewayError::Connection {
                gw_sn: Some(gw_sn.to_string()),
                code: ErrorCode::from_connack(rc),
                message: format!("broker refused connection with code {rc}"),
            },
            MqttError::ConnectTimeout => GatewayError::Timeout {
                gw_sn: Some(gw_sn.to_string()),
                code: ErrorCode::ConnectionTimeout,
                message: format!(
                    "timed out connecting to {}:{}",
                    self.gateway.gw_ip, self.gateway.port
                ),
            },
            MqttError::Tls(e) => GatewayError::Connection {
                gw_sn: Some(gw_sn.to_string()),
                code: ErrorCode::SslConfigError,
                message: format!("TLS setup failed: {e}"),
            },
            MqttError::Io(e)
                if e.kind() == std::io::ErrorKind::ConnectionRefused =>
            {
                GatewayError::Connection {
                    gw_sn: Some(gw_sn.to_string()),
                    code: ErrorCode::MqttConnectionRefused,
                    message: format!(
                        "broker at {}:{} refused the connection",
                        self.gateway.gw_ip, self.gateway.port
                    ),
                }
            },
            other => GatewayError::Connection {
                gw_sn: Some(gw_sn.to_string()),
                code: ErrorCode::NetworkError,
                message: other.to_string(),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Publish API

    fn publish_command(&self, command: Map<String, Value>) -> bool {
        self.sink.send(Value::Object(command).to_string().into_bytes())
    }

    fn require_publish(&self, command: Map<String, Value>) -> Result<(), GatewayError> {
        if self.publish_command(command) {
            Ok(())
        } else {
            Err(GatewayError::Connection {
                gw_sn: Some(self.gw_sn().to_string()),
                code: ErrorCode::NetworkError,
                message: "session is not connected".to_string(),
            })
        }
    }

    /// Queues a `readDev` for coalesced publication.
    pub fn command_read_dev(&self, addr: &DeviceAddress) {
        self.dispatcher.add_request(
            "readDev",
            addr.batch_key(),
            json!({
                "devType": addr.dev_type,
                "channel": addr.channel,
                "address": addr.address,
            }),
        );
    }

    /// Queues a `writeDev` for coalesced publication. Broadcast
    /// addresses (`devType = "FFFF"`) pass through unmodified.
    pub fn command_write_dev(&self, addr: &DeviceAddress, properties: &[DeviceProperty]) {
        self.dispatcher.add_request(
            "writeDev",
            addr.batch_key(),
            json!({
                "devType": addr.dev_type,
                "channel": addr.channel,
                "address": addr.address,
                "property": properties,
            }),
        );
    }

    pub fn command_write_group(
        &self,
        channel: u8,
        group_id: u16,
        properties: &[DeviceProperty],
    ) {
        let mut command = envelope("writeGroup", self.gw_sn());
        command.insert("channel".to_string(), json!(channel));
        command.insert("groupId".to_string(), json!(group_id));
        command.insert("data".to_string(), json!(properties));
        self.publish_command(command);
    }

    pub fn command_write_scene(&self, channel: u8, scene_id: u16) {
        let mut command = envelope("writeScene", self.gw_sn());
        command.insert("channel".to_string(), json!(channel));
        command.insert("sceneId".to_string(), json!(scene_id));
        self.publish_command(command);
    }

    pub fn command_set_sensor_on_off(&self, addr: &DeviceAddress, value: bool) {
        let mut command = self.device_command("setSensorOnOff", addr);
        command.insert("value".to_string(), json!(value));
        self.publish_command(command);
    }

    pub fn command_get_sensor_on_off(&self, addr: &DeviceAddress) {
        let command = self.device_command("getSensorOnOff", addr);
        self.publish_command(command);
    }

    pub fn command_get_dev_param(&self, addr: &DeviceAddress) {
        let command = self.device_command("getDevParam", addr);
        self.publish_command(command);
    }

    /// Writes device parameters; keys are library-side snake_case and
    /// are translated to wire casing here.
    pub fn command_set_dev_param(&self, addr: &DeviceAddress, params: &ParamMap) {
        let mut command = self.device_command("setDevParam", addr);
        command.insert(
            "data".to_string(),
            Value::Object(device_params_to_wire(params)),
        );
        self.publish_command(command);
    }

    pub fn command_get_sensor_param(&self, addr: &DeviceAddress) {
        let command = self.device_command("getSensorParam", addr);
        self.publish_command(command);
    }

    pub fn command_set_sensor_param(&self, addr: &DeviceAddress, params: &ParamMap) {
        let mut command = self.device_command("setSensorParam", addr);
        command.insert(
            "data".to_string(),
            Value::Object(sensor_params_to_wire(params)),
        );
        self.publish_command(command);
    }

    fn device_command(&self, cmd: &str, addr: &DeviceAddress) -> Map<String, Value> {
        let mut command = envelope(cmd, self.gw_sn());
        command.insert("devType".to_string(), json!(addr.dev_type));
        command.insert("channel".to_string(), json!(addr.channel));
        command.insert("address".to_string(), json!(addr.address));
        command
    }

    // ─────────────────────────────────────────────────────────────────
    // Correlated queries

    /// Reads the gateway's software/firmware versions.
    pub async fn get_version(&self) -> Result<Option<VersionInfo>, GatewayError> {
        self.queries.version.reset();
        self.require_publish(envelope("getVersion", self.gw_sn()))?;

        match self.queries.version.wait(QUERY_TIMEOUT).await {
            SlotWait::Value(version) => Ok(version),
            SlotWait::Closed => Err(GatewayError::session_closed(self.gw_sn())),
        }
    }

    /// Scans the buses for devices. Resolves to whatever accumulated if
    /// the scan does not terminate within the budget.
    pub async fn discover_devices(&self) -> Result<Vec<DeviceDescriptor>, GatewayError> {
        self.queries.devices.reset();
        let mut command = envelope("searchDev", self.gw_sn());
        command.insert("searchFlag".to_string(), json!("exited"));
        self.require_publish(command)?;

        match self.queries.devices.wait(QUERY_TIMEOUT).await {
            SlotWait::Value(devices) => {
                info!(
                    gw_sn = %self.gw_sn(),
                    "device discovery found {} device(s)", devices.len()
                );
                Ok(devices)
            },
            SlotWait::Closed => Err(GatewayError::session_closed(self.gw_sn())),
        }
    }

    pub async fn discover_groups(&self) -> Result<Vec<GroupDescriptor>, GatewayError> {
        self.queries.groups.reset();
        let mut command = envelope("getGroup", self.gw_sn());
        command.insert("getFlag".to_string(), json!("exited"));
        self.require_publish(command)?;

        match self.queries.groups.wait(QUERY_TIMEOUT).await {
            SlotWait::Value(groups) => Ok(groups),
            SlotWait::Closed => Err(GatewayError::session_closed(self.gw_sn())),
        }
    }

    pub async fn discover_scenes(&self) -> Result<Vec<SceneDescriptor>, GatewayError> {
        self.queries.scenes.reset();
        let mut command = envelope("getScene", self.gw_sn());
        command.insert("getFlag".to_string(), json!("exited"));
        self.require_publish(command)?;

        match self.queries.scenes.wait(QUERY_TIMEOUT).await {
            SlotWait::Value(scenes) => Ok(scenes),
            SlotWait::Closed => Err(GatewayError::session_closed(self.gw_sn())),
        }
    }

    /// Asks a device to blink its indicator; resolves to the ack flag,
    /// `false` when no acknowledgement arrived in time.
    pub async fn identify_device(
        &self,
        addr: &DeviceAddress,
    ) -> Result<bool, GatewayError> {
        self.queries.identify.reset();
        let command = self.device_command("identifyDev", addr);
        self.require_publish(command)?;

        match self.queries.identify.wait(IDENTIFY_TIMEOUT).await {
            SlotWait::Value(ack) => Ok(ack),
            SlotWait::Closed => Err(GatewayError::session_closed(self.gw_sn())),
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Inbound demultiplexer

    /// Feeds one raw broker message through the demultiplexer.
    ///
    /// Decode failures and unknown commands are logged and swallowed;
    /// the session stays usable.
    pub fn dispatch_payload(&self, payload: &[u8]) {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                error!(gw_sn = %self.gw_sn(), "failed to decode broker message: {e}");
                return;
            },
        };
        let Some(cmd) = value.get("cmd").and_then(Value::as_str) else {
            warn!(gw_sn = %self.gw_sn(), "broker message without cmd field");
            return;
        };
        let cmd = cmd.to_string();

        let span =
            tracing::debug_span!("inbound_message", gw_sn = %self.gw_sn(), %cmd);
        let _guard = span.enter();

        match cmd.as_str() {
            "devStatus" | "readDevRes" => self.handle_device_status(value),
            "writeDevRes" | "writeGroupRes" | "writeSceneRes" | "setSensorOnOffRes"
            | "setDevParamRes" | "setSensorParamRes" => {
                self.handle_write_ack(&cmd, value);
            },
            "onlineStatus" => self.handle_online_status(value),
            "reportEnergy" => self.handle_energy_report(value),
            "searchDevRes" => self.handle_search_device_response(value),
            "getSceneRes" => self.handle_scene_response(value),
            "getGroupRes" => self.handle_group_response(value),
            "getVersionRes" => self.handle_version_response(value),
            "getSensorOnOffRes" => self.handle_sensor_on_off_response(value),
            "identifyDevRes" => self.handle_identify_response(value),
            "getDevParamRes" => self.handle_dev_param_response(value),
            "getSensorParamRes" => self.handle_sensor_param_response(value),
            other => {
                debug!(gw_sn = %self.gw_sn(), cmd = %other, "unhandled broker command");
            },
        }
    }

    fn handle_device_status(&self, value: Value) {
        let message: DeviceStatusMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed device status: {e}");
                return;
            },
        };
        let data = message.data;
        let addr = DeviceAddress::new(data.dev_type, data.channel, data.address);
        let target = addr.unique_id(self.gw_sn());

        match addr.category() {
            DeviceCategory::Light => {
                self.events.emit(&Event::LightStatus {
                    target,
                    status: decode_light_status(&data.property),
                });
            },
            DeviceCategory::Sensor => {
                if let Some(status) = decode_motion_status(&data.property) {
                    self.events.emit(&Event::MotionStatus {
                        target: target.clone(),
                        status,
                    });
                }
                if let Some(status) = decode_illuminance_status(&data.property) {
                    self.events
                        .emit(&Event::IlluminanceStatus { target, status });
                }
            },
            DeviceCategory::Panel => {
                for status in decode_panel_events(&data.property) {
                    self.events.emit(&Event::PanelStatus {
                        target: target.clone(),
                        status,
                    });
                }
            },
            DeviceCategory::Broadcast | DeviceCategory::Unknown => {
                debug!(
                    gw_sn = %self.gw_sn(),
                    dev_type = %addr.dev_type,
                    "status for uncategorized device type"
                );
            },
        }
    }

    fn handle_write_ack(&self, cmd: &str, value: Value) {
        let ack: WriteAckMessage = match serde_json::from_value(value) {
            Ok(ack) => ack,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed {cmd}: {e}");
                return;
            },
        };
        debug!(
            gw_sn = %self.gw_sn(),
            %cmd,
            msg_id = ack.msg_id.as_deref().unwrap_or(""),
            ack = ack.ack,
            "write acknowledged"
        );
    }

    fn handle_online_status(&self, value: Value) {
        let message: OnlineStatusMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed onlineStatus: {e}");
                return;
            },
        };
        if message.data.is_empty() {
            warn!(gw_sn = %self.gw_sn(), "onlineStatus without data");
            return;
        }
        for entry in message.data {
            let addr = DeviceAddress::new(entry.dev_type, entry.channel, entry.address);
            self.events.emit(&Event::OnlineStatus {
                target: addr.unique_id(self.gw_sn()),
                online: entry.status,
            });
        }
    }

    fn handle_energy_report(&self, value: Value) {
        let message: DeviceStatusMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed reportEnergy: {e}");
                return;
            },
        };
        let data = message.data;
        let addr = DeviceAddress::new(data.dev_type, data.channel, data.address);
        let target = addr.unique_id(self.gw_sn());

        for prop in &data.property {
            if prop.dpid != DPID_ENERGY {
                continue;
            }
            let watts = match &prop.value {
                Value::String(s) => s.parse::<f64>().ok(),
                Value::Number(n) => n.as_f64(),
                _ => None,
            };
            match watts {
                Some(watts) => {
                    self.events.emit(&Event::EnergyReport {
                        target: target.clone(),
                        watts,
                    });
                },
                None => {
                    error!(
                        gw_sn = %self.gw_sn(),
                        value = %prop.value,
                        "unparseable energy value"
                    );
                },
            }
        }
    }

    fn handle_search_device_response(&self, value: Value) {
        let message: SearchDeviceMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed searchDevRes: {e}");
                return;
            },
        };

        for entry in message.data {
            let addr =
                DeviceAddress::new(entry.dev_type.clone(), entry.channel, entry.address);
            let unique_id = addr.unique_id(self.gw_sn());
            let device = DeviceDescriptor {
                name: entry.name.filter(|n| !n.is_empty()).unwrap_or_else(|| {
                    default_device_name(&entry.dev_type, entry.channel, entry.address)
                }),
                dev_type: entry.dev_type,
                channel: entry.channel,
                address: entry.address,
                status: entry.status,
                dev_sn: entry.dev_sn,
                area_name: entry.area_name,
                area_id: entry.area_id,
                id: entry.dev_id.unwrap_or_else(|| unique_id.clone()),
                unique_id,
            };
            self.queries.devices.update(|devices| {
                if !devices.iter().any(|d| d.unique_id == device.unique_id) {
                    devices.push(device);
                }
            });
        }

        if message.search_status == 0 || message.search_status == 1 {
            self.queries.devices.complete();
        }
    }

    fn handle_scene_response(&self, value: Value) {
        let message: SceneListMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed getSceneRes: {e}");
                return;
            },
        };

        for channel_scenes in message.scene {
            let Some(entries) = channel_scenes.data else {
                continue;
            };
            let channel = channel_scenes.channel;
            for entry in entries {
                let scene = SceneDescriptor {
                    unique_id: scene_unique_id(channel, entry.scene_id, self.gw_sn()),
                    id: entry.scene_id,
                    name: entry.name,
                    channel,
                    area_id: entry.area_id,
                };
                self.queries.scenes.update(|scenes| {
                    if !scenes.iter().any(|s| s.unique_id == scene.unique_id) {
                        scenes.push(scene);
                    }
                });
            }
        }

        self.queries.scenes.complete();
    }

    fn handle_group_response(&self, value: Value) {
        let message: GroupListMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed getGroupRes: {e}");
                return;
            },
        };

        for channel_groups in message.group {
            let Some(entries) = channel_groups.data else {
                continue;
            };
            let channel = channel_groups.channel;
            for entry in entries {
                let group = GroupDescriptor {
                    unique_id: group_unique_id(channel, entry.group_id, self.gw_sn()),
                    id: entry.group_id,
                    name: entry.name,
                    channel,
                    area_id: entry.area_id,
                };
                self.queries.groups.update(|groups| {
                    if !groups.iter().any(|g| g.unique_id == group.unique_id) {
                        groups.push(group);
                    }
                });
            }
        }

        self.queries.groups.complete();
    }

    fn handle_version_response(&self, value: Value) {
        let message: VersionMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed getVersionRes: {e}");
                return;
            },
        };
        self.queries.version.update(|slot| {
            *slot = Some(VersionInfo {
                software: message.data.sw_version.clone(),
                firmware: message.data.fw_version.clone(),
            });
        });
        self.queries.version.complete();
    }

    fn handle_sensor_on_off_response(&self, value: Value) {
        let message: SensorOnOffMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed getSensorOnOffRes: {e}");
                return;
            },
        };
        let addr =
            DeviceAddress::new(message.dev_type, message.channel, message.address);
        let mut params = ParamMap::new();
        params.insert("enable".to_string(), json!(message.value));
        self.events.emit(&Event::SensorParam {
            target: addr.unique_id(self.gw_sn()),
            params,
        });
    }

    fn handle_identify_response(&self, value: Value) {
        let message: IdentifyResponseMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed identifyDevRes: {e}");
                return;
            },
        };
        self.queries.identify.update(|ack| *ack = message.ack);
        self.queries.identify.complete();
    }

    fn handle_dev_param_response(&self, value: Value) {
        let message: ParamResponseMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed getDevParamRes: {e}");
                return;
            },
        };
        let addr =
            DeviceAddress::new(message.dev_type, message.channel, message.address);
        self.events.emit(&Event::DevParam {
            target: addr.unique_id(self.gw_sn()),
            params: device_params_from_wire(&message.data),
        });
    }

    fn handle_sensor_param_response(&self, value: Value) {
        let message: ParamResponseMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(gw_sn = %self.gw_sn(), "malformed getSensorParamRes: {e}");
                return;
            },
        };
        let addr =
            DeviceAddress::new(message.dev_type, message.channel, message.address);
        self.events.emit(&Event::SensorParam {
            target: addr.unique_id(self.gw_sn()),
            params: sensor_params_from_wire(&message.data),
        });
    }

    #[cfg(test)]
    pub(crate) fn attach_test_sink(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sink.attach(tx);
        rx
    }
}
