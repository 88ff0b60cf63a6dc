// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU16, Ordering},
    },
    time::Duration,
};

use bytes::BytesMut;
use dashmap::DashMap;
use rustls_pki_types::ServerName;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::{Mutex, mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mqtt::{
    codec::{self, CodecError, ConnAck, Connect, Packet, Publish, SubAck, Subscribe},
    tls::{self, TlsSetupError},
};

/// Handshake budget for TCP connect, TLS and CONNACK combined.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for a SUBACK after SUBSCRIBE.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("broker handshake timed out")]
    ConnectTimeout,
    #[error("broker refused connection with code {0}")]
    Refused(u8),
    #[error(transparent)]
    Tls(#[from] TlsSetupError),
    #[error("invalid broker address {0}")]
    BadAddress(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("connection closed")]
    Closed,
    #[error("broker rejected subscription to {0}")]
    SubscribeFailed(String),
}

/// Connection parameters for one broker session.
#[derive(Debug, Clone)]
pub struct MqttOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// CA bundle path; `Some` switches the transport to TLS.
    pub tls_ca: Option<PathBuf>,
}

impl MqttOptions {
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            client_id: client_id.into(),
            host: host.into(),
            port,
            username: None,
            password: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            tls_ca: None,
        }
    }
}

trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

type TransportStream = Box<dyn Transport>;

/// One live MQTT connection.
///
/// A background read loop frames inbound packets: publishes flow into
/// the channel handed out by [`MqttConnection::connect`], SUBACKs are
/// routed to the waiting `subscribe` call, QoS 1 publishes are acked
/// inline. The loop drops the inbound sender on EOF or error, which is
/// how the owner learns the connection died.
pub struct MqttConnection {
    writer: Mutex<WriteHalf<TransportStream>>,
    pending_subs: DashMap<u16, oneshot::Sender<SubAck>>,
    next_pkid: AtomicU16,
    cancel: CancellationToken,
}

impl MqttConnection {
    /// Opens the transport, performs the CONNECT/CONNACK handshake and
    /// starts the read-loop and keep-alive tasks.
    pub async fn connect(
        opts: &MqttOptions,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<Publish>), MqttError> {
        let stream = timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((opts.host.as_str(), opts.port)),
        )
        .await
        .map_err(|_| MqttError::ConnectTimeout)??;
        stream.set_nodelay(true)?;

        let stream: TransportStream = match &opts.tls_ca {
            Some(ca_path) => {
                let connector = tls::build_connector(ca_path).await?;
                let server_name = ServerName::try_from(opts.host.clone())
                    .map_err(|_| MqttError::BadAddress(opts.host.clone()))?;
                let tls_stream = timeout(
                    CONNECT_TIMEOUT,
                    connector.connect(server_name, stream),
                )
                .await
                .map_err(|_| MqttError::ConnectTimeout)??;
                Box::new(tls_stream)
            },
            None => Box::new(stream),
        };

        let (mut reader, mut writer) = tokio::io::split(stream);

        let connect = Packet::Connect(Connect {
            client_id: opts.client_id.clone(),
            username: opts.username.clone(),
            password: opts.password.clone(),
            keep_alive_secs: opts.keep_alive.as_secs().min(u64::from(u16::MAX)) as u16,
            clean_session: true,
        });
        let mut out = BytesMut::new();
        codec::encode(&connect, &mut out)?;
        writer.write_all(&out).await?;

        let mut scratch = BytesMut::with_capacity(4096);
        let connack = Self::await_connack(&mut reader, &mut scratch).await?;
        if connack.code != 0 {
            return Err(MqttError::Refused(connack.code));
        }
        debug!(client_id = %opts.client_id, "broker accepted connection");

        let conn = Arc::new(Self {
            writer: Mutex::new(writer),
            pending_subs: DashMap::new(),
            next_pkid: AtomicU16::new(1),
            cancel: CancellationToken::new(),
        });

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let read_conn = Arc::clone(&conn);
        tokio::spawn(async move {
            if let Err(e) = read_conn.read_loop(reader, scratch, inbound_tx).await {
                debug!("read loop exited: {e}");
            }
        });

        let ping_conn = Arc::clone(&conn);
        let ping_every = opts.keep_alive.div_f32(2.0).max(Duration::from_secs(1));
        tokio::spawn(async move {
            ping_conn.keep_alive_loop(ping_every).await;
        });

        Ok((conn, inbound_rx))
    }

    async fn await_connack(
        reader: &mut ReadHalf<TransportStream>,
        scratch: &mut BytesMut,
    ) -> Result<ConnAck, MqttError> {
        timeout(CONNECT_TIMEOUT, async {
            loop {
                if let Some(packet) = codec::decode(scratch)? {
                    match packet {
                        Packet::ConnAck(ack) => return Ok(ack),
                        other => {
                            debug!("ignoring pre-CONNACK packet {other:?}");
                        },
                    }
                }
                if reader.read_buf(scratch).await? == 0 {
                    return Err(MqttError::Closed);
                }
            }
        })
        .await
        .map_err(|_| MqttError::ConnectTimeout)?
    }

    async fn read_loop(
        self: Arc<Self>,
        mut reader: ReadHalf<TransportStream>,
        mut scratch: BytesMut,
        inbound_tx: mpsc::UnboundedSender<Publish>,
    ) -> Result<(), MqttError> {
        let result = 'outer: loop {
            loop {
                let packet = match codec::decode(&mut scratch) {
                    Ok(Some(packet)) => packet,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("dropping connection on malformed frame: {e}");
                        break 'outer Err(MqttError::from(e));
                    },
                };
                match packet {
                    Packet::Publish(publish) => {
                        if publish.qos == 1
                            && let Some(pkid) = publish.pkid
                        {
                            let _ = self.write_packet(&Packet::PubAck(pkid)).await;
                        }
                        if inbound_tx.send(publish).is_err() {
                            break 'outer Ok(());
                        }
                    },
                    Packet::SubAck(ack) => {
                        if let Some((_, tx)) = self.pending_subs.remove(&ack.pkid) {
                            let _ = tx.send(ack);
                        } else {
                            debug!("SUBACK for unknown pkid {}", ack.pkid);
                        }
                    },
                    Packet::PingResp => {},
                    other => {
                        debug!("ignoring unexpected packet {other:?}");
                    },
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break Ok(()),
                read = reader.read_buf(&mut scratch) => {
                    match read {
                        Ok(0) => break Ok(()),
                        Ok(_) => {},
                        Err(e) => break Err(MqttError::from(e)),
                    }
                },
            }
        };

        self.cancel.cancel();
        result
    }

    async fn keep_alive_loop(self: Arc<Self>, every: Duration) {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tick.tick().await;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tick.tick() => {
                    if self.write_packet(&Packet::PingReq).await.is_err() {
                        self.cancel.cancel();
                        return;
                    }
                },
            }
        }
    }

    async fn write_packet(&self, packet: &Packet) -> Result<(), MqttError> {
        if self.cancel.is_cancelled() {
            return Err(MqttError::Closed);
        }
        let mut buf = BytesMut::new();
        codec::encode(packet, &mut buf)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await?;
        Ok(())
    }

    fn alloc_pkid(&self) -> u16 {
        loop {
            let pkid = self.next_pkid.fetch_add(1, Ordering::Relaxed);
            if pkid != 0 {
                return pkid;
            }
        }
    }

    /// Subscribes to one topic filter and waits for the SUBACK.
    pub async fn subscribe(&self, topic: &str) -> Result<(), MqttError> {
        let pkid = self.alloc_pkid();
        let (tx, rx) = oneshot::channel();
        self.pending_subs.insert(pkid, tx);

        let packet = Packet::Subscribe(Subscribe {
            pkid,
            filters: vec![(topic.to_string(), 0)],
        });
        if let Err(e) = self.write_packet(&packet).await {
            self.pending_subs.remove(&pkid);
            return Err(e);
        }

        let ack = match timeout(SUBSCRIBE_TIMEOUT, rx).await {
            Ok(Ok(ack)) => ack,
            Ok(Err(_)) => return Err(MqttError::Closed),
            Err(_) => {
                self.pending_subs.remove(&pkid);
                return Err(MqttError::SubscribeFailed(topic.to_string()));
            },
        };
        if ack.codes.iter().any(|&code| code == 0x80) {
            return Err(MqttError::SubscribeFailed(topic.to_string()));
        }
        Ok(())
    }

    /// Publishes a QoS 0 message.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        self.write_packet(&Packet::Publish(Publish::qos0(topic, payload)))
            .await
    }

    /// Sends DISCONNECT and stops the background tasks.
    pub async fn disconnect(&self) {
        let _ = self.write_packet(&Packet::Disconnect).await;
        self.cancel.cancel();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}
