// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-process MQTT broker stub for session tests.
//!
//! Speaks just enough of the protocol for one client: CONNACK with a
//! configurable return code, SUBACK, PINGRESP, and QoS 0 publishes in
//! both directions.

use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use bytes::BytesMut;
use dali_gateway_rs::{
    models::gateway::GatewayDescriptor,
    mqtt::codec::{ConnAck, Packet, Publish, SubAck, decode, encode},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};

enum Control {
    Inject { topic: String, payload: Vec<u8> },
    CloseConnection,
}

pub struct FakeBroker {
    pub addr: SocketAddr,
    control_tx: mpsc::UnboundedSender<Control>,
    received_rx: mpsc::UnboundedReceiver<Publish>,
}

impl FakeBroker {
    /// Starts a broker accepting one client; `connack_code` is returned
    /// for its CONNECT.
    pub async fn start(connack_code: u8) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind broker listener")?;
        let addr = listener.local_addr()?;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (received_tx, received_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let _ = serve(stream, connack_code, control_rx, received_tx).await;
        });

        Ok(Self {
            addr,
            control_tx,
            received_rx,
        })
    }

    /// Descriptor pointing a session at this broker.
    pub fn descriptor(&self, gw_sn: &str) -> GatewayDescriptor {
        GatewayDescriptor {
            gw_sn: gw_sn.to_string(),
            gw_ip: self.addr.ip().to_string(),
            port: self.addr.port(),
            is_tls: false,
            name: String::new(),
            username: "admin".to_string(),
            passwd: "pw".to_string(),
            channel_total: vec![0],
            ca_cert: None,
        }
    }

    /// Publishes a message to the connected client.
    pub fn inject(&self, topic: &str, payload: serde_json::Value) {
        let _ = self.control_tx.send(Control::Inject {
            topic: topic.to_string(),
            payload: payload.to_string().into_bytes(),
        });
    }

    /// Drops the client connection, simulating a broker-side close.
    pub fn close_connection(&self) {
        let _ = self.control_tx.send(Control::CloseConnection);
    }

    /// Next publish received from the client.
    pub async fn next_publish(&mut self) -> Result<Publish> {
        timeout(Duration::from_secs(5), self.received_rx.recv())
            .await
            .context("timed out waiting for a client publish")?
            .context("broker task ended")
    }

    /// Next publish parsed as JSON.
    pub async fn next_publish_json(&mut self) -> Result<(String, serde_json::Value)> {
        let publish = self.next_publish().await?;
        let value = serde_json::from_slice(&publish.payload)
            .context("client publish is not JSON")?;
        Ok((publish.topic, value))
    }
}

async fn serve(
    mut stream: TcpStream,
    connack_code: u8,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    received_tx: mpsc::UnboundedSender<Publish>,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(4096);
    let mut control_open = true;

    loop {
        while let Some(packet) = decode(&mut buf)? {
            match packet {
                Packet::Connect(_) => {
                    write_packet(
                        &mut stream,
                        &Packet::ConnAck(ConnAck {
                            session_present: false,
                            code: connack_code,
                        }),
                    )
                    .await?;
                },
                Packet::Subscribe(sub) => {
                    let codes = vec![0u8; sub.filters.len()];
                    write_packet(
                        &mut stream,
                        &Packet::SubAck(SubAck {
                            pkid: sub.pkid,
                            codes,
                        }),
                    )
                    .await?;
                },
                Packet::Publish(publish) => {
                    let _ = received_tx.send(publish);
                },
                Packet::PingReq => {
                    write_packet(&mut stream, &Packet::PingResp).await?;
                },
                Packet::Disconnect => return Ok(()),
                _ => {},
            }
        }

        tokio::select! {
            control = control_rx.recv(), if control_open => {
                match control {
                    Some(Control::Inject { topic, payload }) => {
                        write_packet(
                            &mut stream,
                            &Packet::Publish(Publish::qos0(topic, payload)),
                        )
                        .await?;
                    },
                    Some(Control::CloseConnection) => return Ok(()),
                    None => control_open = false,
                }
            },
            read = stream.read_buf(&mut buf) => {
                if read? == 0 {
                    return Ok(());
                }
            },
        }
    }
}

async fn write_packet(stream: &mut TcpStream, packet: &Packet) -> Result<()> {
    let mut out = BytesMut::new();
    encode(packet, &mut out)?;
    stream.write_all(&out).await?;
    Ok(())
}
