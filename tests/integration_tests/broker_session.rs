// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use dali_gateway_rs::{
    error::ErrorCode,
    models::{device::DeviceAddress, property::DeviceProperty},
    session::{
        Session, SessionState,
        events::{Event, EventKind},
    },
};
use serde_json::json;
use serial_test::serial;
use tokio::{sync::mpsc, time::timeout};

use crate::integration_tests::common::FakeBroker;

fn online_listener(
    session: &Arc<Session>,
    target: &str,
) -> mpsc::UnboundedReceiver<bool> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.register_listener(
        EventKind::OnlineStatus,
        target,
        Arc::new(move |event| {
            if let Event::OnlineStatus { online, .. } = event {
                let _ = tx.send(*online);
            }
        }),
    );
    rx
}

async fn recv_flag(rx: &mut mpsc::UnboundedReceiver<bool>) -> Result<bool> {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .context("timed out waiting for a connectivity event")?
        .context("event channel closed")
}

#[tokio::test]
#[serial]
async fn connect_emits_online_before_returning() -> Result<()> {
    let broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    let mut online = online_listener(&session, "GW-1");

    session.connect().await?;

    assert_eq!(session.state(), SessionState::Connected);
    // the ONLINE event was queued before connect returned
    assert!(recv_flag(&mut online).await?);

    session.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn auth_failure_code_4_leaves_session_closed() -> Result<()> {
    let broker = FakeBroker::start(4).await?;
    let session = Session::new(broker.descriptor("GW-1"));

    let err = session.connect().await.expect_err("auth must fail");
    assert_eq!(err.code(), ErrorCode::AuthRequired);
    assert!(err.to_string().contains("press the gateway"));
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
#[serial]
async fn invalid_credentials_code_5() -> Result<()> {
    let broker = FakeBroker::start(5).await?;
    let session = Session::new(broker.descriptor("GW-1"));

    let err = session.connect().await.expect_err("auth must fail");
    assert_eq!(err.code(), ErrorCode::AuthInvalidCredentials);
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
#[serial]
async fn write_group_reaches_the_broker_once() -> Result<()> {
    let mut broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    session.connect().await?;

    session.command_write_group(0, 5, &[DeviceProperty::power(true)]);

    let (topic, message) = broker.next_publish_json().await?;
    assert_eq!(topic, "/GW-1/server/publish/");
    assert_eq!(message["cmd"], "writeGroup");
    assert_eq!(message["gwSn"], "GW-1");
    assert_eq!(message["channel"], 0);
    assert_eq!(message["groupId"], 5);
    assert_eq!(
        message["data"],
        json!([{"dpid": 20, "dataType": "bool", "value": true}])
    );

    session.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn coalesced_reads_arrive_as_one_publish() -> Result<()> {
    let mut broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    session.connect().await?;

    session.command_read_dev(&DeviceAddress::new("0101", 0, 1));
    session.command_read_dev(&DeviceAddress::new("0101", 0, 2));
    session.command_read_dev(&DeviceAddress::new("0101", 0, 1));

    let (_, message) = broker.next_publish_json().await?;
    assert_eq!(message["cmd"], "readDev");
    let data = message["data"].as_array().context("data array")?;
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["address"], 1);
    assert_eq!(data[1]["address"], 2);

    session.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn device_discovery_round_trip() -> Result<()> {
    let mut broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    session.connect().await?;

    let query_session = Arc::clone(&session);
    let devices = tokio::spawn(async move { query_session.discover_devices().await });

    let (_, message) = broker.next_publish_json().await?;
    assert_eq!(message["cmd"], "searchDev");
    assert_eq!(message["searchFlag"], "exited");

    broker.inject(
        "/GW-1/client/reciver/",
        json!({
            "cmd": "searchDevRes",
            "searchStatus": 1,
            "data": [
                {"devType": "0101", "channel": 0, "address": 1},
                {"devType": "0302", "channel": 0, "address": 3, "name": "Hall panel"},
            ],
        }),
    );

    let devices = timeout(Duration::from_secs(5), devices)
        .await
        .context("discovery did not resolve")??
        .context("discovery failed")?;
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].unique_id, "0101-0-1-GW-1");
    assert_eq!(devices[0].name, "Dimmer 00-01");
    assert_eq!(devices[1].name, "Hall panel");

    session.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn inbound_status_fans_out_to_listeners() -> Result<()> {
    let mut broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    session.connect().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.register_listener(
        EventKind::LightStatus,
        "0101-0-1-GW-1",
        Arc::new(move |event| {
            if let Event::LightStatus { status, .. } = event {
                let _ = tx.send(status.clone());
            }
        }),
    );

    // Prove the subscription exists end-to-end before injecting:
    // drive one command through and back.
    session.command_write_scene(0, 1);
    let _ = broker.next_publish_json().await?;

    broker.inject(
        "/GW-1/client/reciver/",
        json!({
            "cmd": "devStatus",
            "data": {
                "devType": "0101", "channel": 0, "address": 1,
                "property": [
                    {"dpid": 20, "dataType": "bool", "value": true},
                    {"dpid": 22, "dataType": "uint16", "value": 500},
                ],
            },
        }),
    );

    let status = timeout(Duration::from_secs(5), rx.recv())
        .await
        .context("no light status delivered")?
        .context("listener channel closed")?;
    assert_eq!(status.is_on, Some(true));
    assert_eq!(status.brightness, Some(500));

    session.disconnect().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn disconnect_emits_offline_and_closes() -> Result<()> {
    let broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    let mut online = online_listener(&session, "GW-1");

    session.connect().await?;
    assert!(recv_flag(&mut online).await?);

    session.disconnect().await?;
    assert!(!recv_flag(&mut online).await?);
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
#[serial]
async fn broker_side_close_surfaces_as_offline_event() -> Result<()> {
    let broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    let mut online = online_listener(&session, "GW-1");

    session.connect().await?;
    assert!(recv_flag(&mut online).await?);

    broker.close_connection();

    assert!(!recv_flag(&mut online).await?);
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
#[serial]
async fn identify_round_trip_returns_ack() -> Result<()> {
    let mut broker = FakeBroker::start(0).await?;
    let session = Session::new(broker.descriptor("GW-1"));
    session.connect().await?;

    let query_session = Arc::clone(&session);
    let identify = tokio::spawn(async move {
        query_session
            .identify_device(&DeviceAddress::new("0101", 0, 1))
            .await
    });

    let (_, message) = broker.next_publish_json().await?;
    assert_eq!(message["cmd"], "identifyDev");

    broker.inject(
        "/GW-1/client/reciver/",
        json!({"cmd": "identifyDevRes", "ack": true}),
    );

    let ack = timeout(Duration::from_secs(6), identify)
        .await
        .context("identify did not resolve")??
        .context("identify failed")?;
    assert!(ack);

    session.disconnect().await?;
    Ok(())
}
