// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use dali_gateway_rs::{
    models::status::LightStatus,
    session::events::{Event, EventKind, EventRegistry, TARGET_ALL},
};

fn online(target: &str) -> Event {
    Event::OnlineStatus {
        target: target.to_string(),
        online: true,
    }
}

#[test]
fn dispatch_in_registration_order() {
    let registry = EventRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in 0..3 {
        let order = Arc::clone(&order);
        registry.register(
            EventKind::OnlineStatus,
            "GW-1",
            Arc::new(move |_| order.lock().expect("lock").push(tag)),
        );
    }

    assert_eq!(registry.emit(&online("GW-1")), 3);
    assert_eq!(*order.lock().expect("lock"), vec![0, 1, 2]);
}

#[test]
fn only_matching_targets_fire() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits_cb = Arc::clone(&hits);
    registry.register(
        EventKind::OnlineStatus,
        "GW-2",
        Arc::new(move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert_eq!(registry.emit(&online("GW-1")), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn kinds_are_independent() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits_cb = Arc::clone(&hits);
    registry.register(
        EventKind::EnergyReport,
        "GW-1",
        Arc::new(move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        }),
    );

    registry.emit(&online("GW-1"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn removal_is_idempotent() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits_cb = Arc::clone(&hits);
    let handle = registry.register(
        EventKind::OnlineStatus,
        "GW-1",
        Arc::new(move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert!(registry.remove(&handle));
    assert!(!registry.remove(&handle));
    registry.emit(&online("GW-1"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn removing_one_of_two_keeps_the_other() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits_first = Arc::clone(&hits);
    let first = registry.register(
        EventKind::OnlineStatus,
        "GW-1",
        Arc::new(move |_| {
            hits_first.fetch_add(1, Ordering::SeqCst);
        }),
    );
    let hits_second = Arc::clone(&hits);
    registry.register(
        EventKind::OnlineStatus,
        "GW-1",
        Arc::new(move |_| {
            hits_second.fetch_add(10, Ordering::SeqCst);
        }),
    );

    assert!(registry.remove(&first));
    assert_eq!(registry.emit(&online("GW-1")), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 10);
}

#[test]
fn wildcard_listeners_merge_by_registration_order() {
    let registry = EventRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = Arc::clone(&order);
    registry.register(
        EventKind::LightStatus,
        TARGET_ALL,
        Arc::new(move |_| o.lock().expect("lock").push("all-first")),
    );
    let o = Arc::clone(&order);
    registry.register(
        EventKind::LightStatus,
        "0101-0-1-GW-1",
        Arc::new(move |_| o.lock().expect("lock").push("exact")),
    );

    let event = Event::LightStatus {
        target: "0101-0-1-GW-1".to_string(),
        status: LightStatus::default(),
    };
    assert_eq!(registry.emit(&event), 2);
    assert_eq!(*order.lock().expect("lock"), vec!["all-first", "exact"]);
}

#[test]
fn panicking_listener_does_not_block_later_ones() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    registry.register(
        EventKind::OnlineStatus,
        "GW-1",
        Arc::new(|_| panic!("listener bug")),
    );
    let hits_cb = Arc::clone(&hits);
    registry.register(
        EventKind::OnlineStatus,
        "GW-1",
        Arc::new(move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert_eq!(registry.emit(&online("GW-1")), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn clear_drops_everything() {
    let registry = EventRegistry::new();
    registry.register(EventKind::EnergyReport, "dev", Arc::new(|_| {}));
    assert_eq!(registry.listener_count(EventKind::EnergyReport, "dev"), 1);
    registry.clear();
    assert_eq!(registry.listener_count(EventKind::EnergyReport, "dev"), 0);
}
