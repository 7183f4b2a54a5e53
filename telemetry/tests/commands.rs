use std::fs;
use std::sync::atomic::Ordering;
use std::time::Duration;

use miniz_oxide::deflate::compress_to_vec_zlib;
use proptest::prelude::*;
use sensors::gps::GpsReading;
use telemetry::command::codec::decode_reply;
use telemetry::identity::{FileIdentityStore, IdentityStore};

use utils::{payload, HarnessBuilder, ORIGIN};

mod utils;

#[test]
fn test_scenario_d_tail() {
    let mut harness = HarnessBuilder::new()
        .file("/var/log/x.log", "first\nsecond\nthird\n")
        .build();

    harness.agent.on_message(b"tail:5:/var/log/x.log");

    let sent = harness.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].topic, "tail");
    assert_eq!(sent[0].ack_timeout, Duration::from_secs(200));
    assert_eq!(
        decode_reply(&sent[0].body).unwrap(),
        "tail:/var/log/x.log:first\nsecond\nthird"
    );
}

#[test]
fn test_tail_is_bounded_by_the_requested_lines() {
    let mut harness = HarnessBuilder::new()
        .file("/var/log/gpsd.log", "1\n2\n3\n4\n5\n6\n")
        .build();

    harness.agent.on_message(b"tail:2:/var/log/gpsd.log");

    let reply = decode_reply(&harness.transport.sent()[0].body).unwrap();
    assert_eq!(reply, "tail:/var/log/gpsd.log:5\n6");
}

#[test]
fn test_tail_failure_replies_with_error_sentinel() {
    let mut harness = HarnessBuilder::new().build();

    harness.agent.on_message(b"tail:5:/var/log/missing.log");
    harness.agent.on_message(b"tail:many:/var/log/missing.log");

    let sent = harness.transport.sent();
    assert_eq!(sent.len(), 2);
    for message in sent {
        assert_eq!(
            decode_reply(&message.body).unwrap(),
            "tail:/var/log/missing.log:error"
        );
    }
}

#[test]
fn test_scenario_e_truck_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let uuid_file = dir.path().join("cl-lcr-uuid");
    let truck_file = dir.path().join("cl-lcr-truck");
    fs::write(&uuid_file, "3f2504e0-4f89-11d3-9a0c-0305e82c3301\n").unwrap();
    fs::write(&truck_file, "T-1\n").unwrap();

    let mut harness = HarnessBuilder::new()
        .store(Box::new(FileIdentityStore::new(&uuid_file, &truck_file)))
        .build();
    assert_eq!(harness.agent.identity().truck, "T-1");

    harness.agent.on_message(b"truck:set:T-42");
    assert_eq!(
        FileIdentityStore::new(&uuid_file, &truck_file)
            .load_truck()
            .unwrap(),
        "T-42"
    );
    assert_eq!(harness.agent.identity().truck, "T-42");

    harness.agent.on_message(b"truck:get");

    let sent = harness.transport.sent();
    assert_eq!(sent.len(), 2);
    for message in &sent {
        assert_eq!(message.topic, "tail");
        assert_eq!(decode_reply(&message.body).unwrap(), "truck:T-42");
    }
}

#[test]
fn test_truck_get_reloads_from_storage() {
    let dir = tempfile::tempdir().unwrap();
    let uuid_file = dir.path().join("uuid");
    let truck_file = dir.path().join("truck");
    fs::write(&uuid_file, "uuid\n").unwrap();
    fs::write(&truck_file, "T-1").unwrap();

    let mut harness = HarnessBuilder::new()
        .store(Box::new(FileIdentityStore::new(&uuid_file, &truck_file)))
        .build();
    fs::write(&truck_file, "T-9\n").unwrap();

    harness.agent.on_message(b"truck:get");
    assert_eq!(harness.agent.identity().truck, "T-9");
}

#[test]
fn test_truck_persistence_failure_sends_no_reply() {
    let dir = tempfile::tempdir().unwrap();
    let uuid_file = dir.path().join("uuid");
    let truck_file = dir.path().join("truck");
    fs::write(&uuid_file, "uuid\n").unwrap();
    fs::write(&truck_file, "T-1\n").unwrap();

    let mut harness = HarnessBuilder::new()
        .store(Box::new(FileIdentityStore::new(&uuid_file, &truck_file)))
        .build();
    fs::remove_file(&truck_file).unwrap();

    harness.agent.on_message(b"truck:get");
    assert!(harness.transport.sent().is_empty());
    assert_eq!(harness.agent.identity().truck, "T-1");
}

#[test]
fn test_compressed_command() {
    let mut harness = HarnessBuilder::new().build();
    harness.agent.on_message(&compress_to_vec_zlib(b"truck:set:T-7", 9));
    assert_eq!(harness.agent.identity().truck, "T-7");
}

#[test]
fn test_invalid_and_unknown_messages_are_dropped() {
    let mut harness = HarnessBuilder::new().build();

    harness.agent.on_message(b"garbage without delimiter");
    harness.agent.on_message(&[0x78, 0x9c, 0x00, 0x01]);
    harness.agent.on_message(b"reboot:now");
    harness.agent.on_message(b"truck:set");
    harness.agent.on_message(b"tail:5");

    assert!(harness.transport.sent().is_empty());
    assert!(harness.commands.lock().unwrap().is_empty());
    assert_eq!(harness.agent.identity().truck, "T-1");
}

#[test]
fn test_cmd_runs_without_reply() {
    let mut harness = HarnessBuilder::new().build();
    harness.agent.on_message(b"cmd:systemctl restart gpsd");

    assert_eq!(
        *harness.commands.lock().unwrap(),
        vec!["systemctl restart gpsd".to_string()]
    );
    assert!(harness.transport.sent().is_empty());
}

#[test]
fn test_gps_command_reports_cached_position() {
    let mut harness = HarnessBuilder::new().build();
    harness.agent.on_reading(GpsReading::Fix(ORIGIN));

    harness.agent.on_message(b"gps:");

    assert_eq!(harness.transport.location_calls.load(Ordering::SeqCst), 0);
    let sent = harness.transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].body, payload(ORIGIN));
}

#[test]
fn test_gpsd_command_forces_network_locate() {
    let mut harness = HarnessBuilder::new().build();
    harness.agent.on_reading(GpsReading::Fix(ORIGIN));
    let located = utils::north_of(ORIGIN, 3.0);
    harness.transport.queue_locations(&[Some(located)]);

    harness.agent.on_message(b"gpsd:");

    assert_eq!(harness.transport.location_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.agent.state().last_reported(), Some(located));
    assert_eq!(harness.transport.sent()[1].body, payload(located));
}

#[test]
fn test_gpsd_without_network_fix_changes_nothing() {
    let mut harness = HarnessBuilder::new().build();
    harness.agent.on_reading(GpsReading::Fix(ORIGIN));
    let before = harness.agent.state().clone();

    harness.agent.on_message(b"gpsd:");

    assert_eq!(harness.transport.location_calls.load(Ordering::SeqCst), 10);
    assert_eq!(harness.agent.state(), &before);
    assert_eq!(harness.transport.sent().len(), 1);
}

proptest! {
    #[test]
    fn tail_never_exceeds_requested_lines(lines in 0usize..40, requested in 0usize..40) {
        let content: String = (0..lines).map(|i| format!("line {}\n", i)).collect();
        let mut harness = HarnessBuilder::new().file("/var/log/p.log", &content).build();

        harness.agent.on_message(format!("tail:{}:/var/log/p.log", requested).as_bytes());

        let reply = decode_reply(&harness.transport.sent()[0].body).unwrap();
        let body = reply.strip_prefix("tail:/var/log/p.log:").unwrap();
        let returned = if body.is_empty() { 0 } else { body.split('\n').count() };
        prop_assert_eq!(returned, lines.min(requested));
    }
}
