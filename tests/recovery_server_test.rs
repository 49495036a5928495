mod common;

use std::time::Duration;

use mold_publisher::codec::{self, DecodedPacket};
use mold_publisher::net::{build_multicast_sender, build_recovery_socket};
use mold_publisher::publisher::Publisher;
use mold_publisher::recovery_log::RecoveryLog;
use mold_publisher::recovery_server::RecoveryServer;

struct Fixture {
    _publisher: Publisher,
    _recovery: RecoveryServer,
    name: mold_publisher::StreamName,
    recovery_port: u16,
}

fn seeded_stream(count: u64) -> Fixture {
    let (mcast_port, recovery_port) = common::next_port_pair();
    let log_file = tempfile::NamedTempFile::new().unwrap();
    let cfg = common::stream_config("foo", mcast_port, recovery_port, log_file.path().to_path_buf());

    let mcast_socket = build_multicast_sender(&cfg).unwrap();
    let publisher = Publisher::start(&cfg, mcast_socket, RecoveryLog::open(&cfg.log_path).unwrap()).unwrap();
    let handle = publisher.handle();
    for i in 1..=count {
        handle.send(format!("message{i:02}").as_bytes()).unwrap();
    }
    handle.flush().unwrap();

    let recovery_socket = build_recovery_socket(&cfg).unwrap();
    let recovery = RecoveryServer::start(&cfg, recovery_socket, handle);

    Fixture { _publisher: publisher, _recovery: recovery, name: codec::make_stream_name("foo"), recovery_port }
}

fn request_and_reply(fx: &Fixture, seq: u64, count: u16) -> Option<DecodedPacket> {
    let client = common::recovery_client_socket();
    let req = codec::pack_recovery_request(&fx.name, seq, count);
    client.send_to(&req, (std::net::Ipv4Addr::LOCALHOST, fx.recovery_port)).unwrap();
    let mut buf = [0u8; 2048];
    let n = client.recv(&mut buf).ok()?;
    codec::parse_packet(&buf[..n]).ok()
}

#[test]
fn single_sequence_request_replies_with_exact_message() {
    let fx = seeded_stream(12);
    let reply = request_and_reply(&fx, 1, 1).expect("expected a reply");
    match reply {
        DecodedPacket::Data { next_expected, messages, .. } => {
            assert_eq!(next_expected, 1);
            assert_eq!(messages.len(), 1);
            assert_eq!(&messages[0][2..], b"message01");
        }
        other => panic!("expected Data packet, got {other:?}"),
    }
}

#[test]
fn multi_sequence_request_replies_with_requested_range() {
    let fx = seeded_stream(12);
    let reply = request_and_reply(&fx, 3, 2).expect("expected a reply");
    match reply {
        DecodedPacket::Data { next_expected, messages, .. } => {
            assert_eq!(next_expected, 3);
            assert_eq!(messages.len(), 2);
            assert_eq!(&messages[0][2..], b"message03");
            assert_eq!(&messages[1][2..], b"message04");
        }
        other => panic!("expected Data packet, got {other:?}"),
    }
}

#[test]
fn request_beyond_last_transmitted_gets_no_reply() {
    let fx = seeded_stream(12);
    let client = common::recovery_client_socket();
    let req = codec::pack_recovery_request(&fx.name, 100, 1);
    client.send_to(&req, (std::net::Ipv4Addr::LOCALHOST, fx.recovery_port)).unwrap();
    let mut buf = [0u8; 2048];
    let result = client.recv(&mut buf);
    assert!(result.is_err(), "expected a timeout, got a reply");
}

#[test]
fn request_for_unknown_stream_name_is_silently_dropped() {
    let fx = seeded_stream(12);
    let client = common::recovery_client_socket();
    let other_name = codec::make_stream_name("bar");
    let req = codec::pack_recovery_request(&other_name, 1, 1);
    client.send_to(&req, (std::net::Ipv4Addr::LOCALHOST, fx.recovery_port)).unwrap();
    let mut buf = [0u8; 2048];
    let result = client.recv(&mut buf);
    assert!(result.is_err(), "expected no reply for an unrecognized stream name");
}

#[test]
fn request_reaching_below_buffer_low_is_served_from_log() {
    // Small buffer capacity forces early sequences to be evicted from the
    // ring and served from the durable log instead.
    let (mcast_port, recovery_port) = common::next_port_pair();
    let log_file = tempfile::NamedTempFile::new().unwrap();
    let mut cfg = common::stream_config("foo", mcast_port, recovery_port, log_file.path().to_path_buf());
    cfg.recovery_buffer_capacity = 4;

    let mcast_socket = build_multicast_sender(&cfg).unwrap();
    let publisher = Publisher::start(&cfg, mcast_socket, RecoveryLog::open(&cfg.log_path).unwrap()).unwrap();
    let handle = publisher.handle();
    for i in 1..=12u64 {
        handle.send(format!("message{i:02}").as_bytes()).unwrap();
    }
    handle.flush().unwrap();

    let recovery_socket = build_recovery_socket(&cfg).unwrap();
    let recovery = RecoveryServer::start(&cfg, recovery_socket, handle);
    let fx = Fixture { _publisher: publisher, _recovery: recovery, name: codec::make_stream_name("foo"), recovery_port };

    // Sequence 1 is long gone from a 4-entry buffer holding only [9, 12].
    let reply = request_and_reply(&fx, 1, 12).expect("expected a reply spanning log and buffer");
    match reply {
        DecodedPacket::Data { next_expected, messages, .. } => {
            assert_eq!(next_expected, 1);
            assert_eq!(messages.len(), 12);
            for (i, msg) in messages.iter().enumerate() {
                assert_eq!(&msg[2..], format!("message{:02}", i + 1).as_bytes());
            }
        }
        other => panic!("expected Data packet, got {other:?}"),
    }
}

#[test]
#[allow(unused_imports)]
fn reply_timeout_matches_client_socket_configuration() {
    // Sanity check that the client helper's read timeout is actually in effect,
    // so the "no reply" assertions above fail fast rather than hanging.
    let client = common::recovery_client_socket();
    let start = std::time::Instant::now();
    let mut buf = [0u8; 16];
    let _ = client.recv(&mut buf);
    assert!(start.elapsed() < Duration::from_secs(2));
}
