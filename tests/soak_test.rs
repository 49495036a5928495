mod common;

use std::collections::HashMap;
use std::time::Duration;

use mold_publisher::codec::{self, DecodedPacket};
use mold_publisher::net::{build_multicast_sender, build_recovery_socket};
use mold_publisher::publisher::Publisher;
use mold_publisher::recovery_log::RecoveryLog;
use mold_publisher::recovery_server::RecoveryServer;

/// A cheap deterministic pseudo-random sequence, since the toolchain's
/// `rand` crate isn't part of this stack and nothing here needs
/// cryptographic quality, only spread.
struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0
    }

    fn next_range(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }
}

/// Submits a batch of small payloads, then fires a round of randomized
/// recovery requests within `[1, submitted]`, checking that every reply's
/// payloads match exactly what was originally submitted at that sequence and
/// that the live multicast feed never duplicates or reorders a sequence.
#[test]
fn randomized_submissions_and_recoveries_stay_consistent() {
    let (mcast_port, recovery_port) = common::next_port_pair();
    let log_file = tempfile::NamedTempFile::new().unwrap();
    let mut cfg = common::stream_config("soak", mcast_port, recovery_port, log_file.path().to_path_buf());
    cfg.recovery_buffer_capacity = 16; // small on purpose, forces log fallback

    let subscriber = common::subscriber_socket(&cfg);
    let mcast_socket = build_multicast_sender(&cfg).unwrap();
    let publisher = Publisher::start(&cfg, mcast_socket, RecoveryLog::open(&cfg.log_path).unwrap()).unwrap();
    let handle = publisher.handle();
    let recovery_socket = build_recovery_socket(&cfg).unwrap();
    let _recovery = RecoveryServer::start(&cfg, recovery_socket, handle.clone());

    let mut rng = Lcg(0x5EED_u64);
    let total: u64 = 200;
    let mut submitted: HashMap<u64, Vec<u8>> = HashMap::new();
    for seq in 1..=total {
        let len = 1 + rng.next_range(40) as usize;
        let payload: Vec<u8> = (0..len).map(|i| ((seq as usize + i) % 256) as u8).collect();
        handle.send(&payload).unwrap();
        submitted.insert(seq, payload);
        if seq % 37 == 0 {
            handle.flush().unwrap();
        }
    }
    handle.flush().unwrap();
    assert_eq!(handle.next_seq(), total + 1);

    // Drain the multicast feed and assert strictly increasing, gap-free,
    // duplicate-free sequence coverage.
    let mut last_seen = 0u64;
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    let mut buf = [0u8; 4096];
    while last_seen < total && std::time::Instant::now() < deadline {
        let n = match subscriber.recv(&mut buf) {
            Ok(n) => n,
            Err(_) => continue,
        };
        if let Ok(DecodedPacket::Data { next_expected, messages, .. }) = codec::parse_packet(&buf[..n]) {
            let first_seq = next_expected;
            assert_eq!(first_seq, last_seen + 1, "gap or duplicate in multicast feed");
            for (i, msg) in messages.iter().enumerate() {
                let seq = first_seq + i as u64;
                assert_eq!(&msg[2..], submitted[&seq].as_slice());
            }
            last_seen = first_seq + messages.len() as u64 - 1;
        }
    }
    assert_eq!(last_seen, total, "did not observe the full submitted range on the wire");

    // Randomized recovery requests: every reply must match what was submitted.
    let client = common::recovery_client_socket();
    let name = codec::make_stream_name("soak");
    for _ in 0..30 {
        let seq = 1 + rng.next_range(total);
        let count = 1 + rng.next_range(8) as u16;
        let req = codec::pack_recovery_request(&name, seq, count);
        client.send_to(&req, (std::net::Ipv4Addr::LOCALHOST, recovery_port)).unwrap();
        let mut rbuf = [0u8; 4096];
        let n = match client.recv(&mut rbuf) {
            Ok(n) => n,
            Err(_) => continue, // request ran past `total`; no reply is valid
        };
        if let Ok(DecodedPacket::Data { next_expected, messages, .. }) = codec::parse_packet(&rbuf[..n]) {
            assert_eq!(next_expected, seq);
            for (i, msg) in messages.iter().enumerate() {
                let s = seq + i as u64;
                if s > total {
                    break;
                }
                assert_eq!(&msg[2..], submitted[&s].as_slice());
            }
        }
    }
}
