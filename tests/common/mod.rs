//! Shared scaffolding for the integration tests: unique loopback ports per
//! test (so parallel `cargo test` runs don't collide), a multicast
//! subscriber socket, and a stream config builder.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use mold_publisher::config::StreamConfig;

static NEXT_PORT: AtomicU16 = AtomicU16::new(25_000);

/// Returns two ports at least 2 apart, stable for the lifetime of the process.
pub fn next_port_pair() -> (u16, u16) {
    let base = NEXT_PORT.fetch_add(2, Ordering::Relaxed);
    (base, base + 1)
}

pub fn stream_config(name: &str, mcast_port: u16, recovery_port: u16, log_path: PathBuf) -> StreamConfig {
    StreamConfig {
        name: name.to_string(),
        multicast_group: "239.1.1.1".parse().unwrap(),
        multicast_port: mcast_port,
        recovery_port,
        source_ip: Ipv4Addr::LOCALHOST,
        log_path,
        heartbeat_interval_ms: 200,
        mtu: 1400,
        recovery_buffer_capacity: 1024,
        coalesce_count_limit: 64,
        coalesce_idle_us: 500,
        multicast_ttl: 1,
        multicast_loop: true,
        send_buffer_bytes: 0,
    }
}

/// A subscriber socket joined to the stream's multicast group, for assertions
/// in tests that observe the wire directly.
pub fn subscriber_socket(cfg: &StreamConfig) -> UdpSocket {
    use socket2::{Domain, Protocol, Socket, Type};
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
    sock.set_reuse_address(true).ok();
    let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, cfg.multicast_port));
    sock.bind(&bind_addr.into()).unwrap();
    sock.join_multicast_v4(&cfg.multicast_group, &cfg.source_ip).unwrap();
    let socket: UdpSocket = sock.into();
    socket.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    socket
}

/// A one-shot client socket for sending recovery requests and reading replies.
pub fn recovery_client_socket() -> UdpSocket {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    socket.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    socket
}
