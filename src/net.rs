// src/net.rs

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};

use crate::config::StreamConfig;

pub fn build_multicast_sender(cfg: &StreamConfig) -> anyhow::Result<UdpSocket> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket")?;
    sock.set_reuse_address(true).ok();

    let bind_addr = SocketAddr::new(IpAddr::V4(cfg.source_ip), 0);
    sock.bind(&bind_addr.into()).context("bind source interface")?;

    sock.set_multicast_if_v4(&cfg.source_ip).context("set_multicast_if_v4")?;
    sock.set_multicast_ttl_v4(cfg.multicast_ttl).context("set_multicast_ttl_v4")?;
    sock.set_multicast_loop_v4(cfg.multicast_loop).ok();

    if cfg.send_buffer_bytes > 0 {
        let _ = sock.set_send_buffer_size(cfg.send_buffer_bytes as usize);
    }

    let s: UdpSocket = sock.into();
    s.connect(SocketAddr::V4(SocketAddrV4::new(cfg.multicast_group, cfg.multicast_port)))
        .context("connect to multicast group")?;
    Ok(s)
}

pub fn build_recovery_socket(cfg: &StreamConfig) -> anyhow::Result<UdpSocket> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket")?;
    sock.set_reuse_address(true).ok();
    let bind_addr = SocketAddr::new(IpAddr::V4(cfg.source_ip), cfg.recovery_port);
    sock.bind(&bind_addr.into()).context("bind recovery port")?;
    Ok(sock.into())
}

// test helper: ephemeral-port loopback address
pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}
