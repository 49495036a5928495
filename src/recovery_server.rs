// src/recovery_server.rs

use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};

use crate::codec::{self, StreamName};
use crate::config::StreamConfig;
use crate::metrics;
use crate::publisher::PublisherHandle;
use crate::util::BarrierFlag;

pub struct RecoveryServer {
    shutdown: std::sync::Arc<BarrierFlag>,
    join: Option<thread::JoinHandle<()>>,
}

impl RecoveryServer {
    pub fn start(cfg: &StreamConfig, socket: UdpSocket, publisher: PublisherHandle) -> Self {
        let shutdown = std::sync::Arc::new(BarrierFlag::default());
        let name = codec::make_stream_name(&cfg.name);
        let label = cfg.name.clone();
        let mtu = cfg.mtu;
        let worker_shutdown = shutdown.clone();
        socket.set_read_timeout(Some(Duration::from_millis(200))).ok();

        let join = thread::Builder::new()
            .name(format!("mold-recovery-{}", cfg.name))
            .spawn(move || run(socket, name, label, mtu, publisher, worker_shutdown))
            .expect("spawn recovery server thread");

        Self { shutdown, join: Some(join) }
    }

    pub fn shutdown(mut self) {
        self.shutdown.raise();
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for RecoveryServer {
    fn drop(&mut self) {
        self.shutdown.raise();
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

fn run(
    socket: UdpSocket,
    name: StreamName,
    label: String,
    mtu: usize,
    publisher: PublisherHandle,
    shutdown: std::sync::Arc<BarrierFlag>,
) {
    let mut buf = vec![0u8; 65536];
    while !shutdown.is_raised() {
        match socket.recv_from(&mut buf) {
            Ok((n, addr)) => {
                handle_request(&buf[..n], addr, &socket, &name, &label, mtu, &publisher);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => {
                warn!("recovery server '{label}' recv error: {e}");
            }
        }
    }
}

fn handle_request(
    bytes: &[u8],
    addr: std::net::SocketAddr,
    socket: &UdpSocket,
    name: &StreamName,
    label: &str,
    mtu: usize,
    publisher: &PublisherHandle,
) {
    let (req_name, seq, count) = match codec::parse_recovery_request(bytes) {
        Ok(parsed) => parsed,
        Err(_) => {
            metrics::inc_recovery_requests_dropped(label);
            return;
        }
    };
    if &req_name != name {
        metrics::inc_recovery_requests_dropped(label);
        return;
    }
    metrics::inc_recovery_requests(label);

    let (_low, high) = publisher.last_transmitted();
    if seq == 0 || seq > high {
        debug!("recovery server '{label}': request for seq={seq} entirely beyond high={high}, no reply");
        return;
    }

    let messages = match publisher.resolve(seq, count) {
        Ok(m) => m,
        Err(e) => {
            warn!("recovery server '{label}': failed to resolve [{seq}, {seq}+{count}): {e}");
            return;
        }
    };
    if messages.is_empty() {
        return;
    }

    let clamped = clamp_to_mtu(&messages, mtu);
    let packet = codec::pack_packet(name, seq, clamped);
    if let Err(e) = socket.send_to(&packet, addr) {
        warn!("recovery server '{label}': reply send to {addr} failed: {e}");
    }
}

// Largest prefix of `messages` whose packed packet fits `mtu`.
fn clamp_to_mtu(messages: &[Bytes], mtu: usize) -> &[Bytes] {
    let mut size = codec::HEADER_LEN;
    let mut k = 0;
    for m in messages {
        let next = size + m.len();
        if next > mtu {
            break;
        }
        size = next;
        k += 1;
    }
    &messages[..k]
}
