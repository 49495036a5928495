// src/publisher.rs

use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{info, warn};

use crate::codec::{self, StreamName};
use crate::config::StreamConfig;
use crate::error::{MoldError, Result};
use crate::metrics;
use crate::recovery_buffer::RecoveryBuffer;
use crate::recovery_log::RecoveryLog;
use crate::util::BarrierFlag;

struct PublisherState {
    next_seq: u64,
    pending: Vec<Bytes>,
    pending_size: usize,
    last_send: Instant,
    faulted: bool, // set on a log I/O error; stops accepting submissions until restarted
    log: RecoveryLog,
    buffer: RecoveryBuffer,
}

struct Inner {
    name: StreamName,
    label: String,
    mtu: usize,
    coalesce_count_limit: usize,
    coalesce_idle: Duration,
    heartbeat_interval: Duration,
    socket: UdpSocket,
    state: Mutex<PublisherState>,
    shutdown: BarrierFlag,
}

#[derive(Clone)]
pub struct PublisherHandle {
    inner: Arc<Inner>,
}

struct TimerThread {
    join: Option<thread::JoinHandle<()>>,
}

pub struct Publisher {
    handle: PublisherHandle,
    timer: TimerThread,
}

impl Publisher {
    // `socket` must already be connected to the multicast group (or, in
    // tests, any connected UDP socket). `next_seq` resumes at last_written+1.
    pub fn start(cfg: &StreamConfig, socket: UdpSocket, log: RecoveryLog) -> Result<Self> {
        socket.set_nonblocking(false).ok();
        let next_seq = log.last_written() + 1;
        let buffer = RecoveryBuffer::new(cfg.recovery_buffer_capacity);
        let state = PublisherState {
            next_seq,
            pending: Vec::with_capacity(cfg.coalesce_count_limit),
            pending_size: 0,
            last_send: Instant::now(),
            faulted: false,
            log,
            buffer,
        };
        let inner = Arc::new(Inner {
            name: codec::make_stream_name(&cfg.name),
            label: cfg.name.clone(),
            mtu: cfg.mtu,
            coalesce_count_limit: cfg.coalesce_count_limit,
            coalesce_idle: Duration::from_micros(cfg.coalesce_idle_us.max(1)),
            heartbeat_interval: Duration::from_millis(cfg.heartbeat_interval_ms),
            socket,
            state: Mutex::new(state),
            shutdown: BarrierFlag::default(),
        });

        let handle = PublisherHandle { inner: inner.clone() };
        let timer_handle = handle.clone();
        let join = thread::Builder::new()
            .name(format!("mold-pub-{}", cfg.name))
            .spawn(move || timer_loop(timer_handle))
            .expect("spawn publisher timer thread");

        info!("publisher '{}' started at next_seq={}", cfg.name, next_seq);
        Ok(Self { handle, timer: TimerThread { join: Some(join) } })
    }

    pub fn handle(&self) -> PublisherHandle {
        self.handle.clone()
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.handle.inner.shutdown.raise();
        if let Some(j) = self.timer.join.take() {
            let _ = j.join();
        }
        self.handle.end_of_session()
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.handle.inner.shutdown.raise();
        if let Some(j) = self.timer.join.take() {
            let _ = j.join();
        }
    }
}

fn timer_loop(handle: PublisherHandle) {
    let tick = handle.inner.coalesce_idle.min(handle.inner.heartbeat_interval).max(Duration::from_micros(100));
    while !handle.inner.shutdown.is_raised() {
        thread::sleep(tick);
        if handle.inner.shutdown.is_raised() {
            break;
        }
        let mut state = handle.inner.state.lock().unwrap();
        if state.faulted {
            continue;
        }
        if !state.pending.is_empty() && state.last_send.elapsed() >= handle.inner.coalesce_idle {
            if let Err(e) = handle.flush_locked(&mut state) {
                warn!("publisher '{}' idle flush failed: {e}", handle.inner.label);
            }
        } else if state.pending.is_empty() && state.last_send.elapsed() >= handle.inner.heartbeat_interval {
            handle.send_heartbeat_locked(&mut state);
        }
    }
}

impl PublisherHandle {
    pub fn stream_name(&self) -> &str {
        &self.inner.label
    }

    pub fn next_seq(&self) -> u64 {
        self.inner.state.lock().unwrap().next_seq
    }

    pub fn is_faulted(&self) -> bool {
        self.inner.state.lock().unwrap().faulted
    }

    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        self.enqueue_locked(&mut state, payload)
    }

    // For a producer that already assigned sequence numbers upstream; rejects
    // anything but the next sequence this publisher would itself assign.
    pub fn send_with_seq(&self, seq: u64, payload: &[u8]) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if state.faulted {
            return Err(faulted_error());
        }
        let expected = state.next_seq + state.pending.len() as u64;
        if seq != expected {
            return Err(MoldError::SequenceMismatch { submitted: seq, expected });
        }
        self.enqueue_locked(&mut state, payload)
    }

    fn enqueue_locked(&self, state: &mut PublisherState, payload: &[u8]) -> Result<()> {
        if state.faulted {
            return Err(faulted_error());
        }
        let encoded = codec::encode_message(payload, self.inner.mtu)?;

        let projected = codec::projected_packet_size(state.pending_size, payload);
        if projected > self.inner.mtu {
            self.flush_locked(state)?;
        }

        if state.pending.is_empty() {
            state.pending_size = codec::HEADER_LEN;
        }
        state.pending_size += encoded.len();
        state.pending.push(encoded);

        if state.pending.len() >= self.inner.coalesce_count_limit {
            self.flush_locked(state)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if state.faulted {
            return Err(faulted_error());
        }
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut PublisherState) -> Result<()> {
        if state.pending.is_empty() {
            return Ok(());
        }
        let batch_len = state.pending.len() as u64;
        let first_seq = state.next_seq;

        for encoded in &state.pending {
            let started = Instant::now();
            if let Err(e) = state.log.append(encoded) {
                state.faulted = true;
                return Err(e);
            }
            metrics::observe_log_append_latency_ns(started.elapsed().as_nanos() as f64);
        }

        for (i, encoded) in state.pending.iter().enumerate() {
            state.buffer.insert(first_seq + i as u64, encoded.clone());
        }

        let packet = codec::pack_packet(&self.inner.name, first_seq, &state.pending);
        // Sequence numbers are consumed regardless of send outcome: the log
        // already holds the batch, so recovery can serve it even if the
        // multicast send below is dropped.
        state.next_seq = first_seq + batch_len;
        let batch_size = state.pending.len();
        state.pending.clear();
        state.pending_size = 0;
        state.last_send = Instant::now();

        metrics::observe_flush_batch_size(batch_size as f64);
        match self.inner.socket.send(&packet) {
            Ok(_) => {
                metrics::inc_packets_sent(&self.inner.label);
                metrics::inc_messages_sent(&self.inner.label, batch_len);
                metrics::inc_bytes_sent(&self.inner.label, packet.len() as u64);
            }
            Err(e) => {
                metrics::inc_send_failures(&self.inner.label);
                warn!(
                    "publisher '{}' transient send failure (seqs [{}, {})): {e}",
                    self.inner.label,
                    first_seq,
                    first_seq + batch_len
                );
            }
        }
        Ok(())
    }

    fn send_heartbeat_locked(&self, state: &mut PublisherState) {
        let packet = codec::pack_heartbeat(&self.inner.name, state.next_seq);
        state.last_send = Instant::now();
        match self.inner.socket.send(&packet) {
            Ok(_) => metrics::inc_heartbeats_sent(&self.inner.label),
            Err(e) => {
                metrics::inc_send_failures(&self.inner.label);
                warn!("publisher '{}' heartbeat send failure: {e}", self.inner.label);
            }
        }
    }

    fn end_of_session(&self) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if !state.faulted {
            self.flush_locked(&mut state)?;
            let packet = codec::pack_end_of_session(&self.inner.name, state.next_seq);
            if let Err(e) = self.inner.socket.send(&packet) {
                warn!("publisher '{}' end-of-session send failure: {e}", self.inner.label);
            }
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, seq: u64, count: u16) -> Result<Vec<Bytes>> {
        let mut state = self.inner.state.lock().unwrap();
        resolve_locked(&mut state, seq, count)
    }

    pub(crate) fn last_transmitted(&self) -> (u64, u64) {
        let state = self.inner.state.lock().unwrap();
        let high = state.next_seq.saturating_sub(1);
        let low = state.buffer.low().unwrap_or(if high > 0 { 1 } else { 0 });
        (low, high)
    }
}

fn resolve_locked(state: &mut PublisherState, seq: u64, count: u16) -> Result<Vec<Bytes>> {
    let high = state.next_seq.saturating_sub(1);
    if seq == 0 || seq > high {
        return Ok(Vec::new());
    }
    let buffered = state.buffer.lookup_range(seq, count);
    let buffered_from = buffered.len() as u64;
    metrics::inc_recovery_messages_from_buffer(buffered_from);

    let need_from_log = match state.buffer.low() {
        Some(low) if seq < low => (low - seq).min(count as u64) as u16,
        None => (count as u64).min(high - seq + 1) as u16,
        _ => 0,
    };
    if need_from_log == 0 {
        return Ok(buffered);
    }
    let from_log = state.log.read_range(seq, need_from_log)?;
    metrics::inc_recovery_messages_from_log(from_log.len() as u64);
    let mut out = from_log;
    out.extend(buffered);
    Ok(out)
}

fn faulted_error() -> MoldError {
    MoldError::LogIoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        "publisher is faulted after a prior log I/O error; awaiting supervised restart",
    ))
}
