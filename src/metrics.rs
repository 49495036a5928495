// src/metrics.rs
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static PACKETS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    let c =
        IntCounterVec::new(Opts::new("mold_packets_sent", "Downstream packets multicast per stream"), &["stream"])
            .expect("mold_packets_sent");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("mold_messages_sent", "Encoded messages transmitted per stream"),
        &["stream"],
    )
    .expect("mold_messages_sent");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static HEARTBEATS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(Opts::new("mold_heartbeats_sent", "Heartbeat packets sent per stream"), &["stream"])
        .expect("mold_heartbeats_sent");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static BYTES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(Opts::new("mold_bytes_sent", "Bytes multicast per stream"), &["stream"])
        .expect("mold_bytes_sent");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static SEND_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("mold_send_failures", "Transient multicast/unicast send failures per stream"),
        &["stream"],
    )
    .expect("mold_send_failures");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static RECOVERY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("mold_recovery_requests", "Recovery requests received per stream"),
        &["stream"],
    )
    .expect("mold_recovery_requests");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static RECOVERY_REQUESTS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("mold_recovery_requests_dropped", "Malformed or out-of-range recovery requests dropped"),
        &["stream"],
    )
    .expect("mold_recovery_requests_dropped");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static RECOVERY_MESSAGES_FROM_BUFFER: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("mold_recovery_messages_from_buffer", "Recovery messages resolved from the in-memory buffer")
        .expect("mold_recovery_messages_from_buffer");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static RECOVERY_MESSAGES_FROM_LOG: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("mold_recovery_messages_from_log", "Recovery messages resolved from the on-disk log")
        .expect("mold_recovery_messages_from_log");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static LOG_APPEND_LATENCY_NS: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(HistogramOpts::new(
        "mold_log_append_latency_ns",
        "Latency of a single recovery-log append, in nanoseconds",
    ))
    .expect("mold_log_append_latency_ns");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

static FLUSH_BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(HistogramOpts::new(
        "mold_flush_batch_size",
        "Number of messages coalesced into a single flush",
    ))
    .expect("mold_flush_batch_size");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

pub fn inc_packets_sent(stream: &str) {
    PACKETS_SENT.with_label_values(&[stream]).inc();
}

pub fn inc_messages_sent(stream: &str, n: u64) {
    MESSAGES_SENT.with_label_values(&[stream]).inc_by(n);
}

pub fn inc_heartbeats_sent(stream: &str) {
    HEARTBEATS_SENT.with_label_values(&[stream]).inc();
}

pub fn inc_bytes_sent(stream: &str, n: u64) {
    BYTES_SENT.with_label_values(&[stream]).inc_by(n);
}

pub fn inc_send_failures(stream: &str) {
    SEND_FAILURES.with_label_values(&[stream]).inc();
}

pub fn inc_recovery_requests(stream: &str) {
    RECOVERY_REQUESTS.with_label_values(&[stream]).inc();
}

pub fn inc_recovery_requests_dropped(stream: &str) {
    RECOVERY_REQUESTS_DROPPED.with_label_values(&[stream]).inc();
}

pub fn inc_recovery_messages_from_buffer(n: u64) {
    RECOVERY_MESSAGES_FROM_BUFFER.inc_by(n);
}

pub fn inc_recovery_messages_from_log(n: u64) {
    RECOVERY_MESSAGES_FROM_LOG.inc_by(n);
}

pub fn observe_log_append_latency_ns(v: f64) {
    LOG_APPEND_LATENCY_NS.observe(v);
}

pub fn observe_flush_batch_size(v: f64) {
    FLUSH_BATCH_SIZE.observe(v);
}

pub fn gather_text() -> String {
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::with_capacity(8 * 1024);
    TextEncoder::new().encode(&metric_families, &mut buf).ok();
    String::from_utf8(buf).unwrap_or_default()
}
