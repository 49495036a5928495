// src/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::StreamConfig;
use crate::error::{MoldError, Result};
use crate::net;
use crate::publisher::{Publisher, PublisherHandle};
use crate::recovery_log::RecoveryLog;
use crate::recovery_server::RecoveryServer;
use crate::util::BarrierFlag;

struct StreamEntry {
    cfg: StreamConfig,
    publisher: Publisher,
    recovery: RecoveryServer,
}

struct Inner {
    streams: Mutex<HashMap<String, StreamEntry>>,
    shutdown: BarrierFlag,
}

pub struct Registry {
    inner: Arc<Inner>,
    watchdog: Option<thread::JoinHandle<()>>,
}

impl Registry {
    pub fn new() -> Self {
        let inner = Arc::new(Inner { streams: Mutex::new(HashMap::new()), shutdown: BarrierFlag::default() });
        let watchdog_inner = inner.clone();
        let watchdog = thread::Builder::new()
            .name("mold-registry-watchdog".into())
            .spawn(move || watchdog_loop(watchdog_inner))
            .expect("spawn registry watchdog");
        Self { inner, watchdog: Some(watchdog) }
    }

    pub fn create_stream(&self, cfg: StreamConfig) -> Result<PublisherHandle> {
        cfg.validate()?;
        let mut streams = self.inner.streams.lock().unwrap();
        if streams.contains_key(&cfg.name) {
            return Err(MoldError::StreamAlreadyExists(cfg.name));
        }
        let entry = spawn_stream(&cfg)?;
        let handle = entry.publisher.handle();
        streams.insert(cfg.name.clone(), entry);
        info!("registry: stream '{}' created", cfg.name);
        Ok(handle)
    }

    pub fn send(&self, name: &str, payload: &[u8]) -> Result<()> {
        let streams = self.inner.streams.lock().unwrap();
        let entry = streams.get(name).ok_or_else(|| MoldError::StreamNotFound(name.to_string()))?;
        entry.publisher.handle().send(payload)
    }

    pub fn handle(&self, name: &str) -> Result<PublisherHandle> {
        let streams = self.inner.streams.lock().unwrap();
        streams
            .get(name)
            .map(|e| e.publisher.handle())
            .ok_or_else(|| MoldError::StreamNotFound(name.to_string()))
    }

    pub fn shutdown_stream(&self, name: &str) -> Result<()> {
        let entry = {
            let mut streams = self.inner.streams.lock().unwrap();
            streams.remove(name).ok_or_else(|| MoldError::StreamNotFound(name.to_string()))?
        };
        entry.recovery.shutdown();
        entry.publisher.shutdown()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.inner.shutdown.raise();
        if let Some(j) = self.watchdog.take() {
            let _ = j.join();
        }
        let names: Vec<String> = self.inner.streams.lock().unwrap().keys().cloned().collect();
        for name in names {
            let _ = self.shutdown_stream(&name);
        }
    }
}

fn spawn_stream(cfg: &StreamConfig) -> Result<StreamEntry> {
    let mcast_socket = net::build_multicast_sender(cfg)
        .map_err(|e| MoldError::InvalidConfig(format!("multicast socket setup failed: {e}")))?;
    let recovery_socket = net::build_recovery_socket(cfg)
        .map_err(|e| MoldError::InvalidConfig(format!("recovery socket setup failed: {e}")))?;
    let log = RecoveryLog::open(&cfg.log_path)?;

    let publisher = Publisher::start(cfg, mcast_socket, log)?;
    let recovery = RecoveryServer::start(cfg, recovery_socket, publisher.handle());

    Ok(StreamEntry { cfg: cfg.clone(), publisher, recovery })
}

fn watchdog_loop(inner: Arc<Inner>) {
    while !inner.shutdown.is_raised() {
        thread::sleep(Duration::from_millis(200));
        if inner.shutdown.is_raised() {
            break;
        }
        let faulted_names: Vec<String> = {
            let streams = inner.streams.lock().unwrap();
            streams
                .iter()
                .filter(|(_, e)| e.publisher.handle().is_faulted())
                .map(|(n, _)| n.clone())
                .collect()
        };
        for name in faulted_names {
            warn!("registry: stream '{name}' publisher faulted, restarting");
            let mut streams = inner.streams.lock().unwrap();
            let Some(old) = streams.remove(&name) else { continue };
            let cfg = old.cfg.clone();
            drop(old); // flush timer/recovery threads before respawning on the same ports
            match spawn_stream(&cfg) {
                Ok(entry) => {
                    info!("registry: stream '{name}' restarted at next_seq={}", entry.publisher.handle().next_seq());
                    streams.insert(name, entry);
                }
                Err(e) => {
                    error!("registry: failed to restart stream '{name}': {e}");
                }
            }
        }
    }
}
