// src/config.rs
use std::{fs, net::Ipv4Addr, path::Path, path::PathBuf};

use serde::Deserialize;

use crate::error::{MoldError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    pub multicast_group: Ipv4Addr,
    pub multicast_port: u16,
    pub recovery_port: u16,
    pub source_ip: Ipv4Addr,
    pub log_path: PathBuf,
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_mtu")]
    pub mtu: usize,
    #[serde(default = "default_recovery_buffer_capacity")]
    pub recovery_buffer_capacity: usize,
    #[serde(default = "default_coalesce_count_limit")]
    pub coalesce_count_limit: usize,
    #[serde(default = "default_coalesce_idle_us")]
    pub coalesce_idle_us: u64,
    #[serde(default = "default_multicast_ttl")]
    pub multicast_ttl: u32,
    #[serde(default)]
    pub multicast_loop: bool,
    #[serde(default)]
    pub send_buffer_bytes: u32,
}

fn default_mtu() -> usize {
    1400
}
fn default_recovery_buffer_capacity() -> usize {
    100_000
}
fn default_coalesce_count_limit() -> usize {
    64
}
fn default_coalesce_idle_us() -> u64 {
    1_000
}
fn default_multicast_ttl() -> u32 {
    1
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.multicast_group.is_multicast() {
            return Err(MoldError::InvalidConfig(format!(
                "multicast_group {} is not a multicast address",
                self.multicast_group
            )));
        }
        if self.mtu < 100 || self.mtu > 65507 {
            return Err(MoldError::InvalidConfig(format!(
                "mtu {} out of range [100, 65507]",
                self.mtu
            )));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(MoldError::InvalidConfig(
                "heartbeat_interval_ms must be > 0".into(),
            ));
        }
        if self.recovery_buffer_capacity == 0 {
            return Err(MoldError::InvalidConfig(
                "recovery_buffer_capacity must be > 0".into(),
            ));
        }
        if self.coalesce_count_limit == 0 {
            return Err(MoldError::InvalidConfig(
                "coalesce_count_limit must be > 0".into(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(MoldError::InvalidConfig("name must be non-empty".into()));
        }
        Ok(())
    }
}

// Used only by the demo binary; library callers construct StreamConfig directly.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherFileConfig {
    #[serde(default)]
    pub json_logs: bool,
    pub streams: Vec<StreamConfig>,
}

impl PublisherFileConfig {
    pub fn from_file<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let s = fs::read_to_string(p.as_ref())?;
        let cfg: PublisherFileConfig = toml::from_str(&s)?;
        for stream in &cfg.streams {
            stream.validate()?;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> StreamConfig {
        StreamConfig {
            name: "foo".into(),
            multicast_group: "239.1.1.1".parse().unwrap(),
            multicast_port: 12345,
            recovery_port: 12346,
            source_ip: "127.0.0.1".parse().unwrap(),
            log_path: PathBuf::from("/tmp/foo.log"),
            heartbeat_interval_ms: 1000,
            mtu: default_mtu(),
            recovery_buffer_capacity: default_recovery_buffer_capacity(),
            coalesce_count_limit: default_coalesce_count_limit(),
            coalesce_idle_us: default_coalesce_idle_us(),
            multicast_ttl: default_multicast_ttl(),
            multicast_loop: false,
            send_buffer_bytes: 0,
        }
    }

    #[test]
    fn rejects_non_multicast_group() {
        let mut cfg = base_config();
        cfg.multicast_group = "10.0.0.1".parse().unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_heartbeat_interval() {
        let mut cfg = base_config();
        cfg.heartbeat_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_default_config() {
        assert!(base_config().validate().is_ok());
    }
}
