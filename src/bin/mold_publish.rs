// src/bin/mold_publish.rs — demo harness that exercises the library end to
// end: load a stream config, create it in the registry, feed it a handful
// of payloads from stdin, and keep the process alive so heartbeats and
// recovery requests can be observed. Not a general-purpose CLI.
use std::io::BufRead;
use std::path::PathBuf;

use log::info;
use mold_publisher::config::PublisherFileConfig;
use mold_publisher::registry::Registry;

fn main() -> anyhow::Result<()> {
    let cfg_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("mold.toml"));
    let cfg = PublisherFileConfig::from_file(&cfg_path)?;

    if cfg.json_logs {
        let mut b = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        b.format(|buf, record| {
            use std::io::Write;
            let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            writeln!(
                buf,
                "{{\"ts\":\"{}\",\"level\":\"{}\",\"target\":\"{}\",\"msg\":\"{}\"}}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        });
        b.init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let registry = Registry::new();
    for stream_cfg in &cfg.streams {
        registry.create_stream(stream_cfg.clone())?;
        info!("stream '{}' live: multicast {}:{}, recovery port {}", stream_cfg.name, stream_cfg.multicast_group, stream_cfg.multicast_port, stream_cfg.recovery_port);
    }

    if let Some(first) = cfg.streams.first() {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            registry.send(&first.name, line.as_bytes())?;
        }
    } else {
        loop {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        }
    }

    Ok(())
}
