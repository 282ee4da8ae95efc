//! # X-Plane Monitor
//!
//! Finds a running simulator, streams a few datarefs and logs them.
//! Every cycle it flips COM1 between two frequencies to exercise writes.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --package xplane_udp --features monitor --bin xplane_monitor -- --duration 60
//! RUST_LOG=xplane_udp=debug xplane_monitor --config xplane.toml
//! ```

use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;
use xplane_udp::{ClientConfig, XPlaneClient};

const LATITUDE: &str = "sim/flightmodel/position/latitude";
const ENGINE_N1: &str = "sim/flightmodel/engine/ENGN_N1_";
const COM1_FREQ: &str = "sim/cockpit/radios/com1_freq_hz";

/// Engines reported by `ENGN_N1_`.
const ENGINE_COUNT: usize = 16;
/// Log interval.
const CYCLE: Duration = Duration::from_secs(2);
/// COM1 alternates between these.
const COM1_FREQUENCIES: [f32; 2] = [12_640.0, 12_665.0];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut duration_secs: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--duration" | "-d" => {
                if i + 1 < args.len() {
                    duration_secs = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: xplane_monitor [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>      TOML client configuration");
                println!("  -d, --duration <SECS>    Run for N seconds then exit");
                println!("  -h, --help               Show this help");
                return;
            }
            other => tracing::warn!("Ignoring unknown argument {other}"),
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => match ClientConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Cannot load {path}: {e}");
                std::process::exit(2);
            }
        },
        None => ClientConfig::default(),
    };

    let client = match XPlaneClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("No simulator: {e}");
            std::process::exit(1);
        }
    };
    if let Some(beacon) = client.beacon() {
        tracing::info!(
            "Connected to {} (X-Plane {}, role {}) at {}",
            beacon.hostname,
            beacon.xplane_version,
            beacon.role,
            client.remote_endpoint()
        );
    }

    client.add_dataref(LATITUDE, 1, None);
    client.add_dataref_array(ENGINE_N1, ENGINE_COUNT, 1);
    client.add_basic_info(2);

    let start = Instant::now();
    let mut cycle = 0usize;
    loop {
        std::thread::sleep(CYCLE);

        if !client.is_receiving() {
            tracing::warn!("Simulator silent");
        }
        match client.get_dataref(LATITUDE, None) {
            Some(lat) => tracing::info!("latitude: {lat:.6}"),
            None => tracing::info!("latitude: no sample yet"),
        }
        match client.get_dataref_array(ENGINE_N1) {
            Some(n1) => tracing::info!("N1: {n1:?}"),
            None => tracing::info!("N1: incomplete"),
        }
        if let Some(info) = client.get_basic_info() {
            tracing::info!(
                "position: {:.5}, {:.5} at {:.0} m, heading {:.1}",
                info.latitude,
                info.longitude,
                info.altitude,
                info.heading
            );
        }

        let freq = COM1_FREQUENCIES[cycle % COM1_FREQUENCIES.len()];
        client.set_dataref(COM1_FREQ, freq, None);
        cycle += 1;

        if duration_secs.is_some_and(|d| start.elapsed() >= Duration::from_secs(d)) {
            break;
        }
    }

    let stats = client.stats();
    tracing::info!(
        "Sent {} packets, received {} packets, {} timeouts",
        stats.packets_sent,
        stats.packets_received,
        stats.timeouts
    );
    client.close();
}
