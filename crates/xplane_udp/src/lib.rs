//! # XPlane UDP - Dataref Telemetry Client
//!
//! Discovers a running X-Plane instance on the local network, subscribes to
//! datarefs at a chosen rate and keeps a continuously updated cache of their
//! latest values. Values can also be written back into the simulator.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        XPLANE CLIENT                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐        │
//! │  │ Registry     │  │ Value Cache  │  │ Transport    │        │
//! │  │ (id <-> name)│  │ (id -> f32)  │  │ (UDP, async) │        │
//! │  └──────────────┘  └──────▲───────┘  └──────┬───────┘        │
//! │                           │                 │                │
//! │                    ┌──────┴─────────────────▼──────┐         │
//! │                    │  Receive Loop (3 s deadline)  │         │
//! │                    └───────────────────────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Protocol**: fixed-offset binary codec, native byte order
//! - **Discovery**: one-shot multicast beacon listen
//! - **Transport**: single-writer send queue, time-bounded receive
//! - **Cache**: last-write-wins per wire id, `None` until the first sample
//!
//! ## Example
//!
//! ```rust,ignore
//! use xplane_udp::{ClientConfig, XPlaneClient};
//!
//! let client = XPlaneClient::new(ClientConfig::default())?;
//! client.add_dataref("sim/flightmodel/position/latitude", 1, None);
//! client.add_dataref_array("sim/flightmodel/engine/ENGN_N1_", 16, 1);
//!
//! if let Some(lat) = client.get_dataref("sim/flightmodel/position/latitude", None) {
//!     println!("latitude: {lat}");
//! }
//! client.close();
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

// Re-exports for convenience
pub use cache::LatestValueCache;
pub use client::{ReceiveLoop, XPlaneClient};
pub use config::ClientConfig;
pub use error::{XPlaneError, XPlaneResult};
pub use protocol::{BeaconInfo, Command, PlaneInfo};
pub use registry::{ArrayBlock, ArrayTable, SubscriptionRegistry};
pub use transport::{discover, BoundedUdpTransport, Discovery};

/// Well-known multicast group the simulator announces itself on.
pub const MULTICAST_GROUP: std::net::Ipv4Addr = std::net::Ipv4Addr::new(239, 255, 1, 1);

/// Well-known multicast port of the beacon.
pub const MULTICAST_PORT: u16 = 49707;

/// Default deadline for discovery and for every steady-state receive.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Largest datagram the simulator sends (Ethernet MTU minus IP/UDP headers).
pub const MAX_DATAGRAM_SIZE: usize = 1472;
