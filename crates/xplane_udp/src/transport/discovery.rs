//! # Beacon Discovery
//!
//! One-shot listen for the simulator's multicast announcement.
//!
//! A running simulator multicasts a `BECN` packet about once per second.
//! The command endpoint is the sender's address combined with the port
//! announced inside the beacon, not the port the beacon came from.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use super::recv_bounded;
use crate::config::ClientConfig;
use crate::error::{XPlaneError, XPlaneResult};
use crate::protocol::BeaconInfo;
use crate::MAX_DATAGRAM_SIZE;

/// Result of a successful discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    /// Where to send commands.
    pub endpoint: SocketAddr,
    /// Decoded beacon.
    pub beacon: BeaconInfo,
}

/// Opens a socket joined to the beacon multicast group.
///
/// Address reuse is enabled so several clients can listen on one machine.
/// Must be called from within a tokio runtime.
pub fn multicast_socket(group: Ipv4Addr, port: u16) -> XPlaneResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    // Windows cannot bind to a multicast address
    let bind_ip = if cfg!(windows) { Ipv4Addr::UNSPECIFIED } else { group };
    socket.bind(&SocketAddr::from((bind_ip, port)).into())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_nonblocking(true)?;

    Ok(UdpSocket::from_std(socket.into())?)
}

/// Waits for one beacon on `socket` and validates it.
///
/// - nothing before `deadline`: `EndpointNotFound`
/// - foreign traffic: `UnknownBeacon` (caller may retry)
/// - unsupported version: `VersionNotSupported`
pub async fn listen_for_beacon(socket: &UdpSocket, deadline: Duration) -> XPlaneResult<Discovery> {
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
    let (len, from) = match recv_bounded(socket, &mut buffer, deadline).await {
        Ok(received) => received,
        Err(XPlaneError::Timeout) => return Err(XPlaneError::EndpointNotFound),
        Err(e) => return Err(e),
    };
    let datagram = &buffer[..len];
    tracing::debug!("X-Plane beacon: {}", hex(datagram));

    if !BeaconInfo::is_beacon(datagram) {
        tracing::warn!("Unknown packet from {from}, {len} bytes: {}", hex(datagram));
        return Err(XPlaneError::UnknownBeacon { from, len });
    }

    let beacon = BeaconInfo::decode(datagram)?;
    if let Err(e) = beacon.check_version() {
        tracing::warn!("{e}");
        return Err(e);
    }

    let endpoint = SocketAddr::new(from.ip(), beacon.port);
    tracing::info!(
        "X-Plane beacon version {}.{}.{}: endpoint {}, hostname {}, X-Plane version {}, role {}",
        beacon.main_version,
        beacon.minor_version,
        beacon.software,
        endpoint,
        beacon.hostname,
        beacon.xplane_version,
        beacon.role
    );
    Ok(Discovery { endpoint, beacon })
}

/// Finds the simulator on the network. One attempt only.
pub async fn discover(config: &ClientConfig) -> XPlaneResult<Discovery> {
    let socket = multicast_socket(config.multicast_group, config.multicast_port)?;
    listen_for_beacon(&socket, config.discovery_timeout()).await
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
