//! # Transport Layer
//!
//! UDP transport with a single-writer send path and time-bounded receives.
//!
//! ## Design
//!
//! - Sends are queued and drained by one writer task, so packets never interleave
//! - Sends are fire-and-forget: failures are counted and logged, never returned
//! - Every receive races a deadline timer; the loser is dropped (cancelled)
//! - `shutdown` wakes an in-flight receive so the loop can observe it

mod discovery;

pub use discovery::{discover, listen_for_beacon, multicast_socket, Discovery};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::error::{XPlaneError, XPlaneResult};

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors.
    pub send_errors: u64,
    /// Receives that hit their deadline.
    pub timeouts: u64,
}

#[derive(Default)]
struct Counters {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
    timeouts: AtomicU64,
}

/// Waits for one datagram on `socket`, failing with `Timeout` after `deadline`.
pub async fn recv_bounded(
    socket: &UdpSocket,
    buffer: &mut [u8],
    deadline: Duration,
) -> XPlaneResult<(usize, SocketAddr)> {
    tokio::select! {
        received = socket.recv_from(buffer) => Ok(received?),
        () = tokio::time::sleep(deadline) => Err(XPlaneError::Timeout),
    }
}

/// UDP socket talking to one remote simulator.
pub struct BoundedUdpTransport {
    /// The underlying socket, shared with the writer task.
    socket: Arc<UdpSocket>,
    /// Simulator endpoint.
    remote: SocketAddr,
    /// Local address.
    local_addr: SocketAddr,
    /// Queue feeding the writer task. `None` once shut down.
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    /// Writer task handle.
    writer: Mutex<Option<JoinHandle<()>>>,
    /// Wakes a pending receive on shutdown.
    shutdown: Notify,
    /// Statistics.
    counters: Arc<Counters>,
}

impl BoundedUdpTransport {
    /// Binds `local` and starts the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bind(local: SocketAddr, remote: SocketAddr) -> XPlaneResult<Self> {
        let socket = UdpSocket::bind(local).await?;
        Self::from_socket(socket, remote)
    }

    /// Wraps an already bound socket and starts the writer task.
    pub fn from_socket(socket: UdpSocket, remote: SocketAddr) -> XPlaneResult<Self> {
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let counters = Arc::new(Counters::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(drain_outbound(Arc::clone(&socket), remote, rx, Arc::clone(&counters)));

        Ok(Self {
            socket,
            remote,
            local_addr,
            outbound: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            shutdown: Notify::new(),
            counters,
        })
    }

    /// Returns the local address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the simulator endpoint.
    #[must_use]
    pub const fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Queues `packet` for the simulator. Never blocks, never fails.
    pub fn send(&self, packet: Vec<u8>) {
        let queued = self.outbound.lock().as_ref().map(|tx| tx.send(packet).is_ok());
        if queued != Some(true) {
            tracing::debug!("Send dropped, transport is shut down");
        }
    }

    /// Waits for one datagram, failing with `Timeout` after `deadline`.
    ///
    /// Fails with `Closed` if `shutdown` is requested while waiting.
    pub async fn receive_once(&self, buffer: &mut [u8], deadline: Duration) -> XPlaneResult<usize> {
        let result = tokio::select! {
            received = recv_bounded(&self.socket, buffer, deadline) => received.map(|(len, _)| len),
            () = self.shutdown.notified() => Err(XPlaneError::Closed),
        };

        match &result {
            Ok(len) => {
                self.counters.packets_received.fetch_add(1, Ordering::Relaxed);
                self.counters.bytes_received.fetch_add(*len as u64, Ordering::Relaxed);
            }
            Err(XPlaneError::Timeout) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
        result
    }

    /// Cancels the pending (or next) receive.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Closes the send queue and waits for every queued packet to go out.
    pub async fn flush(&self) {
        drop(self.outbound.lock().take());
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                tracing::warn!("Writer task failed: {e}");
            }
        }
    }

    /// Returns statistics.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        let c = &self.counters;
        TransportStats {
            packets_sent: c.packets_sent.load(Ordering::Relaxed),
            packets_received: c.packets_received.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            bytes_received: c.bytes_received.load(Ordering::Relaxed),
            send_errors: c.send_errors.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// The single writer: sends queued packets in order until the queue closes.
async fn drain_outbound(
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    counters: Arc<Counters>,
) {
    while let Some(packet) = rx.recv().await {
        match socket.send_to(&packet, remote).await {
            Ok(n) => {
                counters.packets_sent.fetch_add(1, Ordering::Relaxed);
                counters.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
            }
            Err(e) => {
                counters.send_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Send to {remote} failed: {e}");
            }
        }
    }
}
