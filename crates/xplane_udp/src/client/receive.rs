//! # Receive Loop
//!
//! Background task feeding the latest-value cache.
//!
//! Each iteration waits for one datagram with a fixed deadline. Silence is
//! expected (nothing subscribed, simulator paused) and only flips the
//! "receiving" flag; it never ends the loop. The loop ends when the running
//! flag is cleared and the transport wakes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::LatestValueCache;
use crate::error::{XPlaneError, XPlaneResult};
use crate::protocol::{decode_updates, Command, PlaneInfo, HEADER_LEN};
use crate::transport::BoundedUdpTransport;
use crate::MAX_DATAGRAM_SIZE;

/// Routes one datagram into `cache`.
///
/// Returns the command that was applied, `None` for ignored traffic
/// (too short, unknown tag, or a tag the client only sends).
/// A malformed payload is an error and nothing of it is applied.
pub fn dispatch(cache: &LatestValueCache, datagram: &[u8]) -> XPlaneResult<Option<Command>> {
    let Some(command) = Command::classify(datagram) else {
        return Ok(None);
    };
    let payload = &datagram[HEADER_LEN..];

    match command {
        Command::Rref => cache.store_all(&decode_updates(payload)?),
        Command::Rpos => cache.store_info(PlaneInfo::decode(payload)?),
        Command::Dref | Command::Becn => return Ok(None),
    }
    Ok(Some(command))
}

/// The background receive task.
pub struct ReceiveLoop {
    transport: Arc<BoundedUdpTransport>,
    cache: Arc<LatestValueCache>,
    running: Arc<AtomicBool>,
    receiving: Arc<AtomicBool>,
    deadline: Duration,
}

impl ReceiveLoop {
    /// Creates a loop over `transport` writing into `cache`.
    #[must_use]
    pub fn new(
        transport: Arc<BoundedUdpTransport>,
        cache: Arc<LatestValueCache>,
        running: Arc<AtomicBool>,
        receiving: Arc<AtomicBool>,
        deadline: Duration,
    ) -> Self {
        Self { transport, cache, running, receiving, deadline }
    }

    /// Runs until the running flag is cleared.
    pub async fn run(self) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        while self.running.load(Ordering::Acquire) {
            match self.transport.receive_once(&mut buffer, self.deadline).await {
                Ok(len) => {
                    self.receiving.store(true, Ordering::Release);
                    match dispatch(&self.cache, &buffer[..len]) {
                        Ok(Some(command)) => tracing::trace!("Applied {command:?} datagram, {len} bytes"),
                        Ok(None) => tracing::trace!("Ignored datagram, {len} bytes"),
                        Err(e) => tracing::warn!("Dropped malformed datagram: {e}"),
                    }
                }
                Err(XPlaneError::Timeout) => {
                    self.receiving.store(false, Ordering::Release);
                    tracing::debug!("X-Plane timeout, no data for {:?}", self.deadline);
                }
                Err(XPlaneError::Closed) => break,
                Err(e) => {
                    self.receiving.store(false, Ordering::Release);
                    tracing::warn!("Receive failed: {e}");
                }
            }
        }
        tracing::debug!("Receive loop stopped");
    }
}
