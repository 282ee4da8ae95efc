//! # XPlane Client
//!
//! Synchronous facade over discovery, the subscription registry, the
//! transport and the receive loop.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──▶ discover ──▶ bind ──▶ keep-alive subscribe ──▶ receive loop
//!                                                              │
//! close() ◀── stop every subscription ◀── join loop ◀──────────┘
//! ```
//!
//! ## Threading
//!
//! The client owns a private tokio runtime with one worker. Every public
//! method is synchronous and may be called from any thread. Locks are only
//! held for map access, never while a packet is in flight.
//! Construct the client outside of any async context; from inside one the
//! constructors fail with `AsyncContext`. `close` from inside one skips the
//! blocking join and flush.

mod receive;

pub use receive::{dispatch, ReceiveLoop};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::cache::LatestValueCache;
use crate::config::ClientConfig;
use crate::error::{XPlaneError, XPlaneResult};
use crate::protocol::{basic_info_packet, set_packet, subscribe_packet, BeaconInfo, PlaneInfo};
use crate::registry::{wire_name, ArrayBlock, ArrayTable, SubscriptionRegistry};
use crate::transport::{discover, BoundedUdpTransport, TransportStats};

/// Client for one simulator instance.
pub struct XPlaneClient {
    /// Client configuration.
    config: ClientConfig,
    /// Private runtime. Taken on drop.
    runtime: Option<Runtime>,
    /// Handle of `runtime`.
    handle: Handle,
    /// Socket to the simulator.
    transport: Arc<BoundedUdpTransport>,
    /// Wire id <-> name.
    registry: SubscriptionRegistry,
    /// Declared array lengths.
    arrays: ArrayTable,
    /// Serializes array (re)declarations.
    array_updates: Mutex<()>,
    /// Latest samples.
    cache: Arc<LatestValueCache>,
    /// Receive loop keeps going while set.
    running: Arc<AtomicBool>,
    /// Cleared while the simulator is silent.
    receiving: Arc<AtomicBool>,
    /// Receive loop task.
    receiver: Mutex<Option<JoinHandle<()>>>,
    /// Set once `close` has run.
    closed: AtomicBool,
    /// Beacon the endpoint was discovered from.
    beacon: Option<BeaconInfo>,
}

impl XPlaneClient {
    /// Discovers the simulator on the network and starts receiving.
    ///
    /// Fails with `EndpointNotFound` or `VersionNotSupported`; there is no partial client.
    /// Fails with `AsyncContext` when called from inside a tokio runtime.
    pub fn new(config: ClientConfig) -> XPlaneResult<Self> {
        let runtime = build_runtime()?;
        let found = runtime.block_on(discover(&config))?;
        Self::start(runtime, found.endpoint, Some(found.beacon), config)
    }

    /// Talks to a simulator at a known address, skipping discovery.
    ///
    /// Fails with `AsyncContext` when called from inside a tokio runtime.
    pub fn connect(remote: SocketAddr, config: ClientConfig) -> XPlaneResult<Self> {
        let runtime = build_runtime()?;
        Self::start(runtime, remote, None, config)
    }

    fn start(
        runtime: Runtime,
        remote: SocketAddr,
        beacon: Option<BeaconInfo>,
        config: ClientConfig,
    ) -> XPlaneResult<Self> {
        let handle = runtime.handle().clone();
        let transport = Arc::new(runtime.block_on(BoundedUdpTransport::bind(config.bind_address, remote))?);

        let client = Self {
            runtime: Some(runtime),
            handle,
            transport,
            registry: SubscriptionRegistry::new(),
            arrays: ArrayTable::new(),
            array_updates: Mutex::new(()),
            cache: Arc::new(LatestValueCache::new()),
            running: Arc::new(AtomicBool::new(true)),
            receiving: Arc::new(AtomicBool::new(false)),
            receiver: Mutex::new(None),
            closed: AtomicBool::new(false),
            beacon,
            config,
        };

        // Keep the stream alive even before the caller subscribes anything
        match client.config.keepalive_dataref.clone().filter(|n| !n.is_empty()) {
            Some(name) => client.add_dataref(&name, 1, None),
            None => tracing::debug!("No keep-alive dataref, registry starts empty"),
        }

        let receive_loop = ReceiveLoop::new(
            Arc::clone(&client.transport),
            Arc::clone(&client.cache),
            Arc::clone(&client.running),
            Arc::clone(&client.receiving),
            client.config.receive_timeout(),
        );
        *client.receiver.lock() = Some(client.handle.spawn(receive_loop.run()));

        tracing::info!(
            "X-Plane client started: local {}, remote {}",
            client.transport.local_addr(),
            remote
        );
        Ok(client)
    }

    /// Subscribes to `name` (or `name[index]`) at `freq` Hz.
    ///
    /// A name already subscribed keeps its id and only changes rate.
    /// `freq == 0` stops the subscription, unless it is the last one.
    pub fn add_dataref(&self, name: &str, freq: i32, index: Option<usize>) {
        let name = wire_name(name, index);

        if freq == 0 {
            match self.registry.remove(&name) {
                Some(id) => self.send_subscribe(0, id, &name),
                None => tracing::debug!("Not stopping {name}: unknown or last subscription"),
            }
            return;
        }

        let (id, _) = self.registry.id_or_allocate(&name);
        self.send_subscribe(freq, id, &name);
    }

    /// Writes `value` into `name` (or `name[index]`).
    pub fn set_dataref(&self, name: &str, value: f32, index: Option<usize>) {
        let name = wire_name(name, index);
        match set_packet(value, &name, self.config.set_name_width) {
            Ok(packet) => {
                tracing::debug!("Set {name} = {value}");
                self.transport.send(packet);
            }
            Err(e) => tracing::warn!("Cannot build set packet for {name}: {e}"),
        }
    }

    /// Subscribes to the first `length` elements of an array dataref.
    ///
    /// The base name takes one id and the elements the `length` ids right after it.
    /// Re-declaring with another length retires every old element first; the
    /// new block is only visible to readers once it is fully allocated.
    /// `freq == 0` retires the whole array.
    pub fn add_dataref_array(&self, name: &str, length: usize, freq: i32) {
        let mut packets = Vec::new();
        {
            let _guard = self.array_updates.lock();

            if freq == 0 {
                if let Some(old) = self.arrays.remove(name) {
                    self.retire_elements(name, old.length, &mut packets);
                    self.registry.remove(name);
                }
            } else {
                let elements = element_names(name, length);
                match self.arrays.block(name) {
                    // Same shape, ids still in place: only the rate changes
                    Some(block) if block.length == length && self.block_intact(name, block, &elements) => {
                        for (id, element) in (block.first_element()..).zip(&elements) {
                            self.push_subscribe(freq, id, element, &mut packets);
                        }
                    }
                    previous => {
                        if let Some(old) = previous {
                            tracing::debug!("Array {name} re-declared: {} -> {length} elements", old.length);
                            self.arrays.remove(name);
                            self.retire_elements(name, old.length, &mut packets);
                        }
                        let base = self.registry.allocate_block(name, &elements);
                        for (id, element) in (base + 1..).zip(&elements) {
                            self.push_subscribe(freq, id, element, &mut packets);
                        }
                        self.arrays.publish(name, ArrayBlock { base, length });
                    }
                }
            }
        }

        for packet in packets {
            self.transport.send(packet);
        }
    }

    /// Writes `values` into `name[0]`, `name[1]`, ...
    pub fn set_dataref_array(&self, name: &str, values: &[f32]) {
        for (index, value) in values.iter().enumerate() {
            self.set_dataref(name, *value, Some(index));
        }
    }

    /// Latest values of a subscribed array.
    ///
    /// `None` until every element has received at least one sample.
    #[must_use]
    pub fn get_dataref_array(&self, name: &str) -> Option<Vec<f32>> {
        let block = self.arrays.block(name)?;
        self.cache.range(block.first_element(), block.length)
    }

    /// Latest values of the array whose base name has wire id `id`.
    #[must_use]
    pub fn get_dataref_array_by_id(&self, id: i32) -> Option<Vec<f32>> {
        let name = self.registry.name_for(id)?;
        let block = self.arrays.block(&name).filter(|block| block.base == id)?;
        self.cache.range(block.first_element(), block.length)
    }

    /// Latest value of `name` (or `name[index]`).
    #[must_use]
    pub fn get_dataref(&self, name: &str, index: Option<usize>) -> Option<f32> {
        self.dataref_id(name, index).and_then(|id| self.cache.value(id))
    }

    /// Latest value of wire id `id`.
    #[must_use]
    pub fn get_dataref_by_id(&self, id: i32) -> Option<f32> {
        self.cache.value(id)
    }

    /// Wire id of `name` (or `name[index]`).
    #[must_use]
    pub fn dataref_id(&self, name: &str, index: Option<usize>) -> Option<i32> {
        self.registry.id_for(&wire_name(name, index))
    }

    /// Requests basic info at `freq` Hz; 0 stops it.
    pub fn add_basic_info(&self, freq: i32) {
        match basic_info_packet(freq) {
            Ok(packet) => self.transport.send(packet),
            Err(e) => tracing::warn!("Cannot build basic info request: {e}"),
        }
    }

    /// Latest basic info, `None` before the first reply.
    #[must_use]
    pub fn get_basic_info(&self) -> Option<PlaneInfo> {
        self.cache.info()
    }

    /// False while the simulator is silent (last receive hit its deadline).
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::Acquire)
    }

    /// Every registered `(id, name)`, in id order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<(i32, String)> {
        self.registry.entries()
    }

    /// Simulator endpoint.
    #[must_use]
    pub fn remote_endpoint(&self) -> SocketAddr {
        self.transport.remote()
    }

    /// Local address of the client socket.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Beacon the endpoint was discovered from; `None` for `connect`.
    #[must_use]
    pub const fn beacon(&self) -> Option<&BeaconInfo> {
        self.beacon.as_ref()
    }

    /// Returns transport statistics.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Stops the receive loop and tells the simulator to stop sending.
    ///
    /// Idempotent. Failures during the unwind are ignored: the socket is
    /// going away anyway.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.running.store(false, Ordering::Release);
        self.transport.shutdown();

        let blocking_allowed = Handle::try_current().is_err();
        let receiver = self.receiver.lock().take();
        if let (Some(receiver), true) = (receiver, blocking_allowed) {
            if let Err(e) = self.handle.block_on(receiver) {
                tracing::warn!("Receive loop failed: {e}");
            }
        }

        self.add_basic_info(0);
        self.send_subscribe(0, self.registry.next_id(), &self.config.close_marker_dataref);
        for (id, name) in self.registry.entries() {
            self.send_subscribe(0, id, &name);
        }

        if blocking_allowed {
            self.handle.block_on(self.transport.flush());
        }
        tracing::info!("X-Plane client closed");
    }

    fn block_intact(&self, name: &str, block: ArrayBlock, elements: &[String]) -> bool {
        self.registry.id_for(name) == Some(block.base)
            && (block.first_element()..).zip(elements).all(|(id, e)| self.registry.id_for(e) == Some(id))
    }

    fn retire_elements(&self, name: &str, length: usize, packets: &mut Vec<Vec<u8>>) {
        for element in element_names(name, length) {
            if let Some(id) = self.registry.remove(&element) {
                self.push_subscribe(0, id, &element, packets);
            }
        }
    }

    fn push_subscribe(&self, freq: i32, id: i32, name: &str, packets: &mut Vec<Vec<u8>>) {
        match subscribe_packet(freq, id, name, self.config.subscribe_name_width) {
            Ok(packet) => {
                tracing::debug!("Subscribe {name} as {id} at {freq} Hz");
                packets.push(packet);
            }
            Err(e) => tracing::warn!("Cannot build subscribe packet for {name}: {e}"),
        }
    }

    fn send_subscribe(&self, freq: i32, id: i32, name: &str) {
        let mut packets = Vec::with_capacity(1);
        self.push_subscribe(freq, id, name, &mut packets);
        for packet in packets {
            self.transport.send(packet);
        }
    }
}

impl Drop for XPlaneClient {
    fn drop(&mut self) {
        self.close();
        if let Some(runtime) = self.runtime.take() {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                drop(runtime);
            }
        }
    }
}

fn build_runtime() -> XPlaneResult<Runtime> {
    // The private runtime blocks the caller, which panics on a runtime thread
    if Handle::try_current().is_ok() {
        return Err(XPlaneError::AsyncContext);
    }
    Ok(Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("xplane-udp")
        .enable_all()
        .build()?)
}

fn element_names(name: &str, length: usize) -> Vec<String> {
    (0..length).map(|i| wire_name(name, Some(i)).into_owned()).collect()
}
