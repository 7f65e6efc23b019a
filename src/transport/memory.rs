// In-memory Transport
//
// Routes datagrams between endpoints of a shared MemoryNetwork through tokio
// channels. Used by tests and single-process simulations. An endpoint can be
// isolated to simulate a peer that drops every datagram.

use crate::transport::traits::{
    StatsCounter, Transport, TransportError, TransportStats, MAX_DATAGRAM_SIZE,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Datagram = (Vec<u8>, SocketAddr);

#[derive(Default)]
struct NetworkInner {
    endpoints: HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>,
    isolated: HashSet<SocketAddr>,
}

/// A shared in-process "network" that endpoints bind to
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint at `address`
    pub fn bind(&self, address: SocketAddr) -> Result<MemoryTransport, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.lock();
        if inner.endpoints.contains_key(&address) {
            return Err(TransportError::Bind(format!("{} already in use", address)));
        }
        inner.endpoints.insert(address, tx);

        Ok(MemoryTransport {
            address,
            network: self.clone(),
            rx: tokio::sync::Mutex::new(rx),
            stats: StatsCounter::default(),
        })
    }

    /// Drop every datagram sent to or from `address`
    pub fn isolate(&self, address: SocketAddr) {
        self.lock().isolated.insert(address);
    }

    /// Undo `isolate`
    pub fn reconnect(&self, address: SocketAddr) {
        self.lock().isolated.remove(&address);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkInner> {
        // A poisoned lock only means a test thread panicked mid-send
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn route(&self, from: SocketAddr, to: SocketAddr, data: &[u8]) -> Result<(), TransportError> {
        let inner = self.lock();
        let endpoint = inner
            .endpoints
            .get(&to)
            .ok_or(TransportError::PeerUnreachable(to))?;

        if inner.isolated.contains(&from) || inner.isolated.contains(&to) {
            tracing::trace!(%from, %to, "Datagram dropped by isolation");
            return Ok(());
        }

        endpoint
            .send((data.to_vec(), from))
            .map_err(|_| TransportError::PeerUnreachable(to))
    }

    fn unbind(&self, address: &SocketAddr) {
        self.lock().endpoints.remove(address);
    }
}

/// One endpoint of a MemoryNetwork
pub struct MemoryTransport {
    address: SocketAddr,
    network: MemoryNetwork,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    stats: StatsCounter,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_to(&self, target: SocketAddr, data: &[u8]) -> Result<usize, TransportError> {
        if data.len() > MAX_DATAGRAM_SIZE {
            self.stats.record_send_error();
            return Err(TransportError::PayloadTooLarge(data.len()));
        }

        match self.network.route(self.address, target, data) {
            Ok(()) => {
                self.stats.record_sent(data.len());
                Ok(data.len())
            }
            Err(e) => {
                self.stats.record_send_error();
                Err(e)
            }
        }
    }

    async fn recv_from(&self) -> Result<Datagram, TransportError> {
        let mut rx = self.rx.lock().await;
        let (data, from) = rx.recv().await.ok_or(TransportError::Closed)?;
        self.stats.record_received(data.len());
        Ok((data, from))
    }

    fn local_address(&self) -> SocketAddr {
        self.address
    }

    fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.network.unbind(&self.address);
    }
}
