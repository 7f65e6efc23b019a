// Peer Set - The fixed group of replicas a node talks to
//
// Built once from configuration and never changed. The node's own address is
// filtered out so broadcasts never target ourselves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;

/// Immutable set of peer addresses, disjoint from the local address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSet {
    local: SocketAddr,
    peers: BTreeSet<SocketAddr>,
}

impl PeerSet {
    /// Create a peer set, dropping `local` and duplicates from `peers`
    pub fn new(local: SocketAddr, peers: impl IntoIterator<Item = SocketAddr>) -> Self {
        let peers = peers.into_iter().filter(|p| *p != local).collect();
        Self { local, peers }
    }

    /// The local node's own address
    pub fn local(&self) -> SocketAddr {
        self.local
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains(addr)
    }

    /// Whether a datagram from `addr` is our own broadcast echoed back
    pub fn is_self(&self, addr: &SocketAddr) -> bool {
        *addr == self.local
    }

    /// Peers in address order
    pub fn iter(&self) -> impl Iterator<Item = &SocketAddr> {
        self.peers.iter()
    }

    /// Number of participants in a full round (peers plus ourselves)
    pub fn participant_count(&self) -> usize {
        self.peers.len() + 1
    }
}
