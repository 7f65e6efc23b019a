// Transport Traits and Core Types
// Defines the datagram Transport trait and types shared by its implementations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

// ============================================================================
// TRANSPORT ERRORS
// ============================================================================

/// Errors that can occur in the transport layer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Bind failed: {0}")]
    Bind(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(SocketAddr),

    #[error("Transport closed")]
    Closed,

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// Check if this is a send-related error
    pub fn is_send_error(&self) -> bool {
        matches!(
            self,
            Self::SendFailed(_) | Self::PeerUnreachable(_) | Self::PayloadTooLarge(_)
        )
    }

    /// Check if the transport can no longer receive
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::Bind(_))
    }
}

// ============================================================================
// TRANSPORT STATISTICS
// ============================================================================

/// Snapshot of transport counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
}

/// Lock-free counters behind `TransportStats`
#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    datagrams_sent: AtomicU64,
    datagrams_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TransportStats {
        TransportStats {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// TRANSPORT TRAIT
// ============================================================================

/// Unreliable, unordered datagram transport
///
/// Sends are fire-and-forget: success means the datagram left this node, not
/// that anyone received it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram to `target`
    async fn send_to(&self, target: SocketAddr, data: &[u8]) -> Result<usize, TransportError>;

    /// Wait for the next datagram and its source address
    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError>;

    /// Address this transport receives on
    fn local_address(&self) -> SocketAddr;

    /// Get transport statistics
    fn stats(&self) -> TransportStats;

    /// Send the same datagram to every target, returning how many sends succeeded
    async fn broadcast(&self, targets: &[SocketAddr], data: &[u8]) -> u32 {
        let mut count = 0u32;
        for target in targets {
            match self.send_to(*target, data).await {
                Ok(_) => count += 1,
                Err(e) => tracing::debug!(peer = %target, error = %e, "Broadcast send failed"),
            }
        }
        count
    }
}
