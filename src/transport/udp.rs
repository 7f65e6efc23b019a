// UDP Transport Implementation
// Datagram transport over tokio's UdpSocket

use crate::transport::traits::{
    StatsCounter, Transport, TransportError, TransportStats, MAX_DATAGRAM_SIZE,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

// ============================================================================
// UDP TRANSPORT CONFIG
// ============================================================================

/// Configuration for UDP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpTransportConfig {
    /// Address to bind to
    pub bind_address: String,
    /// Port to bind to (0 for random)
    pub bind_port: u16,
    /// Receive buffer size; datagrams larger than this are truncated by the OS
    pub buffer_size: usize,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 8001,
            buffer_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl UdpTransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_address(mut self, addr: &str) -> Self {
        self.bind_address = addr.to_string();
        self
    }

    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.buffer_size == 0 || self.buffer_size > MAX_DATAGRAM_SIZE {
            return Err(TransportError::InvalidConfig(format!(
                "buffer_size must be in 1..={}",
                MAX_DATAGRAM_SIZE
            )));
        }
        Ok(())
    }
}

// ============================================================================
// UDP TRANSPORT
// ============================================================================

/// UDP transport implementation
pub struct UdpTransport {
    socket: UdpSocket,
    local_address: SocketAddr,
    buffer_size: usize,
    stats: StatsCounter,
}

impl UdpTransport {
    /// Bind a socket according to `config`
    pub async fn bind(config: UdpTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        let bind_addr = format!("{}:{}", config.bind_address, config.bind_port);
        let socket = UdpSocket::bind(&bind_addr)
            .await
            .map_err(|e| TransportError::Bind(format!("{}: {}", bind_addr, e)))?;

        let local_address = socket
            .local_addr()
            .map_err(|e| TransportError::Bind(e.to_string()))?;

        tracing::info!(address = %local_address, "UDP transport bound");

        Ok(Self {
            socket,
            local_address,
            buffer_size: config.buffer_size,
            stats: StatsCounter::default(),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, target: SocketAddr, data: &[u8]) -> Result<usize, TransportError> {
        if data.len() > MAX_DATAGRAM_SIZE {
            self.stats.record_send_error();
            return Err(TransportError::PayloadTooLarge(data.len()));
        }

        match self.socket.send_to(data, target).await {
            Ok(n) => {
                self.stats.record_sent(n);
                Ok(n)
            }
            Err(e) => {
                self.stats.record_send_error();
                Err(TransportError::SendFailed(format!("{}: {}", target, e)))
            }
        }
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; self.buffer_size];
        let (n, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

        buf.truncate(n);
        self.stats.record_received(n);
        Ok((buf, from))
    }

    fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }
}
