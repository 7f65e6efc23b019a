// UDP Transport Tests
// Tests for the tokio UDP socket transport on loopback

use p2pledger::transport::{Transport, TransportError, UdpTransport, UdpTransportConfig};
use std::time::Duration;

async fn loopback() -> UdpTransport {
    let config = UdpTransportConfig::new()
        .with_bind_address("127.0.0.1")
        .with_bind_port(0);
    UdpTransport::bind(config).await.unwrap()
}

#[tokio::test]
async fn test_bind_ephemeral_port() {
    let transport = loopback().await;
    assert_ne!(transport.local_address().port(), 0);
}

#[tokio::test]
async fn test_datagram_round_trip() {
    let a = loopback().await;
    let b = loopback().await;

    a.send_to(b.local_address(), b"LAST_HASH:abcd").await.unwrap();
    let (data, from) = tokio::time::timeout(Duration::from_secs(2), b.recv_from())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(data, b"LAST_HASH:abcd");
    assert_eq!(from, a.local_address());
    assert_eq!(b.stats().datagrams_received, 1);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = UdpTransportConfig::new().with_buffer_size(0);
    let result = UdpTransport::bind(config).await;
    assert!(matches!(result, Err(TransportError::InvalidConfig(_))));
}
