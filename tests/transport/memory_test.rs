// Memory Transport Tests
// Tests for the in-process datagram network

use p2pledger::transport::{MemoryNetwork, Transport, TransportError, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

// ============================================================================
// DELIVERY
// ============================================================================

#[tokio::test]
async fn test_send_and_receive() {
    let network = MemoryNetwork::new();
    let a = network.bind(addr(9001)).unwrap();
    let b = network.bind(addr(9002)).unwrap();

    let sent = a.send_to(addr(9002), b"CHECK_LAST_HASH").await.unwrap();
    assert_eq!(sent, 15);

    let (data, from) = b.recv_from().await.unwrap();
    assert_eq!(data, b"CHECK_LAST_HASH");
    assert_eq!(from, addr(9001));
}

#[tokio::test]
async fn test_broadcast_counts_deliveries() {
    let network = MemoryNetwork::new();
    let a = network.bind(addr(9001)).unwrap();
    let _b = network.bind(addr(9002)).unwrap();
    let _c = network.bind(addr(9003)).unwrap();

    let targets = [addr(9002), addr(9003), addr(9004)];
    let delivered = a.broadcast(&targets, b"REQUEST_CHAIN").await;

    assert_eq!(delivered, 2);
    assert_eq!(a.stats().send_errors, 1);
}

#[tokio::test]
async fn test_stats_track_traffic() {
    let network = MemoryNetwork::new();
    let a = network.bind(addr(9001)).unwrap();
    let b = network.bind(addr(9002)).unwrap();

    a.send_to(addr(9002), b"abc").await.unwrap();
    b.recv_from().await.unwrap();

    assert_eq!(a.stats().datagrams_sent, 1);
    assert_eq!(a.stats().bytes_sent, 3);
    assert_eq!(b.stats().datagrams_received, 1);
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn test_unknown_target_unreachable() {
    let network = MemoryNetwork::new();
    let a = network.bind(addr(9001)).unwrap();

    let result = a.send_to(addr(9999), b"x").await;
    assert!(matches!(result, Err(TransportError::PeerUnreachable(_))));
}

#[tokio::test]
async fn test_oversized_payload_rejected() {
    let network = MemoryNetwork::new();
    let a = network.bind(addr(9001)).unwrap();
    let _b = network.bind(addr(9002)).unwrap();

    let payload = vec![b'x'; MAX_DATAGRAM_SIZE + 1];
    let result = a.send_to(addr(9002), &payload).await;
    assert!(matches!(result, Err(TransportError::PayloadTooLarge(_))));
}

#[tokio::test]
async fn test_isolated_endpoint_drops_silently() {
    let network = MemoryNetwork::new();
    let a = network.bind(addr(9001)).unwrap();
    let b = network.bind(addr(9002)).unwrap();

    network.isolate(addr(9002));
    assert!(a.send_to(addr(9002), b"lost").await.is_ok());

    let nothing = tokio::time::timeout(Duration::from_millis(50), b.recv_from()).await;
    assert!(nothing.is_err());

    network.reconnect(addr(9002));
    a.send_to(addr(9002), b"found").await.unwrap();
    let (data, _) = b.recv_from().await.unwrap();
    assert_eq!(data, b"found");
}

#[test]
fn test_error_classification() {
    assert!(TransportError::PeerUnreachable(addr(1)).is_send_error());
    assert!(TransportError::PayloadTooLarge(70_000).is_send_error());
    assert!(!TransportError::Closed.is_send_error());
    assert!(TransportError::Closed.is_fatal());
    assert!(!TransportError::SendFailed("x".into()).is_fatal());
}
