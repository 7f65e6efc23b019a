// Protocol Tests
// Tests for the textual datagram format

use p2pledger::sync::{Message, MessageType, ProtocolError};

const BLOCK: &str = "Sha256 of previous block: 0000\nNext block: 2.txt\nangel, A, 50\nA, B, 30\n";

// ============================================================================
// ENCODING
// ============================================================================

#[test]
fn test_bare_tags() {
    assert_eq!(Message::CheckLastHash.encode(), "CHECK_LAST_HASH");
    assert_eq!(Message::RequestChain.encode(), "REQUEST_CHAIN");
    assert_eq!(Message::LastHash("ab12".into()).encode(), "LAST_HASH:ab12");
}

#[test]
fn test_reward_broadcast_format() {
    let msg = Message::RewardBroadcast("angel, A, 10".into());
    assert_eq!(msg.encode(), "REWARD_BROADCAST: angel, A, 10");
}

#[test]
fn test_check_all_request_format() {
    let msg = Message::CheckAllRequest { requester: "A".into() };
    assert_eq!(msg.encode(), "CHECK_ALL_REQUEST:A");
}

#[test]
fn test_sync_block_format() {
    let msg = Message::SyncBlock { index: 2, content: BLOCK.into() };
    assert_eq!(msg.encode(), format!("SYNC_BLOCK:2\n{}", BLOCK));
}

// ============================================================================
// DECODING
// ============================================================================

#[test]
fn test_decode_every_kind() {
    let messages = vec![
        Message::CheckLastHash,
        Message::LastHash("f".repeat(64)),
        Message::RequestChain,
        Message::Chain { index: 3, content: BLOCK.into() },
        Message::TransactionBroadcast("A, B, 30".into()),
        Message::RewardBroadcast("angel, B, 100".into()),
        Message::CheckAllRequest { requester: "B".into() },
        Message::CheckAllResult {
            origin: "127.0.0.1:8001".into(),
            blocks: vec![BLOCK.into(), "second\nblock\n".into()],
        },
        Message::SyncBlock { index: 1, content: BLOCK.into() },
    ];

    for msg in messages {
        let decoded = Message::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(decoded.message_type(), msg.message_type());
        assert_eq!(decoded, msg);
    }
}

#[test]
fn test_check_all_result_empty_chain() {
    let msg = Message::decode("CHECK_ALL_RESULT:10.0.0.2:8001\n[]").unwrap();
    assert_eq!(
        msg,
        Message::CheckAllResult { origin: "10.0.0.2:8001".into(), blocks: vec![] }
    );
}

#[test]
fn test_trailing_newline_tolerated() {
    assert_eq!(Message::decode("CHECK_LAST_HASH\n").unwrap(), Message::CheckLastHash);
    assert_eq!(Message::decode("REQUEST_CHAIN\r\n").unwrap(), Message::RequestChain);
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_unknown_tag() {
    let result = Message::decode("HELLO_THERE");
    assert!(matches!(result, Err(ProtocolError::UnknownTag(_))));
}

#[test]
fn test_invalid_utf8() {
    let result = Message::from_bytes(&[0xff, 0xfe, 0x00]);
    assert_eq!(result, Err(ProtocolError::InvalidUtf8));
}

#[test]
fn test_missing_payloads() {
    assert!(matches!(
        Message::decode("TRANSACTION_BROADCAST: "),
        Err(ProtocolError::MissingPayload(_))
    ));
    assert!(matches!(
        Message::decode("SYNC_BLOCK:2"),
        Err(ProtocolError::MissingPayload(_))
    ));
}

#[test]
fn test_bad_indices() {
    assert!(matches!(
        Message::decode("SYNC_BLOCK:0\nx"),
        Err(ProtocolError::InvalidIndex(_))
    ));
    assert!(matches!(
        Message::decode("CHAIN:two\nx"),
        Err(ProtocolError::InvalidIndex(_))
    ));
}

#[test]
fn test_bad_result_body() {
    let result = Message::decode("CHECK_ALL_RESULT:peer\nnot json");
    assert!(matches!(result, Err(ProtocolError::InvalidPayload(_))));
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[test]
fn test_mutating_messages() {
    assert!(Message::TransactionBroadcast("A, B, 1".into()).mutates_ledger());
    assert!(Message::SyncBlock { index: 1, content: String::new() }.mutates_ledger());
    assert!(!Message::CheckLastHash.mutates_ledger());
    assert!(!Message::CheckAllRequest { requester: "A".into() }.mutates_ledger());
}

#[test]
fn test_message_type_names() {
    assert_eq!(MessageType::CheckAllResult.to_string(), "CHECK_ALL_RESULT");
    assert_eq!(Message::RequestChain.message_type(), MessageType::RequestChain);
}
