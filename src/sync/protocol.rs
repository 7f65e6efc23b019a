// Protocol - Message types exchanged between ledger nodes
//
// Wire format is UTF-8 text: a tag, then the payload. Block indices are 1-based.
//   CHECK_LAST_HASH
//   LAST_HASH:<hex>
//   REQUEST_CHAIN
//   CHAIN:<index>\n<content>
//   TRANSACTION_BROADCAST: <tx>
//   REWARD_BROADCAST: <tx>
//   CHECK_ALL_REQUEST:<requester>
//   CHECK_ALL_RESULT:<origin>\n<json array of block contents>
//   SYNC_BLOCK:<index>\n<content>

use std::fmt;
use thiserror::Error;

mod tags {
    pub const CHECK_LAST_HASH: &str = "CHECK_LAST_HASH";
    pub const LAST_HASH: &str = "LAST_HASH:";
    pub const REQUEST_CHAIN: &str = "REQUEST_CHAIN";
    pub const CHAIN: &str = "CHAIN:";
    pub const TRANSACTION_BROADCAST: &str = "TRANSACTION_BROADCAST: ";
    pub const REWARD_BROADCAST: &str = "REWARD_BROADCAST: ";
    pub const CHECK_ALL_REQUEST: &str = "CHECK_ALL_REQUEST:";
    pub const CHECK_ALL_RESULT: &str = "CHECK_ALL_RESULT:";
    pub const SYNC_BLOCK: &str = "SYNC_BLOCK:";
}

/// Protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Datagram is not valid UTF-8")]
    InvalidUtf8,

    #[error("Unknown message: {0:?}")]
    UnknownTag(String),

    #[error("Missing payload for {0}")]
    MissingPayload(&'static str),

    #[error("Invalid block index: {0:?}")]
    InvalidIndex(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Types of messages in the protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    CheckLastHash,
    LastHash,
    RequestChain,
    Chain,
    TransactionBroadcast,
    RewardBroadcast,
    CheckAllRequest,
    CheckAllResult,
    SyncBlock,
}

/// Every message a node can send or receive
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Ask a peer for the hash of its last block
    CheckLastHash,
    /// Reply to `CheckLastHash`
    LastHash(String),
    /// Ask a peer to stream its whole chain back as `Chain` messages
    RequestChain,
    /// Verbatim content of one block file
    Chain { index: usize, content: String },
    /// A transaction accepted by the sender
    TransactionBroadcast(String),
    /// A reward minted by the sender
    RewardBroadcast(String),
    /// Open a reconciliation round on behalf of `requester`
    CheckAllRequest { requester: String },
    /// A participant's full block contents for a reconciliation round
    CheckAllResult { origin: String, blocks: Vec<String> },
    /// Majority-resolved content for one block
    SyncBlock { index: usize, content: String },
}

impl Message {
    /// Get the message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::CheckLastHash => MessageType::CheckLastHash,
            Message::LastHash(_) => MessageType::LastHash,
            Message::RequestChain => MessageType::RequestChain,
            Message::Chain { .. } => MessageType::Chain,
            Message::TransactionBroadcast(_) => MessageType::TransactionBroadcast,
            Message::RewardBroadcast(_) => MessageType::RewardBroadcast,
            Message::CheckAllRequest { .. } => MessageType::CheckAllRequest,
            Message::CheckAllResult { .. } => MessageType::CheckAllResult,
            Message::SyncBlock { .. } => MessageType::SyncBlock,
        }
    }

    /// Whether handling this message mutates the receiver's ledger
    pub fn mutates_ledger(&self) -> bool {
        matches!(
            self,
            Message::Chain { .. }
                | Message::TransactionBroadcast(_)
                | Message::RewardBroadcast(_)
                | Message::SyncBlock { .. }
        )
    }

    /// Encode to the textual wire format
    pub fn encode(&self) -> String {
        match self {
            Message::CheckLastHash => tags::CHECK_LAST_HASH.to_string(),
            Message::LastHash(hash) => format!("{}{}", tags::LAST_HASH, hash),
            Message::RequestChain => tags::REQUEST_CHAIN.to_string(),
            Message::Chain { index, content } => format!("{}{}\n{}", tags::CHAIN, index, content),
            Message::TransactionBroadcast(tx) => format!("{}{}", tags::TRANSACTION_BROADCAST, tx),
            Message::RewardBroadcast(tx) => format!("{}{}", tags::REWARD_BROADCAST, tx),
            Message::CheckAllRequest { requester } => {
                format!("{}{}", tags::CHECK_ALL_REQUEST, requester)
            }
            Message::CheckAllResult { origin, blocks } => {
                // Vec<String> always serializes
                let body = serde_json::to_string(blocks).unwrap_or_else(|_| "[]".to_string());
                format!("{}{}\n{}", tags::CHECK_ALL_RESULT, origin, body)
            }
            Message::SyncBlock { index, content } => {
                format!("{}{}\n{}", tags::SYNC_BLOCK, index, content)
            }
        }
    }

    /// Encode to bytes for the transport
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    /// Decode a raw datagram
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::decode(text)
    }

    /// Decode the textual wire format
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.trim_end() == tags::CHECK_LAST_HASH {
            return Ok(Message::CheckLastHash);
        }
        if text.trim_end() == tags::REQUEST_CHAIN {
            return Ok(Message::RequestChain);
        }
        if let Some(hash) = text.strip_prefix(tags::LAST_HASH) {
            return Ok(Message::LastHash(hash.trim().to_string()));
        }
        if let Some(rest) = text.strip_prefix(tags::TRANSACTION_BROADCAST) {
            let tx = non_empty(rest.trim(), "TRANSACTION_BROADCAST")?;
            return Ok(Message::TransactionBroadcast(tx));
        }
        if let Some(rest) = text.strip_prefix(tags::REWARD_BROADCAST) {
            let tx = non_empty(rest.trim(), "REWARD_BROADCAST")?;
            return Ok(Message::RewardBroadcast(tx));
        }
        if let Some(rest) = text.strip_prefix(tags::CHECK_ALL_REQUEST) {
            let requester = non_empty(rest.trim(), "CHECK_ALL_REQUEST")?;
            return Ok(Message::CheckAllRequest { requester });
        }
        if let Some(rest) = text.strip_prefix(tags::CHECK_ALL_RESULT) {
            let (origin, body) = split_header(rest, "CHECK_ALL_RESULT")?;
            let origin = non_empty(origin.trim(), "CHECK_ALL_RESULT")?;
            let blocks: Vec<String> = serde_json::from_str(body)
                .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
            return Ok(Message::CheckAllResult { origin, blocks });
        }
        if let Some(rest) = text.strip_prefix(tags::CHAIN) {
            let (index, content) = split_header(rest, "CHAIN")?;
            return Ok(Message::Chain {
                index: parse_index(index)?,
                content: content.to_string(),
            });
        }
        if let Some(rest) = text.strip_prefix(tags::SYNC_BLOCK) {
            let (index, content) = split_header(rest, "SYNC_BLOCK")?;
            return Ok(Message::SyncBlock {
                index: parse_index(index)?,
                content: content.to_string(),
            });
        }

        let preview: String = text.chars().take(40).collect();
        Err(ProtocolError::UnknownTag(preview))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::CheckLastHash => "CHECK_LAST_HASH",
            MessageType::LastHash => "LAST_HASH",
            MessageType::RequestChain => "REQUEST_CHAIN",
            MessageType::Chain => "CHAIN",
            MessageType::TransactionBroadcast => "TRANSACTION_BROADCAST",
            MessageType::RewardBroadcast => "REWARD_BROADCAST",
            MessageType::CheckAllRequest => "CHECK_ALL_REQUEST",
            MessageType::CheckAllResult => "CHECK_ALL_RESULT",
            MessageType::SyncBlock => "SYNC_BLOCK",
        };
        f.write_str(name)
    }
}

fn non_empty(value: &str, tag: &'static str) -> Result<String, ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::MissingPayload(tag));
    }
    Ok(value.to_string())
}

/// Split `<header>\n<body>`
fn split_header<'a>(rest: &'a str, tag: &'static str) -> Result<(&'a str, &'a str), ProtocolError> {
    rest.split_once('\n').ok_or(ProtocolError::MissingPayload(tag))
}

/// Accepts `3` as well as `3.txt`
fn parse_index(raw: &str) -> Result<usize, ProtocolError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".txt").unwrap_or(trimmed);
    match digits.parse::<usize>() {
        Ok(index) if index > 0 => Ok(index),
        _ => Err(ProtocolError::InvalidIndex(raw.to_string())),
    }
}
