//! A peer-to-peer hash-linked ledger node.
//!
//! Each node keeps a full replica of a block chain on disk, derives balances
//! by replaying it, gossips new transactions to a fixed peer set over UDP, and
//! repairs divergent replicas with a per-block majority vote.

pub mod ledger;
pub mod node;
pub mod storage;
pub mod sync;
pub mod transport;
