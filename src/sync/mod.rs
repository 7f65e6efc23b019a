// Sync module - HOW NODES TALK
// Wire protocol, the fixed peer set, and majority-vote reconciliation

mod peer;
mod protocol;
mod reconcile;

pub use peer::PeerSet;
pub use protocol::{Message, MessageType, ProtocolError};
pub use reconcile::{
    pairwise_agreement, resolve_majority, BlockVote, ChainTable, PairAgreement,
    ReconcileOutcome, ReconciliationReport, VoteOutcome,
};
