// Reconciliation - Per-block majority vote across replicas
//
// A round collects every participant's block contents into a table keyed by
// participant address. Each block index is then resolved independently: a
// content wins only with strictly more than half of all participants.
// Participants that never answered are simply absent from the table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Participant address -> verbatim block contents, block 1 first
pub type ChainTable = BTreeMap<String, Vec<String>>;

/// Whether two participants hold identical chains
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairAgreement {
    pub left: String,
    pub right: String,
    pub agree: bool,
}

/// Result of voting on one block index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    /// `content` holds a strict majority
    Resolved { content: String, votes: usize },
    /// No content exceeded half of the participants
    NoConsensus { best_votes: usize },
}

/// Vote for a single 1-based block index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVote {
    pub index: usize,
    pub outcome: VoteOutcome,
}

impl BlockVote {
    /// Winning content, if any
    pub fn winner(&self) -> Option<&str> {
        match &self.outcome {
            VoteOutcome::Resolved { content, .. } => Some(content),
            VoteOutcome::NoConsensus { .. } => None,
        }
    }
}

/// Compare every pair of participants' full chains
pub fn pairwise_agreement(table: &ChainTable) -> Vec<PairAgreement> {
    let entries: Vec<(&String, &Vec<String>)> = table.iter().collect();
    let mut results = Vec::new();

    for (i, (left, left_chain)) in entries.iter().enumerate() {
        for (right, right_chain) in entries.iter().skip(i + 1) {
            let agree = left_chain == right_chain;
            tracing::info!(left = %left, right = %right, agree, "Replica comparison");
            results.push(PairAgreement {
                left: (*left).clone(),
                right: (*right).clone(),
                agree,
            });
        }
    }

    results
}

/// Resolve every block index up to the longest chain by strict majority
pub fn resolve_majority(table: &ChainTable) -> Vec<BlockVote> {
    let participants = table.len();
    let longest = table.values().map(Vec::len).max().unwrap_or(0);

    (0..longest)
        .map(|i| {
            let mut tally: HashMap<&str, usize> = HashMap::new();
            for chain in table.values() {
                if let Some(content) = chain.get(i) {
                    *tally.entry(content.as_str()).or_insert(0) += 1;
                }
            }

            let best = tally
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)));

            let outcome = match best {
                Some((content, votes)) if votes * 2 > participants => VoteOutcome::Resolved {
                    content: content.to_string(),
                    votes,
                },
                Some((_, votes)) => VoteOutcome::NoConsensus { best_votes: votes },
                None => VoteOutcome::NoConsensus { best_votes: 0 },
            };

            BlockVote {
                index: i + 1,
                outcome,
            }
        })
        .collect()
}

/// How a reconciliation round ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// Chain validated after the round and the requester was rewarded
    Rewarded { reward: String, block: usize },
    /// Some indices had no strict majority; no reward
    ConsensusFailed { unresolved: Vec<usize> },
    /// The chain still fails validation after applying the majority
    ChainCorrupt(usize),
}

/// Everything a reconciliation round observed and did
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub requester: String,
    pub started_at: DateTime<Utc>,
    /// Addresses that took part, ourselves included
    pub participants: Vec<String>,
    pub agreements: Vec<PairAgreement>,
    pub votes: Vec<BlockVote>,
    /// Local block indices overwritten with the majority content
    pub updated_blocks: Vec<usize>,
    pub outcome: ReconcileOutcome,
}

impl ReconciliationReport {
    /// Whether every pair of participants held the same chain
    pub fn all_agree(&self) -> bool {
        self.agreements.iter().all(|a| a.agree)
    }

    /// Block indices left without a majority
    pub fn unresolved(&self) -> Vec<usize> {
        self.votes
            .iter()
            .filter(|v| v.winner().is_none())
            .map(|v| v.index)
            .collect()
    }

    pub fn is_rewarded(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Rewarded { .. })
    }
}
