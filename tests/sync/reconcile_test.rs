// Reconcile Tests
// Tests for pairwise comparison and per-block majority voting

use p2pledger::sync::{pairwise_agreement, resolve_majority, ChainTable, PeerSet, VoteOutcome};
use std::net::SocketAddr;

fn table(entries: &[(&str, &[&str])]) -> ChainTable {
    entries
        .iter()
        .map(|(who, blocks)| (who.to_string(), blocks.iter().map(|b| b.to_string()).collect()))
        .collect()
}

// ============================================================================
// PAIRWISE AGREEMENT
// ============================================================================

#[test]
fn test_pairs_cover_every_combination_once() {
    let t = table(&[("a", &["x"]), ("b", &["x"]), ("c", &["y"])]);
    let pairs = pairwise_agreement(&t);

    assert_eq!(pairs.len(), 3);
    let disagreeing: Vec<_> = pairs.iter().filter(|p| !p.agree).collect();
    assert_eq!(disagreeing.len(), 2);
    assert!(disagreeing.iter().all(|p| p.left == "c" || p.right == "c"));
}

#[test]
fn test_single_participant_has_no_pairs() {
    let t = table(&[("a", &["x", "y"])]);
    assert!(pairwise_agreement(&t).is_empty());
}

#[test]
fn test_prefix_chain_disagrees() {
    let t = table(&[("a", &["x", "y"]), ("b", &["x"])]);
    assert!(!pairwise_agreement(&t)[0].agree);
}

// ============================================================================
// MAJORITY VOTING
// ============================================================================

#[test]
fn test_two_of_three_wins() {
    let t = table(&[("a", &["x"]), ("b", &["x"]), ("c", &["y"])]);
    let votes = resolve_majority(&t);

    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].index, 1);
    assert_eq!(votes[0].winner(), Some("x"));
    assert_eq!(
        votes[0].outcome,
        VoteOutcome::Resolved { content: "x".into(), votes: 2 }
    );
}

#[test]
fn test_three_way_split_has_no_winner() {
    let t = table(&[("a", &["x"]), ("b", &["y"]), ("c", &["z"])]);
    let votes = resolve_majority(&t);

    assert_eq!(votes[0].winner(), None);
    assert_eq!(votes[0].outcome, VoteOutcome::NoConsensus { best_votes: 1 });
}

#[test]
fn test_even_split_has_no_winner() {
    let t = table(&[("a", &["x"]), ("b", &["x"]), ("c", &["y"]), ("d", &["y"])]);
    assert_eq!(resolve_majority(&t)[0].winner(), None);
}

#[test]
fn test_absent_participants_count_against_majority() {
    // Only two of five hold block 2, so it cannot reach a majority
    let t = table(&[
        ("a", &["x", "p"]),
        ("b", &["x", "p"]),
        ("c", &["x"]),
        ("d", &["x"]),
        ("e", &["x"]),
    ]);
    let votes = resolve_majority(&t);

    assert_eq!(votes.len(), 2);
    assert_eq!(votes[0].winner(), Some("x"));
    assert_eq!(votes[1].winner(), None);
}

#[test]
fn test_indices_vote_independently() {
    let t = table(&[
        ("a", &["x1", "y1"]),
        ("b", &["x1", "y2"]),
        ("c", &["x2", "y2"]),
    ]);
    let votes = resolve_majority(&t);

    assert_eq!(votes[0].winner(), Some("x1"));
    assert_eq!(votes[1].winner(), Some("y2"));
}

#[test]
fn test_empty_table_has_no_votes() {
    assert!(resolve_majority(&ChainTable::new()).is_empty());
}

// ============================================================================
// PEER SET
// ============================================================================

#[test]
fn test_peer_set_excludes_self() {
    let local: SocketAddr = "127.0.0.1:8001".parse().unwrap();
    let other: SocketAddr = "127.0.0.1:8002".parse().unwrap();
    let peers = PeerSet::new(local, vec![local, other, other]);

    assert_eq!(peers.len(), 1);
    assert!(peers.contains(&other));
    assert!(!peers.contains(&local));
    assert!(peers.is_self(&local));
    assert_eq!(peers.participant_count(), 2);
}
