// Node - A ledger replica with a datagram listener and a command surface
//
// The listener task and the command processor share one ledger. Every
// read-mutate-persist sequence runs under the single `state` lock, so a
// broadcast arriving mid-command can never interleave with a local append.
// Reply tables for in-flight rounds live behind a separate short-lived lock.

use crate::ledger::{
    balance_of, can_afford, transaction_log, Ledger, LedgerError, LogEntry, Transaction,
    TransactionError,
};
use crate::node::command::{Command, CommandOutput};
use crate::node::config::{ConfigError, NodeConfig};
use crate::storage::{BlockStore, StoreError};
use crate::sync::{
    pairwise_agreement, resolve_majority, ChainTable, Message, PeerSet, ProtocolError,
    ReconcileOutcome, ReconciliationReport,
};
use crate::transport::{Transport, TransportError, TransportStats};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors surfaced by node operations
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<TransactionError> for NodeError {
    fn from(e: TransactionError) -> Self {
        NodeError::Ledger(LedgerError::InvalidTransaction(e.to_string()))
    }
}

impl NodeError {
    /// The corrupt block number, if this is a corruption error
    pub fn corrupt_block(&self) -> Option<usize> {
        match self {
            NodeError::Ledger(LedgerError::ChainCorrupt(index)) => Some(*index),
            _ => None,
        }
    }
}

/// Last-block hashes reported by peers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LastHashSurvey {
    pub local_hash: String,
    pub replies: BTreeMap<SocketAddr, String>,
    /// Peers that did not answer within the collection window
    pub silent: Vec<SocketAddr>,
}

impl LastHashSurvey {
    /// Peers whose last hash differs from ours
    pub fn mismatched(&self) -> Vec<SocketAddr> {
        self.replies
            .iter()
            .filter(|(_, hash)| **hash != self.local_hash)
            .map(|(peer, _)| *peer)
            .collect()
    }
}

/// Ledger and its backing store; always locked together
struct LedgerState {
    ledger: Ledger,
    store: BlockStore,
}

impl LedgerState {
    /// Apply a transaction line and persist the block it landed in
    fn apply(&mut self, line: String) -> Result<usize, StoreError> {
        let block = self.ledger.extend_last_or_append(line);
        self.store.save_block(&self.ledger, block)?;
        Ok(block)
    }

    /// Overwrite one block file verbatim and reload the ledger from disk
    ///
    /// The content must parse as a block and may extend the chain by at most
    /// one block. If the reload still fails, the previous file is restored.
    fn overwrite(&mut self, index: usize, content: &str) -> Result<(), StoreError> {
        let next = self.ledger.len() + 1;
        if index > next {
            return Err(StoreError::IndexOutOfRange { index, next });
        }
        BlockStore::parse_block(index, content)?;

        let previous = self.store.read_raw(index)?;
        self.store.write_raw(index, content)?;

        match self.store.load() {
            Ok(ledger) => {
                self.ledger = ledger;
                Ok(())
            }
            Err(e) => {
                match previous {
                    Some(old) => self.store.write_raw(index, &old)?,
                    None => self.store.remove_raw(index)?,
                }
                Err(e)
            }
        }
    }
}

/// Reply tables for rounds currently waiting on peers
#[derive(Default)]
struct PendingRounds {
    chains: Option<ChainTable>,
    last_hashes: Option<BTreeMap<SocketAddr, String>>,
}

struct NodeInner<T> {
    config: NodeConfig,
    peers: PeerSet,
    transport: Arc<T>,
    state: Mutex<LedgerState>,
    rounds: std::sync::Mutex<PendingRounds>,
}

/// A ledger node; cheap to clone, all clones share the same replica
pub struct Node<T> {
    inner: Arc<NodeInner<T>>,
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> Node<T> {
    /// Open the block store, load the ledger and wrap the transport
    pub fn new(config: NodeConfig, transport: T) -> Result<Self, NodeError> {
        config.validate()?;

        let store = BlockStore::open(&config.data_dir)?;
        let ledger = store.load()?;
        let peers = PeerSet::new(config.address, config.peers.iter().copied());

        info!(
            address = %config.address,
            peers = peers.len(),
            blocks = ledger.len(),
            transactions = ledger.transaction_count(),
            data_dir = %config.data_dir.display(),
            "Node initialized"
        );

        Ok(Self {
            inner: Arc::new(NodeInner {
                config,
                peers,
                transport: Arc::new(transport),
                state: Mutex::new(LedgerState { ledger, store }),
                rounds: std::sync::Mutex::new(PendingRounds::default()),
            }),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn peers(&self) -> &PeerSet {
        &self.inner.peers
    }

    pub fn address(&self) -> SocketAddr {
        self.inner.config.address
    }

    pub fn transport_stats(&self) -> TransportStats {
        self.inner.transport.stats()
    }

    /// Copy of the current in-memory ledger
    pub async fn ledger(&self) -> Ledger {
        self.inner.state.lock().await.ledger.clone()
    }

    fn rounds(&self) -> std::sync::MutexGuard<'_, PendingRounds> {
        // Guards are never held across an await, so poisoning means a panic elsewhere
        self.inner.rounds.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // LISTENER
    // ========================================================================

    /// Run the listener on its own task for the life of the process
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move { node.listen().await })
    }

    /// Receive and handle datagrams until the transport closes
    pub async fn listen(&self) {
        info!(address = %self.address(), "Listener started");
        loop {
            match self.inner.transport.recv_from().await {
                Ok((data, from)) => self.handle_datagram(&data, from).await,
                Err(e) if e.is_fatal() => {
                    warn!(error = %e, "Listener stopped");
                    break;
                }
                Err(e) => warn!(error = %e, "Receive failed"),
            }
        }
    }

    /// Decode and apply one datagram; never fails the listener
    pub async fn handle_datagram(&self, data: &[u8], from: SocketAddr) {
        if self.inner.peers.is_self(&from) {
            debug!("Ignoring our own datagram");
            return;
        }

        let msg = match Message::from_bytes(data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(peer = %from, error = %e, "Dropping undecodable datagram");
                return;
            }
        };

        let kind = msg.message_type();
        let mutating = msg.mutates_ledger();
        if let Err(e) = self.handle_message(msg, from).await {
            if mutating {
                warn!(peer = %from, message = %kind, error = %e, "Rejected ledger update");
            } else {
                debug!(peer = %from, message = %kind, error = %e, "Failed to handle message");
            }
        }
    }

    async fn handle_message(&self, msg: Message, from: SocketAddr) -> Result<(), NodeError> {
        match msg {
            Message::CheckLastHash => {
                let hash = self.inner.state.lock().await.ledger.last_hash().to_string();
                self.send(from, &Message::LastHash(hash)).await;
            }

            Message::LastHash(hash) => {
                let recorded = match self.rounds().last_hashes.as_mut() {
                    Some(table) => {
                        table.insert(from, hash);
                        true
                    }
                    None => false,
                };
                if !recorded {
                    debug!(peer = %from, "Unsolicited last hash dropped");
                }
            }

            Message::RequestChain => {
                let contents = self.inner.state.lock().await.store.contents()?;
                info!(peer = %from, blocks = contents.len(), "Sending full chain");
                for (i, content) in contents.into_iter().enumerate() {
                    self.send(from, &Message::Chain { index: i + 1, content }).await;
                }
            }

            Message::Chain { index, content } => {
                self.inner.state.lock().await.overwrite(index, &content)?;
                info!(peer = %from, block = index, "Block replaced from chain transfer");
            }

            Message::TransactionBroadcast(line) => {
                let block = self.apply_remote(&line).await?;
                info!(peer = %from, tx = %line, block, "Applied broadcast transaction");
            }

            Message::RewardBroadcast(line) => {
                let block = self.apply_remote(&line).await?;
                info!(peer = %from, tx = %line, block, "Applied broadcast reward");
            }

            Message::CheckAllRequest { requester } => {
                info!(peer = %from, requester = %requester, "Reconciliation requested");
                let blocks = self.inner.state.lock().await.store.contents()?;
                let reply = Message::CheckAllResult {
                    origin: self.address().to_string(),
                    blocks,
                };
                self.send(from, &reply).await;
            }

            Message::CheckAllResult { origin, blocks } => {
                let count = blocks.len();
                let recorded = match self.rounds().chains.as_mut() {
                    Some(table) => {
                        table.insert(origin.clone(), blocks);
                        true
                    }
                    None => false,
                };
                if recorded {
                    debug!(origin = %origin, blocks = count, "Recorded chain for reconciliation");
                } else {
                    debug!(origin = %origin, "No reconciliation round open; chain dropped");
                }
            }

            Message::SyncBlock { index, content } => {
                self.inner.state.lock().await.overwrite(index, &content)?;
                info!(peer = %from, block = index, "Block synchronized");
            }
        }
        Ok(())
    }

    /// Apply a transaction line received from a peer
    ///
    /// The line is stored exactly as received so block hashes match the sender's.
    async fn apply_remote(&self, line: &str) -> Result<usize, NodeError> {
        line.parse::<Transaction>()?;
        let block = self.inner.state.lock().await.apply(line.to_string())?;
        Ok(block)
    }

    // ========================================================================
    // SENDING
    // ========================================================================

    /// Fire-and-forget send; an unreachable peer is only logged
    async fn send(&self, target: SocketAddr, msg: &Message) {
        if let Err(e) = self.inner.transport.send_to(target, &msg.to_bytes()).await {
            if e.is_send_error() {
                debug!(peer = %target, message = %msg.message_type(), error = %e, "Send failed");
            } else {
                warn!(peer = %target, message = %msg.message_type(), error = %e, "Transport error");
            }
        }
    }

    /// Send to every peer
    async fn broadcast(&self, msg: &Message) -> u32 {
        let targets: Vec<SocketAddr> = self.inner.peers.iter().copied().collect();
        let sent = self
            .inner
            .transport
            .broadcast(&targets, &msg.to_bytes())
            .await;
        debug!(message = %msg.message_type(), sent, peers = targets.len(), "Broadcast");
        sent
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Run a parsed command
    pub async fn execute(&self, command: Command) -> Result<CommandOutput, NodeError> {
        match command {
            Command::CheckMoney { account } => {
                let balance = self.balance(&account).await;
                Ok(CommandOutput::Balance { account, balance })
            }
            Command::CheckLog { account } => {
                let entries = self.transaction_log(&account).await;
                Ok(CommandOutput::Log { account, entries })
            }
            Command::Transaction { sender, receiver, amount } => {
                let block = self.submit_transaction(&sender, &receiver, amount).await?;
                Ok(CommandOutput::TransactionAccepted { block })
            }
            Command::CheckChain { checker } => {
                let reward = self.check_chain(&checker).await?;
                Ok(CommandOutput::ChainValid { reward })
            }
            Command::CheckAllChains { requester } => {
                Ok(CommandOutput::Reconciled(self.reconcile(&requester).await?))
            }
            Command::CheckLastHash => Ok(CommandOutput::LastHashes(self.survey_last_hashes().await)),
            Command::Resync { peer } => {
                let blocks = self.resync_from(peer).await;
                Ok(CommandOutput::Resynced { blocks })
            }
        }
    }

    /// Current balance of `account`
    pub async fn balance(&self, account: &str) -> i64 {
        balance_of(&self.inner.state.lock().await.ledger, account)
    }

    /// Every transaction touching `account`
    pub async fn transaction_log(&self, account: &str) -> Vec<LogEntry> {
        transaction_log(&self.inner.state.lock().await.ledger, account)
    }

    /// Validate the local chain
    pub async fn validate(&self) -> Result<(), NodeError> {
        self.inner.state.lock().await.ledger.validate()?;
        Ok(())
    }

    /// Check funds, append, persist and broadcast a transaction
    ///
    /// Returns the 1-based block number the transaction landed in.
    pub async fn submit_transaction(
        &self,
        sender: &str,
        receiver: &str,
        amount: u64,
    ) -> Result<usize, NodeError> {
        let tx = Transaction::new(sender, receiver, amount)?;

        let block = {
            let mut state = self.inner.state.lock().await;
            if !can_afford(&state.ledger, sender, amount) {
                let balance = balance_of(&state.ledger, sender);
                info!(sender, balance, amount, "Transaction rejected");
                return Err(LedgerError::InsufficientFunds {
                    account: sender.to_string(),
                    balance,
                }
                .into());
            }
            state.apply(tx.to_string())?
        };

        info!(tx = %tx, block, "Transaction accepted");
        self.broadcast(&Message::TransactionBroadcast(tx.to_string())).await;
        Ok(block)
    }

    /// Validate the local chain and reward `checker` when it is intact
    pub async fn check_chain(&self, checker: &str) -> Result<Transaction, NodeError> {
        let reward = Transaction::mint(checker, self.inner.config.check_reward)?;

        let block = {
            let mut state = self.inner.state.lock().await;
            state.ledger.validate()?;
            state.apply(reward.to_string())?
        };

        info!(reward = %reward, block, "Chain valid; reward issued");
        self.broadcast(&Message::RewardBroadcast(reward.to_string())).await;
        Ok(reward)
    }

    /// Ask every peer for its last block hash and wait for replies
    pub async fn survey_last_hashes(&self) -> LastHashSurvey {
        let local_hash = self.inner.state.lock().await.ledger.last_hash().to_string();

        self.rounds().last_hashes = Some(BTreeMap::new());
        self.broadcast(&Message::CheckLastHash).await;
        tokio::time::sleep(self.inner.config.collect_timeout()).await;
        let replies = self.rounds().last_hashes.take().unwrap_or_default();

        let silent = self
            .inner
            .peers
            .iter()
            .filter(|p| !replies.contains_key(p))
            .copied()
            .collect();

        LastHashSurvey {
            local_hash,
            replies,
            silent,
        }
    }

    /// Pull `peer`'s whole chain; its blocks overwrite ours as they arrive
    ///
    /// Returns the local block count once the collection window closes.
    pub async fn resync_from(&self, peer: SocketAddr) -> usize {
        info!(peer = %peer, "Requesting full chain");
        self.send(peer, &Message::RequestChain).await;
        tokio::time::sleep(self.inner.config.collect_timeout()).await;
        self.inner.state.lock().await.ledger.len()
    }

    // ========================================================================
    // RECONCILIATION
    // ========================================================================

    /// Run one majority-vote reconciliation round on behalf of `requester`
    ///
    /// Fails up front with `ChainCorrupt` when the local chain is broken; in
    /// that case nothing is sent and no reward is minted.
    pub async fn reconcile(&self, requester: &str) -> Result<ReconciliationReport, NodeError> {
        let reward = Transaction::mint(requester, self.inner.config.reconcile_reward)?;
        let started_at = Utc::now();
        let own_key = self.address().to_string();

        let local_blocks = {
            let state = self.inner.state.lock().await;
            if let Err(e) = state.ledger.validate() {
                warn!(error = %e, "Local chain corrupt; reconciliation aborted");
                return Err(e.into());
            }
            state.store.contents()?
        };

        info!(requester, peers = self.inner.peers.len(), "Reconciliation round started");
        {
            let mut table = ChainTable::new();
            table.insert(own_key.clone(), local_blocks);
            self.rounds().chains = Some(table);
        }

        self.broadcast(&Message::CheckAllRequest {
            requester: requester.to_string(),
        })
        .await;
        tokio::time::sleep(self.inner.config.collect_timeout()).await;

        let table = self.rounds().chains.take().unwrap_or_default();
        let participants: Vec<String> = table.keys().cloned().collect();
        info!(participants = participants.len(), "Collection window closed");

        let agreements = pairwise_agreement(&table);
        let votes = resolve_majority(&table);

        // Apply the majority locally
        let mut updated_blocks = Vec::new();
        let mut to_sync = Vec::new();
        {
            let mut state = self.inner.state.lock().await;
            let mut stored = state.store.block_count();
            for vote in &votes {
                let Some(winner) = vote.winner() else {
                    warn!(block = vote.index, "No consensus for block");
                    continue;
                };
                if vote.index > stored + 1 {
                    warn!(block = vote.index, stored, "Majority block would leave a gap; skipped");
                    continue;
                }
                if let Err(e) = BlockStore::parse_block(vote.index, winner) {
                    warn!(block = vote.index, error = %e, "Majority block is malformed; skipped");
                    continue;
                }

                let local = state.store.read_raw(vote.index)?;
                if local.as_deref() != Some(winner) {
                    state.store.write_raw(vote.index, winner)?;
                    updated_blocks.push(vote.index);
                    stored = stored.max(vote.index);
                }

                let diverged = table.values().any(|chain| {
                    chain.get(vote.index - 1).map(String::as_str) != Some(winner)
                });
                if diverged {
                    to_sync.push((vote.index, winner.to_string()));
                }
            }
            if !updated_blocks.is_empty() {
                state.ledger = state.store.load()?;
                info!(blocks = ?updated_blocks, "Local blocks replaced by majority");
            }
        }

        for (index, content) in to_sync {
            self.broadcast(&Message::SyncBlock { index, content }).await;
        }

        let unresolved: Vec<usize> = votes
            .iter()
            .filter(|v| v.winner().is_none())
            .map(|v| v.index)
            .collect();

        let outcome = if !unresolved.is_empty() {
            warn!(blocks = ?unresolved, "Chain untrusted; no reward");
            ReconcileOutcome::ConsensusFailed { unresolved }
        } else {
            let minted = {
                let mut state = self.inner.state.lock().await;
                match state.ledger.validate() {
                    Ok(()) => Ok(state.apply(reward.to_string())?),
                    Err(LedgerError::ChainCorrupt(index)) => Err(index),
                    Err(e) => return Err(e.into()),
                }
            };

            match minted {
                Ok(block) => {
                    info!(reward = %reward, block, "Chain trusted; reward issued");
                    self.broadcast(&Message::RewardBroadcast(reward.to_string())).await;
                    ReconcileOutcome::Rewarded {
                        reward: reward.to_string(),
                        block,
                    }
                }
                Err(index) => {
                    warn!(block = index, "Chain still corrupt after reconciliation");
                    ReconcileOutcome::ChainCorrupt(index)
                }
            }
        };

        Ok(ReconciliationReport {
            requester: requester.to_string(),
            started_at,
            participants,
            agreements,
            votes,
            updated_blocks,
            outcome,
        })
    }
}
