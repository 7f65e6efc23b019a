// Ledger - The ordered, hash-linked chain of blocks held by one node

use crate::ledger::block::{Block, GENESIS_PREVIOUS_HASH};
use thiserror::Error;

/// Errors raised by ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Block `0` (1-based) does not link to a recomputed hash of its predecessor
    #[error("Chain corrupt starting at block {0}")]
    ChainCorrupt(usize),

    #[error("Insufficient funds: {account} has {balance}")]
    InsufficientFunds { account: String, balance: i64 },

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

impl LedgerError {
    /// Check if this error means the local chain needs reconciliation
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::ChainCorrupt(_))
    }
}

/// Ordered sequence of blocks, numbered from 1
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from already constructed blocks (no relinking)
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block by 1-based number
    pub fn block(&self, number: usize) -> Option<&Block> {
        number.checked_sub(1).and_then(|i| self.blocks.get(i))
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Hash of the last block, or the genesis sentinel for an empty ledger
    pub fn last_hash(&self) -> &str {
        self.blocks
            .last()
            .map(Block::hash)
            .unwrap_or(GENESIS_PREVIOUS_HASH)
    }

    /// Append a new block linked to the current last block
    pub fn append(&mut self, transactions: Vec<String>) -> &Block {
        let block = Block::new(transactions, self.last_hash());
        self.blocks.push(block);
        &self.blocks[self.blocks.len() - 1]
    }

    /// Add a transaction to the last block, or open a new block when the
    /// ledger is empty or the last block is full.
    ///
    /// Returns the 1-based number of the block that received the transaction.
    pub fn extend_last_or_append(&mut self, transaction: String) -> usize {
        let needs_new_block = self.blocks.last().map_or(true, |b| !b.has_capacity());

        if needs_new_block {
            self.append(vec![transaction]);
        } else if let Some(last) = self.blocks.last_mut() {
            last.push(transaction);
        }
        self.blocks.len()
    }

    /// Verify every block links to the recomputed hash of its predecessor
    pub fn validate(&self) -> Result<(), LedgerError> {
        for (i, pair) in self.blocks.windows(2).enumerate() {
            let (prev, current) = (&pair[0], &pair[1]);
            if current.previous_hash() != prev.hash() {
                // pair index i covers blocks i+1 and i+2 (1-based)
                let number = i + 2;
                tracing::warn!(
                    block = number,
                    expected = %prev.hash(),
                    found = %current.previous_hash(),
                    "Hash link mismatch"
                );
                return Err(LedgerError::ChainCorrupt(number));
            }
        }
        Ok(())
    }

    /// Total number of transaction lines across all blocks
    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }
}
