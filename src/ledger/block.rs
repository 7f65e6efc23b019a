// Block - A batch of transactions linked to its predecessor by hash

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reserved sender that issues tokens without being debited
pub const MINT_ACCOUNT: &str = "angel";

/// Maximum number of transactions held by one block
pub const BLOCK_CAPACITY: usize = 5;

/// Largest amount a single transaction may carry; balances are signed 64-bit
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// Previous-hash value carried by the first block of a chain
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Errors from parsing or building a transaction record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Expected \"sender, receiver, amount\", got {0:?}")]
    InvalidFormat(String),

    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Invalid account name: {0:?}")]
    InvalidAccount(String),
}

/// A single transfer, stored on disk as `"<sender>, <receiver>, <amount>"`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    sender: String,
    receiver: String,
    amount: u64,
}

impl Transaction {
    /// Create a transaction, rejecting account names that would break the record
    /// format and amounts beyond `MAX_AMOUNT`
    pub fn new(sender: &str, receiver: &str, amount: u64) -> Result<Self, TransactionError> {
        Self::check_account(sender)?;
        Self::check_account(receiver)?;
        if amount > MAX_AMOUNT {
            return Err(TransactionError::InvalidAmount(amount.to_string()));
        }

        Ok(Self {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
        })
    }

    /// Create a minting transaction crediting `receiver`
    pub fn mint(receiver: &str, amount: u64) -> Result<Self, TransactionError> {
        Self::new(MINT_ACCOUNT, receiver, amount)
    }

    fn check_account(name: &str) -> Result<(), TransactionError> {
        if name.is_empty() || name.contains(',') || name.chars().any(char::is_whitespace) {
            return Err(TransactionError::InvalidAccount(name.to_string()));
        }
        Ok(())
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Whether the sender is the minting identity
    pub fn is_mint(&self) -> bool {
        self.sender == MINT_ACCOUNT
    }

    /// Whether `account` appears as sender or receiver
    pub fn involves(&self, account: &str) -> bool {
        self.sender == account || self.receiver == account
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.sender, self.receiver, self.amount)
    }
}

impl FromStr for Transaction {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(", ").collect();
        if parts.len() != 3 {
            return Err(TransactionError::InvalidFormat(s.to_string()));
        }

        let amount = parts[2]
            .parse::<u64>()
            .map_err(|_| TransactionError::InvalidAmount(parts[2].to_string()))?;

        Self::new(parts[0], parts[1], amount)
    }
}

/// A block of transaction records
///
/// The hash is derived from the transaction lines and the previous hash and is
/// recomputed whenever the transaction list changes. It is never read from storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    transactions: Vec<String>,
    previous_hash: String,
    hash: String,
}

impl Block {
    /// Build a block and compute its hash
    pub fn new(transactions: Vec<String>, previous_hash: &str) -> Self {
        let hash = Self::compute_hash(&transactions, previous_hash);
        Self {
            transactions,
            previous_hash: previous_hash.to_string(),
            hash,
        }
    }

    /// SHA-256 over the concatenated transaction lines followed by the previous hash
    pub fn compute_hash(transactions: &[String], previous_hash: &str) -> String {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.as_bytes());
        }
        hasher.update(previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn transactions(&self) -> &[String] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Whether another transaction still fits in this block
    pub fn has_capacity(&self) -> bool {
        self.transactions.len() < BLOCK_CAPACITY
    }

    /// Append a transaction line and refresh the hash
    pub(crate) fn push(&mut self, transaction: String) {
        self.transactions.push(transaction);
        self.hash = Self::compute_hash(&self.transactions, &self.previous_hash);
    }

    /// Parsed view of the transaction lines, skipping lines that are not transactions
    pub fn parsed_transactions(&self) -> impl Iterator<Item = Transaction> + '_ {
        self.transactions.iter().filter_map(|line| match line.parse() {
            Ok(tx) => Some(tx),
            Err(e) => {
                tracing::debug!(line = %line, error = %e, "Skipping unparseable transaction line");
                None
            }
        })
    }
}
