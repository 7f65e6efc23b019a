// Ledger module - THE CHAIN
// Blocks, the hash-linked ledger, and balances derived from it

mod balance;
mod block;
mod chain;

pub use balance::{balance_of, balances_for, can_afford, transaction_log, LogEntry};
pub use block::{
    Block, Transaction, TransactionError, BLOCK_CAPACITY, GENESIS_PREVIOUS_HASH, MAX_AMOUNT,
    MINT_ACCOUNT,
};
pub use chain::{Ledger, LedgerError};
