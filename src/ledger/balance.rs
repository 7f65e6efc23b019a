// Balance Engine - Derives account balances and histories by replaying the ledger
//
// Nothing here is cached: every query folds over the whole chain in block order.

use crate::ledger::block::MINT_ACCOUNT;
use crate::ledger::chain::Ledger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line of an account's transaction history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based block number the transaction lives in
    pub block: usize,
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
}

/// Replay every transaction and return the resulting balance per account
pub fn balances_for(ledger: &Ledger) -> BTreeMap<String, i64> {
    let mut balances: BTreeMap<String, i64> = BTreeMap::new();

    for block in ledger.blocks() {
        for tx in block.parsed_transactions() {
            // Parsed transactions never exceed MAX_AMOUNT
            let amount = i64::try_from(tx.amount()).unwrap_or(i64::MAX);
            if !tx.is_mint() {
                let sender = balances.entry(tx.sender().to_string()).or_insert(0);
                *sender = sender.saturating_sub(amount);
            }
            let receiver = balances.entry(tx.receiver().to_string()).or_insert(0);
            *receiver = receiver.saturating_add(amount);
        }
    }

    balances
}

/// Balance of a single account; unknown accounts hold 0
pub fn balance_of(ledger: &Ledger, account: &str) -> i64 {
    balances_for(ledger).get(account).copied().unwrap_or(0)
}

/// Whether `sender` can pay `amount` right now
pub fn can_afford(ledger: &Ledger, sender: &str, amount: u64) -> bool {
    if sender == MINT_ACCOUNT {
        return true;
    }
    match i64::try_from(amount) {
        Ok(amount) => balance_of(ledger, sender) >= amount,
        Err(_) => false,
    }
}

/// Every transaction touching `account`, in block order
pub fn transaction_log(ledger: &Ledger, account: &str) -> Vec<LogEntry> {
    ledger
        .blocks()
        .iter()
        .enumerate()
        .flat_map(|(i, block)| {
            block
                .parsed_transactions()
                .filter(|tx| tx.involves(account))
                .map(move |tx| LogEntry {
                    block: i + 1,
                    sender: tx.sender().to_string(),
                    receiver: tx.receiver().to_string(),
                    amount: tx.amount(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
