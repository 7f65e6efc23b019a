// Commands - The node's foreground command surface
//
// One command per input line, e.g. `transaction A B 30`. Parsing never fails
// the command loop; a bad line just produces a usage error.

use crate::ledger::{LogEntry, Transaction};
use crate::node::LastHashSurvey;
use crate::sync::{ReconcileOutcome, ReconciliationReport};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

pub const USAGE: &str = "commands: checkMoney <account> | checkLog <account> | \
transaction <sender> <receiver> <amount> | checkChain <account> | \
checkAllChains <account> | checkLastHash | resync <peer-address>";

/// Errors from parsing a command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown or malformed command: {0}")]
    Unknown(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),
}

/// A parsed command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    CheckMoney { account: String },
    CheckLog { account: String },
    Transaction { sender: String, receiver: String, amount: u64 },
    CheckChain { checker: String },
    CheckAllChains { requester: String },
    CheckLastHash,
    Resync { peer: SocketAddr },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            [] => Err(CommandError::Empty),
            ["checkMoney", account] => Ok(Command::CheckMoney {
                account: account.to_string(),
            }),
            ["checkLog", account] => Ok(Command::CheckLog {
                account: account.to_string(),
            }),
            ["transaction", sender, receiver, amount] => {
                let amount = amount
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidAmount(amount.to_string()))?;
                Ok(Command::Transaction {
                    sender: sender.to_string(),
                    receiver: receiver.to_string(),
                    amount,
                })
            }
            ["checkChain", checker] => Ok(Command::CheckChain {
                checker: checker.to_string(),
            }),
            ["checkAllChains", requester] => Ok(Command::CheckAllChains {
                requester: requester.to_string(),
            }),
            ["checkLastHash"] => Ok(Command::CheckLastHash),
            ["resync", peer] => peer
                .parse::<SocketAddr>()
                .map(|peer| Command::Resync { peer })
                .map_err(|_| CommandError::InvalidAddress(peer.to_string())),
            _ => Err(CommandError::Unknown(line.trim().to_string())),
        }
    }
}

/// Result of a successfully executed command
#[derive(Clone, Debug)]
pub enum CommandOutput {
    Balance { account: String, balance: i64 },
    Log { account: String, entries: Vec<LogEntry> },
    TransactionAccepted { block: usize },
    ChainValid { reward: Transaction },
    Reconciled(ReconciliationReport),
    LastHashes(LastHashSurvey),
    Resynced { blocks: usize },
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Balance { account, balance } => write!(f, "{}: {}", account, balance),
            CommandOutput::Log { account, entries } => {
                if entries.is_empty() {
                    return write!(f, "{} No transaction!", account);
                }
                let lines: Vec<String> = entries
                    .iter()
                    .map(|e| format!("[Block {}.txt]: {} → {} : {}", e.block, e.sender, e.receiver, e.amount))
                    .collect();
                f.write_str(&lines.join("\n"))
            }
            CommandOutput::TransactionAccepted { block } => {
                write!(f, "Transaction success, written in {}.txt", block)
            }
            CommandOutput::ChainValid { reward } => write!(f, "OK (reward: {})", reward),
            CommandOutput::Reconciled(report) => {
                for pair in &report.agreements {
                    let verdict = if pair.agree { "Yes" } else { "No" };
                    writeln!(f, "{} vs {} : {}", pair.left, pair.right, verdict)?;
                }
                for index in &report.updated_blocks {
                    writeln!(f, "Block {} synchronized", index)?;
                }
                match &report.outcome {
                    ReconcileOutcome::Rewarded { reward, block } => {
                        write!(f, "Chain trusted; reward {} written in {}.txt", reward, block)
                    }
                    ReconcileOutcome::ConsensusFailed { unresolved } => {
                        write!(f, "No consensus for blocks {:?}; chain untrusted, no reward", unresolved)
                    }
                    ReconcileOutcome::ChainCorrupt(index) => {
                        write!(f, "Chain still corrupt at block {}; no reward", index)
                    }
                }
            }
            CommandOutput::LastHashes(survey) => {
                writeln!(f, "local: {}", survey.local_hash)?;
                for (peer, hash) in &survey.replies {
                    let verdict = if *hash == survey.local_hash { "match" } else { "differs" };
                    writeln!(f, "{}: {} ({})", peer, hash, verdict)?;
                }
                write!(f, "{} peer(s) silent", survey.silent.len())
            }
            CommandOutput::Resynced { blocks } => write!(f, "Resynced, local chain has {} block(s)", blocks),
        }
    }
}
