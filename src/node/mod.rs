// Node module - THE REPLICA
// Configuration, the command surface, and the node that ties ledger, store and wire together

mod command;
mod config;
mod node;

pub use command::{Command, CommandError, CommandOutput, USAGE};
pub use config::{ConfigError, NodeConfig};
pub use node::{LastHashSurvey, Node, NodeError};
