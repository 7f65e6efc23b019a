// Storage module - PERSISTENCE
// One plain-text file per block

mod store;

pub use store::{BlockStore, StoreError};
