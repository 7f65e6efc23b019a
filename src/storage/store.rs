// BlockStore - One plain-text file per block
//
// Layout of `<dir>/<n>.txt`:
//   Sha256 of previous block: <hex>
//   Next block: <n+1>.txt | None
//   <transaction line>...
//
// Only the previous hash is stored. A block's own hash is recomputed on load.

use crate::ledger::{Block, Ledger};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PREVIOUS_HASH_PREFIX: &str = "Sha256 of previous block: ";
const NEXT_BLOCK_PREFIX: &str = "Next block: ";

/// Errors from block storage
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed block {index}: {reason}")]
    MalformedBlock { index: usize, reason: String },

    #[error("Block numbers start at 1")]
    InvalidIndex,

    #[error("Block {index} would leave a gap; next block is {next}")]
    IndexOutOfRange { index: usize, next: usize },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File-per-block store rooted at a directory
#[derive(Clone, Debug)]
pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    /// Open a store, creating the directory if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of block `index` (1-based)
    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.txt", index))
    }

    /// Number of consecutive block files starting at 1
    pub fn block_count(&self) -> usize {
        let mut count = 0;
        while self.path_for(count + 1).exists() {
            count += 1;
        }
        count
    }

    // ========================================================================
    // FORMAT
    // ========================================================================

    /// Render block `index` in the on-disk format
    pub fn render_block(block: &Block, index: usize, has_next: bool) -> String {
        let next = if has_next {
            format!("{}.txt", index + 1)
        } else {
            "None".to_string()
        };

        let mut out = format!(
            "{}{}\n{}{}\n",
            PREVIOUS_HASH_PREFIX,
            block.previous_hash(),
            NEXT_BLOCK_PREFIX,
            next
        );
        for tx in block.transactions() {
            out.push_str(tx);
            out.push('\n');
        }
        out
    }

    /// Parse the text of block `index`, recomputing its hash
    pub fn parse_block(index: usize, content: &str) -> Result<Block, StoreError> {
        let mut lines = content.lines();

        let previous_hash = lines
            .next()
            .and_then(|line| line.strip_prefix(PREVIOUS_HASH_PREFIX))
            .ok_or_else(|| StoreError::MalformedBlock {
                index,
                reason: "missing previous hash line".to_string(),
            })?
            .trim()
            .to_string();

        // The next-block pointer is informational; ordering comes from file numbers
        let _next = lines.next();

        let transactions: Vec<String> = lines
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Block::new(transactions, &previous_hash))
    }

    // ========================================================================
    // RAW ACCESS
    // ========================================================================

    /// Read the verbatim text of block `index`, `None` if the file is absent
    pub fn read_raw(&self, index: usize) -> Result<Option<String>, StoreError> {
        if index == 0 {
            return Err(StoreError::InvalidIndex);
        }
        let path = self.path_for(index);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Overwrite block `index` with verbatim text
    pub fn write_raw(&self, index: usize, content: &str) -> Result<(), StoreError> {
        if index == 0 {
            return Err(StoreError::InvalidIndex);
        }
        let path = self.path_for(index);
        fs::write(&path, content).map_err(|e| StoreError::io(&path, e))
    }

    /// Delete block `index`; an absent file is not an error
    pub fn remove_raw(&self, index: usize) -> Result<(), StoreError> {
        if index == 0 {
            return Err(StoreError::InvalidIndex);
        }
        let path = self.path_for(index);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Verbatim text of every block, in order, up to the first missing file
    pub fn contents(&self) -> Result<Vec<String>, StoreError> {
        let mut contents = Vec::new();
        while let Some(content) = self.read_raw(contents.len() + 1)? {
            contents.push(content);
        }
        Ok(contents)
    }

    // ========================================================================
    // LEDGER PERSISTENCE
    // ========================================================================

    /// Load the ledger, stopping at the first absent block file
    pub fn load(&self) -> Result<Ledger, StoreError> {
        let blocks = self
            .contents()?
            .iter()
            .enumerate()
            .map(|(i, content)| Self::parse_block(i + 1, content))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(dir = %self.dir.display(), blocks = blocks.len(), "Loaded ledger");
        Ok(Ledger::from_blocks(blocks))
    }

    /// Write every block of the ledger
    pub fn save_all(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let count = ledger.len();
        for (i, block) in ledger.blocks().iter().enumerate() {
            let index = i + 1;
            self.write_raw(index, &Self::render_block(block, index, index < count))?;
        }
        Ok(())
    }

    /// Write block `index` after it was appended or extended
    ///
    /// The predecessor is rewritten too so its next-block pointer stays current.
    pub fn save_block(&self, ledger: &Ledger, index: usize) -> Result<(), StoreError> {
        let count = ledger.len();
        let block = ledger.block(index).ok_or(StoreError::InvalidIndex)?;
        self.write_raw(index, &Self::render_block(block, index, index < count))?;

        if let Some(prev) = index.checked_sub(1).and_then(|i| ledger.block(i)) {
            self.write_raw(index - 1, &Self::render_block(prev, index - 1, true))?;
        }
        Ok(())
    }
}
