use std::fmt;

use thiserror::Error;

use super::BlockList;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("index {index} is out of bounds for a list of {len} blocks")]
    InvalidIndex { index: usize, len: usize },
    #[error("cannot free from an arena with no allocated blocks")]
    EmptyAllocatedList,
    #[error("block {0} is not in this list")]
    BlockNotFound(Block),
}

pub type Result<T> = std::result::Result<T, ArenaError>;

/// What `free()` did with the given address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOutcome {
    /// The block was moved to the tail of the free list.
    Freed(Block),
    /// Nothing is allocated at that address, the arena was left untouched.
    NoMatch,
}

/// A contiguous range of words, `[base_address, base_address + length)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub base_address: usize,
    pub length: usize,
}

impl Block {
    pub fn new(base_address: usize, length: usize) -> Self {
        Self {
            base_address,
            length,
        }
    }

    /// One past the last word of the block.
    pub fn end(&self) -> usize {
        self.base_address + self.length
    }

    /// `true` if `next` starts exactly where this block ends.
    pub fn is_followed_by(&self, next: &Block) -> bool {
        self.end() == next.base_address
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} {})", self.base_address, self.length)
    }
}

/// Handle to a node of a `BlockList`, issued when a block is inserted.
///
/// The generation makes a handle to a removed node stale instead of letting it point at whatever
/// block reuses the slot later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub(super) slot: u32,
    pub(super) generation: u32,
}

#[derive(Debug)]
pub struct Arena {
    pub(super) max_size: usize,
    // unused ranges, in list order (not address order)
    pub(super) free: BlockList,
    // in-use ranges, in the order they were handed out
    pub(super) allocated: BlockList,
}
