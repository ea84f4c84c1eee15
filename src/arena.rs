// ordered block list
pub mod block_list;

// impl Arena
pub mod allocator;

// types
pub mod types;

pub use block_list::{BlockList, Entries};
pub use types::{Arena, ArenaError, Block, BlockId, FreeOutcome, Result};
