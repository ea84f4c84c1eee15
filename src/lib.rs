pub mod arena;
pub mod script;

pub use arena::Result as ArenaResult;
pub use arena::{Arena, ArenaError, Block, BlockId, BlockList, FreeOutcome};
pub use script::{Command, Program, ScriptError, NO_FIT};
