mod memory;
mod provider;

pub use memory::{LoggedLink, MemoryTeamLog, MemoryTeamLogError};
pub use provider::{ChainTip, ChainTipProvider, TeamLogError, TeamPoster};
