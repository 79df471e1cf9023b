use std::fmt::{Debug, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::sigchain::{LinkId, Seqno};
use crate::team::{SigMultiPayload, TeamId};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TeamLogError<T> {
    /// The provider failed before the log saw the request
    #[error("unhandled team log provider error: {0}")]
    Provider(#[from] T),
    #[error("team {0} not found")]
    TeamNotFound(TeamId),
    /// A link does not extend the current tip of its chain, i.e. another
    ///  writer appended first
    #[error("chain tip moved: {0}")]
    Conflict(String),
    /// The log looked at the submission and refused it
    #[error("submission rejected: {0}")]
    Rejected(String),
    /// No answer arrived; the submission may or may not have been applied
    #[error("submission timed out")]
    Timeout,
}

/// The append point of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    pub seqno: Seqno,
    pub link_id: LinkId,
}

#[async_trait]
pub trait ChainTipProvider: Send + Sync + Debug {
    type Error: Display + Debug + Send;

    /// Read the current tip of a team's chain
    ///
    /// # Arguments
    /// * `id` - The team whose chain to read
    ///
    /// # Returns
    /// * `Ok(ChainTip)` - The seqno and link id of the last link
    /// * `Err(TeamLogError::TeamNotFound)` - The team has no chain
    async fn tip(&self, id: &TeamId) -> Result<ChainTip, TeamLogError<Self::Error>>;
}

#[async_trait]
pub trait TeamPoster: Send + Sync + Debug {
    type Error: Display + Debug + Send;

    /// Submit a team creation's links and box set as one unit
    ///
    /// Should either apply every link or none of them, and fail with:
    /// * `Err(TeamLogError::Conflict)` - A link's seqno/prev is stale
    /// * `Err(TeamLogError::Rejected)` - The submission is invalid
    /// * `Err(TeamLogError::Timeout)` - The outcome is unknown
    async fn post(&self, payload: &SigMultiPayload) -> Result<(), TeamLogError<Self::Error>>;
}
