use clap::Args;

use common::team::{create_root_team, CreateError};

use crate::api::ApiError;
use crate::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Create {
    /// Name of the new root team
    pub name: String,

    /// Make the team's chain publicly readable
    #[arg(long)]
    pub public: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TeamCreateError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    #[error("team creation failed: {0}")]
    Create(#[from] CreateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Create {
    type Error = TeamCreateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.load_state()?;
        let device = state.load_device_keys()?;
        let identity = state.load_identity()?;
        let team_log = ctx.team_log(&state)?;

        let created =
            create_root_team(&self.name, self.public, &identity, &device, &team_log).await?;

        let head = created
            .link_ids
            .first()
            .map(|id| id.to_string())
            .unwrap_or_default();
        Ok(format!(
            "Created team {}\n - id: {}\n - head link: {}\n - per-team key generation: {}",
            created.name, created.id, head, created.generation
        ))
    }
}
