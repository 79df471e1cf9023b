use clap::Args;

use common::team::{
    create_subteam_with_retry, CreateError, ParentTeam, SubmissionOutcome, TeamId, TeamName,
};

use crate::api::ApiError;
use crate::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Subteam {
    /// Full name of the parent team, e.g. `acme` or `acme.eng`
    pub parent: String,

    /// Name of the new subteam, relative to the parent
    pub name: String,

    /// Hex id of the parent. Required when the parent is itself a subteam,
    /// since only root team ids follow from the name.
    #[arg(long)]
    pub parent_id: Option<String>,

    /// The parent is a public root team
    #[arg(long)]
    pub public: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SubteamError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    #[error("invalid parent: {0}")]
    Parent(String),

    #[error("subteam creation failed: {0}")]
    Create(CreateError),

    #[error("subteam creation outcome unknown, check whether it exists before retrying: {0}")]
    Unknown(CreateError),
}

impl From<CreateError> for SubteamError {
    fn from(e: CreateError) -> Self {
        match e.outcome() {
            SubmissionOutcome::Unknown => SubteamError::Unknown(e),
            SubmissionOutcome::NothingHappened => SubteamError::Create(e),
        }
    }
}

impl Subteam {
    fn parent_team(&self) -> Result<ParentTeam, SubteamError> {
        let name =
            TeamName::parse(&self.parent).map_err(|e| SubteamError::Parent(e.to_string()))?;
        match &self.parent_id {
            Some(hex) => {
                let id = TeamId::from_hex(hex).map_err(|e| SubteamError::Parent(e.to_string()))?;
                if id.is_subteam() == name.is_root() {
                    return Err(SubteamError::Parent(format!(
                        "id {} does not match the shape of {}",
                        id, name
                    )));
                }
                Ok(ParentTeam { id, name })
            }
            None if name.is_root() => ParentTeam::root(name.as_str(), self.public)
                .map_err(|e| SubteamError::Parent(e.to_string())),
            None => Err(SubteamError::Parent(format!(
                "{} is a subteam, pass its id with --parent-id",
                name
            ))),
        }
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Subteam {
    type Error = SubteamError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let parent = self.parent_team()?;
        let state = ctx.load_state()?;
        let device = state.load_device_keys()?;
        let identity = state.load_identity()?;
        let team_log = ctx.team_log(&state)?;

        let created = create_subteam_with_retry(
            &parent,
            &self.name,
            &identity,
            &device,
            &team_log,
            &team_log,
            state.config.max_attempts,
        )
        .await?;

        Ok(format!(
            "Created subteam {}\n - id: {}\n - parent: {} at seqno {}\n - per-team key generation: {}",
            created.name, created.id, created.parent_id, created.parent_seqno, created.generation
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subteam(parent: &str, parent_id: Option<&str>) -> Subteam {
        Subteam {
            parent: parent.to_string(),
            name: "eng".to_string(),
            parent_id: parent_id.map(str::to_string),
            public: false,
        }
    }

    #[test]
    fn test_root_parent_id_from_name() {
        let parent = subteam("Acme", None).parent_team().unwrap();
        assert_eq!(parent.name.as_str(), "acme");
        assert!(!parent.id.is_subteam());
        assert!(!parent.id.is_public());
    }

    #[test]
    fn test_nested_parent_requires_id() {
        assert!(matches!(
            subteam("acme.eng", None).parent_team(),
            Err(SubteamError::Parent(_))
        ));

        let id = TeamId::generate_subteam(false).unwrap();
        let parent = subteam("acme.eng", Some(&id.to_hex()))
            .parent_team()
            .unwrap();
        assert_eq!(parent.id, id);

        // a root-shaped id for a nested name is refused
        let root = TeamId::root_from_name(&TeamName::parse_root("acme").unwrap(), false);
        assert!(matches!(
            subteam("acme.eng", Some(&root.to_hex())).parent_team(),
            Err(SubteamError::Parent(_))
        ));
    }

    #[test]
    fn test_unknown_outcome_is_distinct() {
        assert!(matches!(
            SubteamError::from(CreateError::UnknownOutcome("timeout".into())),
            SubteamError::Unknown(_)
        ));
        assert!(matches!(
            SubteamError::from(CreateError::ChainConflict("stale".into())),
            SubteamError::Create(_)
        ));
    }
}
