//! # Teams
//!
//! Creation of team sigchains. A team's chain starts with a head link that
//! names its members and its first per-team key; subteams are additionally
//! registered by a `team.new_subteam` link on their parent's chain.
//!
//! Every link that introduces a per-team key is submitted with a
//! [`SecretBoxSet`] sealing that key's seed to each member, and carries a
//! reverse signature made by the new key over the body that names it.
//!
//! ```ignore
//! let team = create_root_team("acme", false, &identity, &device, &poster).await?;
//! let parent = ParentTeam::root("acme", false)?;
//! let eng = create_subteam_with_retry(&parent, "eng", &identity, &device, &tips, &poster, 3).await?;
//! ```

mod boxes;
mod create;
mod id;
mod name;
mod payload;
mod per_team_key;
mod reverse_sig;
mod section;

pub use boxes::{distribute, BoxDistributionError, CiphertextRecord, Recipient, SecretBoxSet, BOX_VERSION};
pub use create::{
    create_root_team, create_subteam, create_subteam_with_retry, CreateError, CreatedSubteam,
    CreatedTeam, DeviceKeys, ParentTeam, PerUserKey, SelfIdentity, SubmissionOutcome,
    FIRST_GENERATION,
};
pub use id::{TeamId, TeamIdError, TEAM_ID_SIZE};
pub use name::{TeamName, TeamNameError};
pub use payload::{PayloadError, PublicKeys, SigMultiItem, SigMultiPayload};
pub use per_team_key::PerTeamKeyPair;
pub use reverse_sig::{verify_reverse_sig, BodyWithReverseSig, ReverseSigError, UnsignedBody};
pub use section::{
    now_unix, ClientInfo, InnerLink, LinkBody, PerTeamKeySection, SignerKey, SubteamRef,
    TeamMembers, TeamParent, TeamSection, UserVersion, DEFAULT_HOST,
};
