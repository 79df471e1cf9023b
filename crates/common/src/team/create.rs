use std::fmt::Display;

use base64::{engine::general_purpose::STANDARD, Engine};

use super::boxes::{distribute, BoxDistributionError, Recipient, SecretBoxSet};
use super::id::{TeamId, TeamIdError};
use super::name::{TeamName, TeamNameError};
use super::payload::{PublicKeys, SigMultiItem, SigMultiPayload};
use super::per_team_key::PerTeamKeyPair;
use super::reverse_sig::{ReverseSigError, UnsignedBody};
use super::section::{
    now_unix, InnerLink, SignerKey, SubteamRef, TeamMembers, TeamParent, TeamSection,
    UserVersion, DEFAULT_HOST,
};
use crate::crypto::{
    EncryptionPublicKey, EncryptionSecretKey, Kid, PerTeamKeySeed, SeedError, SigningSecretKey,
};
use crate::sigchain::{
    LinkError, LinkId, LinkPosition, LinkType, SeqType, Seqno, SigchainLinkBuilder, SignedLink,
};
use crate::team_log::{ChainTip, ChainTipProvider, TeamLogError, TeamPoster};

/// Generation of the first per-team key of every team
pub const FIRST_GENERATION: u32 = 1;
const ENTROPY_SIZE: usize = 18;

/// The creating device's keys
#[derive(Debug, Clone)]
pub struct DeviceKeys {
    /// Signs outer links
    pub signing: SigningSecretKey,
    /// Sender side of every box
    pub encryption: EncryptionSecretKey,
}

/// The creator's current per-user encryption key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerUserKey {
    pub public: EncryptionPublicKey,
    pub generation: u32,
}

/// Who is creating the team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfIdentity {
    pub uid: String,
    pub username: String,
    pub eldest_seqno: Seqno,
    pub eldest_kid: Option<Kid>,
    /// Needed to receive the creator's own box
    pub per_user_key: Option<PerUserKey>,
}

impl SelfIdentity {
    pub fn user_version(&self) -> UserVersion {
        UserVersion::new(self.uid.clone(), self.eldest_seqno)
    }

    fn recipient(&self) -> Result<Recipient, CreateError> {
        if self.uid.is_empty() {
            return Err(CreateError::Precondition("identity has no uid".to_string()));
        }
        let puk = self.per_user_key.ok_or_else(|| {
            CreateError::Precondition(format!("{} has no per-user key", self.username))
        })?;
        Ok(Recipient::new(self.uid.clone(), puk.public, puk.generation))
    }

    fn signer_key(&self, device: &DeviceKeys) -> SignerKey {
        SignerKey {
            eldest_kid: self.eldest_kid,
            host: DEFAULT_HOST.to_string(),
            kid: device.signing.kid(),
            uid: self.uid.clone(),
            username: self.username.clone(),
        }
    }
}

/// The team a subteam is created under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentTeam {
    pub id: TeamId,
    pub name: TeamName,
}

impl ParentTeam {
    /// A root team, whose id follows from its name
    pub fn root(name: &str, public: bool) -> Result<Self, TeamNameError> {
        let name = TeamName::parse_root(name)?;
        Ok(Self {
            id: TeamId::root_from_name(&name, public),
            name,
        })
    }
}

/// What a failed submission did to the server's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Nothing was applied; safe to retry with fresh randomness
    NothingHappened,
    /// The server may have applied the submission
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("team name error: {0}")]
    Name(#[from] TeamNameError),
    #[error("team id error: {0}")]
    Id(#[from] TeamIdError),
    #[error("seed error: {0}")]
    Seed(#[from] SeedError),
    #[error("box error: {0}")]
    Box(#[from] BoxDistributionError),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("reverse signature error: {0}")]
    ReverseSig(#[from] ReverseSigError),
    /// The chain moved underneath the submission; rebuild from a fresh tip
    #[error("chain conflict: {0}")]
    ChainConflict(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
    /// The server may have accepted the submission
    #[error("submission outcome unknown: {0}")]
    UnknownOutcome(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl CreateError {
    pub fn outcome(&self) -> SubmissionOutcome {
        match self {
            CreateError::UnknownOutcome(_) => SubmissionOutcome::Unknown,
            _ => SubmissionOutcome::NothingHappened,
        }
    }

    pub fn is_chain_conflict(&self) -> bool {
        matches!(self, CreateError::ChainConflict(_))
    }

    fn from_log<T: Display>(err: TeamLogError<T>) -> Self {
        match err {
            TeamLogError::Provider(e) => CreateError::Transport(e.to_string()),
            TeamLogError::TeamNotFound(id) => {
                CreateError::Precondition(format!("team {} not found", id))
            }
            TeamLogError::Conflict(msg) => CreateError::ChainConflict(msg),
            TeamLogError::Rejected(msg) => CreateError::Rejected(msg),
            TeamLogError::Timeout => {
                CreateError::UnknownOutcome("no response from the server".to_string())
            }
        }
    }

    /// Like `from_log`, for reads: nothing was submitted, so a timeout
    ///  cannot leave anything behind
    fn from_tip_read<T: Display>(err: TeamLogError<T>) -> Self {
        match err {
            TeamLogError::Timeout => {
                CreateError::Transport("timed out reading the parent tip".to_string())
            }
            other => CreateError::from_log(other),
        }
    }
}

/// A root team that was accepted by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTeam {
    pub id: TeamId,
    pub name: TeamName,
    pub link_ids: Vec<LinkId>,
    pub generation: u32,
}

/// A subteam that was accepted by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSubteam {
    pub id: TeamId,
    pub name: TeamName,
    pub parent_id: TeamId,
    /// Seqno of the parent's `new_subteam` link
    pub parent_seqno: Seqno,
    pub parent_link_id: LinkId,
    pub head_link_id: LinkId,
    pub generation: u32,
}

/// Fresh key material for one new per-team key generation, boxed to the
/// creator
struct NewTeamKey {
    pair: PerTeamKeyPair,
    box_set: SecretBoxSet,
}

impl NewTeamKey {
    fn generate(identity: &SelfIdentity, device: &DeviceKeys) -> Result<Self, CreateError> {
        let recipient = identity.recipient()?;
        let seed = PerTeamKeySeed::generate()?;
        let pair = PerTeamKeyPair::from_seed(&seed, FIRST_GENERATION)?;
        let box_set = distribute(&seed, FIRST_GENERATION, &device.encryption, &[recipient])?;
        Ok(Self { pair, box_set })
    }

    fn public_keys(&self) -> PublicKeys {
        PublicKeys {
            encryption: self.pair.encryption_public().kid(),
            signing: self.pair.signing_public().kid(),
        }
    }

    /// Reverse-sign `inner` with the new key, then sign the link with the
    ///  device key
    fn sign_head(
        &self,
        inner: InnerLink,
        builder: &SigchainLinkBuilder,
        device: &DeviceKeys,
    ) -> Result<SignedLink, CreateError> {
        let body = UnsignedBody::new(inner)?.sign_reverse(self.pair.signing_key())?;
        Ok(body.build(builder, &device.signing)?)
    }
}

fn generate_entropy() -> Result<String, SeedError> {
    let mut buff = [0u8; ENTROPY_SIZE];
    getrandom::getrandom(&mut buff)
        .map_err(|e| anyhow::anyhow!("failed to generate entropy: {}", e))?;
    Ok(STANDARD.encode(buff))
}

/// Build the submission creating root team `name`
fn build_root_team(
    name: &TeamName,
    public: bool,
    identity: &SelfIdentity,
    device: &DeviceKeys,
    ctime: u64,
) -> Result<(SigMultiPayload, LinkId), CreateError> {
    let key = NewTeamKey::generate(identity, device)?;
    let id = TeamId::root_from_name(name, public);
    let seq_type = SeqType::for_team(public);

    let section = TeamSection {
        id,
        name: Some(name.clone()),
        parent: None,
        subteam: None,
        members: Some(TeamMembers::sole_owner(identity.user_version())),
        per_team_key: Some(key.pair.section()),
        entropy: None,
        public,
        implicit: false,
    };
    let position = LinkPosition::head();
    let inner = InnerLink::new(
        LinkType::TeamRoot,
        identity.signer_key(device),
        section,
        position.seqno(),
        position.prev(),
        ctime,
    );
    let builder = SigchainLinkBuilder::new(LinkType::TeamRoot, position).seq_type(seq_type);
    let link = key.sign_head(inner, &builder, device)?;

    tracing::debug!(team_id = %id, link_id = %link.link_id(), "built root team link");

    let payload = SigMultiPayload {
        sigs: vec![SigMultiItem::new(&link, seq_type, id, Some(key.public_keys()))],
        per_team_key: key.box_set,
    };
    Ok((payload, link.link_id()))
}

/// Create a root team with the caller as its sole owner.
///
/// Success claims the name: the team's id is derived from it.
pub async fn create_root_team<P: TeamPoster>(
    name: &str,
    public: bool,
    identity: &SelfIdentity,
    device: &DeviceKeys,
    poster: &P,
) -> Result<CreatedTeam, CreateError> {
    let name = TeamName::parse_root(name)?;
    tracing::info!(team = %name, public, "creating root team");

    let (payload, link_id) = build_root_team(&name, public, identity, device, now_unix())?;
    poster.post(&payload).await.map_err(CreateError::from_log)?;

    let id = TeamId::root_from_name(&name, public);
    tracing::info!(team = %name, team_id = %id, "created root team");
    Ok(CreatedTeam {
        id,
        name,
        link_ids: vec![link_id],
        generation: FIRST_GENERATION,
    })
}

/// Build the submission creating subteam `name` under `parent`, against
/// the parent's `tip`
fn build_subteam(
    parent: &ParentTeam,
    name: &TeamName,
    tip: &ChainTip,
    identity: &SelfIdentity,
    device: &DeviceKeys,
    ctime: u64,
) -> Result<(SigMultiPayload, CreatedSubteam), CreateError> {
    let public = parent.id.is_public();
    let seq_type = SeqType::for_team(public);
    let id = TeamId::generate_subteam(public)?;
    let key = NewTeamKey::generate(identity, device)?;
    let signer = identity.signer_key(device);

    // The parent's registration of the child
    let parent_position = LinkPosition::after(tip.seqno, tip.link_id)?;
    let parent_section = TeamSection {
        id: parent.id,
        name: None,
        parent: None,
        subteam: Some(SubteamRef {
            id,
            name: name.clone(),
        }),
        members: None,
        per_team_key: None,
        entropy: Some(generate_entropy()?),
        public,
        implicit: false,
    };
    let parent_inner = InnerLink::new(
        LinkType::NewSubteam,
        signer.clone(),
        parent_section,
        parent_position.seqno(),
        parent_position.prev(),
        ctime,
    );
    let parent_link = SigchainLinkBuilder::new(LinkType::NewSubteam, parent_position)
        .seq_type(seq_type)
        .build(&parent_inner, &device.signing)?;

    // The child's first link
    let head_position = LinkPosition::head();
    let head_section = TeamSection {
        id,
        name: Some(name.clone()),
        parent: Some(TeamParent {
            id: parent.id,
            seqno: parent_position.seqno(),
            seq_type,
        }),
        subteam: None,
        members: Some(TeamMembers::sole_admin(identity.user_version())),
        per_team_key: Some(key.pair.section()),
        entropy: None,
        public,
        implicit: false,
    };
    let head_inner = InnerLink::new(
        LinkType::SubteamHead,
        signer,
        head_section,
        head_position.seqno(),
        head_position.prev(),
        ctime,
    );
    let builder = SigchainLinkBuilder::new(LinkType::SubteamHead, head_position).seq_type(seq_type);
    let head_link = key.sign_head(head_inner, &builder, device)?;

    tracing::debug!(
        parent_id = %parent.id,
        parent_seqno = parent_position.seqno(),
        parent_link_id = %parent_link.link_id(),
        team_id = %id,
        head_link_id = %head_link.link_id(),
        "built subteam links"
    );

    let created = CreatedSubteam {
        id,
        name: name.clone(),
        parent_id: parent.id,
        parent_seqno: parent_position.seqno(),
        parent_link_id: parent_link.link_id(),
        head_link_id: head_link.link_id(),
        generation: FIRST_GENERATION,
    };
    let payload = SigMultiPayload {
        sigs: vec![
            SigMultiItem::new(&parent_link, seq_type, parent.id, None),
            SigMultiItem::new(&head_link, seq_type, id, Some(key.public_keys())),
        ],
        per_team_key: key.box_set,
    };
    Ok((payload, created))
}

/// Create subteam `name` under `parent`, with the caller as its sole admin.
///
/// Reads the parent's tip once and submits the parent's `new_subteam` link
/// and the child's head link together. If another writer extends the
/// parent first, this fails with [`CreateError::ChainConflict`]; see
/// [`create_subteam_with_retry`].
pub async fn create_subteam<C: ChainTipProvider, P: TeamPoster>(
    parent: &ParentTeam,
    name: &str,
    identity: &SelfIdentity,
    device: &DeviceKeys,
    tips: &C,
    poster: &P,
) -> Result<CreatedSubteam, CreateError> {
    let name = parent.name.append(name)?;
    // Fail before touching the network
    identity.recipient()?;
    tracing::info!(team = %name, parent_id = %parent.id, "creating subteam");

    let tip = tips
        .tip(&parent.id)
        .await
        .map_err(CreateError::from_tip_read)?;
    let (payload, created) = build_subteam(parent, &name, &tip, identity, device, now_unix())?;
    poster.post(&payload).await.map_err(CreateError::from_log)?;

    tracing::info!(team = %name, team_id = %created.id, "created subteam");
    Ok(created)
}

/// [`create_subteam`], re-reading the parent tip and rebuilding from fresh
/// randomness after each chain conflict, up to `max_attempts` times.
pub async fn create_subteam_with_retry<C: ChainTipProvider, P: TeamPoster>(
    parent: &ParentTeam,
    name: &str,
    identity: &SelfIdentity,
    device: &DeviceKeys,
    tips: &C,
    poster: &P,
    max_attempts: u32,
) -> Result<CreatedSubteam, CreateError> {
    if max_attempts == 0 {
        return Err(CreateError::Precondition(
            "max_attempts must be at least 1".to_string(),
        ));
    }
    let mut attempt = 1;
    loop {
        match create_subteam(parent, name, identity, device, tips, poster).await {
            Err(e) if e.is_chain_conflict() && attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, error = %e, "parent chain moved, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}
