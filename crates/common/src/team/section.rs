use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::TeamId;
use super::name::TeamName;
use crate::crypto::Kid;
use crate::sigchain::{LinkId, LinkType, SeqType, Seqno};

/// Inner body format version
pub const INNER_BODY_VERSION: u8 = 2;
/// Seconds a team link stays valid for the server to accept it
pub const TEAM_LINK_EXPIRE_IN: u64 = 157_680_000;
/// Host recorded in the signer key section
pub const DEFAULT_HOST: &str = "teamchain.io";

/// A user at a specific account incarnation, rendered `uid%eldest_seqno`.
///
/// The eldest seqno pins the membership to one account reset: if the user
/// resets, the old `UserVersion` no longer names them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserVersion {
    pub uid: String,
    pub eldest_seqno: Seqno,
}

impl UserVersion {
    pub fn new(uid: impl Into<String>, eldest_seqno: Seqno) -> Self {
        Self {
            uid: uid.into(),
            eldest_seqno,
        }
    }
}

impl fmt::Display for UserVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.uid, self.eldest_seqno)
    }
}

impl FromStr for UserVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uid, eldest) = s
            .split_once('%')
            .ok_or_else(|| format!("invalid user version '{}'", s))?;
        if uid.is_empty() {
            return Err(format!("empty uid in user version '{}'", s));
        }
        let eldest_seqno = eldest
            .parse()
            .map_err(|_| format!("invalid eldest seqno in user version '{}'", s))?;
        Ok(Self::new(uid, eldest_seqno))
    }
}

impl Serialize for UserVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UserVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Role lists at creation time.
///
/// All four lists are always serialized; a subteam's empty `owner` list is
/// part of what its head link asserts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembers {
    pub owner: Vec<UserVersion>,
    pub admin: Vec<UserVersion>,
    pub writer: Vec<UserVersion>,
    pub reader: Vec<UserVersion>,
}

impl TeamMembers {
    pub fn sole_owner(owner: UserVersion) -> Self {
        Self {
            owner: vec![owner],
            ..Default::default()
        }
    }

    pub fn sole_admin(admin: UserVersion) -> Self {
        Self {
            admin: vec![admin],
            ..Default::default()
        }
    }
}

/// Public half of one per-team key generation, as named in a link.
///
/// `reverse_sig` serializes as `null` until the reverse signature is
/// spliced in; the null form is exactly what the per-team key signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTeamKeySection {
    pub generation: u32,
    pub encryption_kid: Kid,
    pub signing_kid: Kid,
    pub reverse_sig: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamParent {
    pub id: TeamId,
    /// Seqno of the parent's `new_subteam` link
    pub seqno: Seqno,
    pub seq_type: SeqType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubteamRef {
    pub id: TeamId,
    pub name: TeamName,
}

/// The `team` section of an inner link body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSection {
    pub id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<TeamName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TeamParent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subteam: Option<SubteamRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<TeamMembers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_team_key: Option<PerTeamKeySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<String>,
    pub public: bool,
    pub implicit: bool,
}

/// The device key that signs the outer link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eldest_kid: Option<Kid>,
    pub host: String,
    pub kid: Kid,
    pub uid: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBody {
    pub key: SignerKey,
    pub team: TeamSection,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A complete inner link body.
///
/// Field order is the serialization order, so the canonical JSON of an
/// `InnerLink` is stable. Every field, `ctime` included, is fixed at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerLink {
    pub body: LinkBody,
    pub client: ClientInfo,
    pub ctime: u64,
    pub expire_in: u64,
    pub prev: Option<LinkId>,
    pub seqno: Seqno,
    pub tag: String,
}

impl InnerLink {
    pub fn new(
        link_type: LinkType,
        key: SignerKey,
        team: TeamSection,
        seqno: Seqno,
        prev: Option<LinkId>,
        ctime: u64,
    ) -> Self {
        Self {
            body: LinkBody {
                key,
                team,
                link_type,
                version: INNER_BODY_VERSION,
            },
            client: ClientInfo::default(),
            ctime,
            expire_in: TEAM_LINK_EXPIRE_IN,
            prev,
            seqno,
            tag: "signature".to_string(),
        }
    }

    pub fn team(&self) -> &TeamSection {
        &self.body.team
    }

    pub fn link_type(&self) -> LinkType {
        self.body.link_type
    }
}

/// Current unix time in seconds
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
