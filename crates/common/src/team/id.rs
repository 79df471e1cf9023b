use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::name::TeamName;

/// Size of a team id in bytes
pub const TEAM_ID_SIZE: usize = 16;

const ROOT_PRIVATE_SUFFIX: u8 = 0x24;
const ROOT_PUBLIC_SUFFIX: u8 = 0x2e;
const SUB_PRIVATE_SUFFIX: u8 = 0x25;
const SUB_PUBLIC_SUFFIX: u8 = 0x2f;

#[derive(Debug, thiserror::Error)]
pub enum TeamIdError {
    #[error("team id error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Identifier of a team chain.
///
/// Fifteen bytes of identity followed by one suffix byte recording whether
/// the team is a root team or a subteam, and whether it is public:
///
/// | | private | public |
/// |---|---|---|
/// | root | `0x24` | `0x2e` |
/// | subteam | `0x25` | `0x2f` |
///
/// Root ids are derived from the (lowercased) name, so creating a root team
/// claims its name. Subteam ids are random, since subteams can be renamed
/// and there is no step that reserves an id before the creation links are
/// posted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId([u8; TEAM_ID_SIZE]);

impl TeamId {
    /// The id a root team with this name must have
    pub fn root_from_name(name: &TeamName, public: bool) -> Self {
        let digest = Sha256::digest(name.as_str().to_lowercase().as_bytes());
        let mut buff = [0u8; TEAM_ID_SIZE];
        buff[..TEAM_ID_SIZE - 1].copy_from_slice(&digest[..TEAM_ID_SIZE - 1]);
        buff[TEAM_ID_SIZE - 1] = if public {
            ROOT_PUBLIC_SUFFIX
        } else {
            ROOT_PRIVATE_SUFFIX
        };
        TeamId(buff)
    }

    /// A fresh random subteam id
    pub fn generate_subteam(public: bool) -> Result<Self, TeamIdError> {
        let mut buff = [0u8; TEAM_ID_SIZE];
        getrandom::getrandom(&mut buff[..TEAM_ID_SIZE - 1])
            .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
        buff[TEAM_ID_SIZE - 1] = if public {
            SUB_PUBLIC_SUFFIX
        } else {
            SUB_PRIVATE_SUFFIX
        };
        Ok(TeamId(buff))
    }

    fn suffix(&self) -> u8 {
        self.0[TEAM_ID_SIZE - 1]
    }

    pub fn is_subteam(&self) -> bool {
        matches!(self.suffix(), SUB_PRIVATE_SUFFIX | SUB_PUBLIC_SUFFIX)
    }

    pub fn is_public(&self) -> bool {
        matches!(self.suffix(), ROOT_PUBLIC_SUFFIX | SUB_PUBLIC_SUFFIX)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, TeamIdError> {
        let mut buff = [0u8; TEAM_ID_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("team id hex decode error: {}", hex))?;
        match buff[TEAM_ID_SIZE - 1] {
            ROOT_PRIVATE_SUFFIX | ROOT_PUBLIC_SUFFIX | SUB_PRIVATE_SUFFIX | SUB_PUBLIC_SUFFIX => {
                Ok(TeamId(buff))
            }
            other => Err(anyhow::anyhow!("invalid team id suffix 0x{:02x}", other).into()),
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TeamId({})", self.to_hex())
    }
}

impl Serialize for TeamId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TeamId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        TeamId::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_root_id_is_name_derived() {
        let acme = TeamName::parse("acme").unwrap();
        let id = TeamId::root_from_name(&acme, false);
        assert_eq!(id, TeamId::root_from_name(&TeamName::parse("ACME").unwrap(), false));
        assert!(!id.is_subteam());
        assert!(!id.is_public());
        assert!(id.to_hex().ends_with("24"));

        let digest = Sha256::digest(b"acme");
        assert_eq!(id.to_hex()[..30], hex::encode(&digest[..15]));

        let public = TeamId::root_from_name(&acme, true);
        assert!(public.is_public());
        assert_ne!(id, public);
    }

    #[test]
    fn test_subteam_ids_are_random() {
        let a = TeamId::generate_subteam(false).unwrap();
        let b = TeamId::generate_subteam(false).unwrap();
        assert_ne!(a, b);
        assert!(a.is_subteam());
        assert!(a.to_hex().ends_with("25"));
        assert!(TeamId::generate_subteam(true).unwrap().to_hex().ends_with("2f"));
    }

    #[test]
    fn test_hex_roundtrip_checks_suffix() {
        let id = TeamId::generate_subteam(false).unwrap();
        assert_eq!(TeamId::from_hex(&id.to_hex()).unwrap(), id);
        assert!(TeamId::from_hex("00000000000000000000000000000000").is_err());
        assert!(TeamId::from_hex("24").is_err());
    }
}
