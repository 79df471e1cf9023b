use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::LinkError;
use crate::codec::{cbor_decode, cbor_encode, Bytes};

/// Size of a link id (SHA-256)
pub const LINK_ID_SIZE: usize = 32;
/// Outer link format version
pub const SIGCHAIN_V2: u8 = 2;

/// Position of a link within its chain, starting at 1
pub type Seqno = u64;

/// SHA-256 of a canonical encoding.
///
/// Used both as the `curr` hash of an inner body and as the id of a whole
/// link (the hash of its encoded outer link), which is what the next link's
/// `prev` points at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId([u8; LINK_ID_SIZE]);

impl LinkId {
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut buff = [0u8; LINK_ID_SIZE];
        buff.copy_from_slice(&digest);
        LinkId(buff)
    }

    pub fn bytes(&self) -> &[u8; LINK_ID_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, LinkError> {
        let mut buff = [0u8; LINK_ID_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| LinkError::Malformed(format!("link id hex decode error: {}", hex)))?;
        Ok(LinkId(buff))
    }
}

impl From<[u8; LINK_ID_SIZE]> for LinkId {
    fn from(bytes: [u8; LINK_ID_SIZE]) -> Self {
        LinkId(bytes)
    }
}

impl TryFrom<&[u8]> for LinkId {
    type Error = LinkError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != LINK_ID_SIZE {
            return Err(LinkError::Malformed(format!(
                "invalid link id size, expected {}, got {}",
                LINK_ID_SIZE,
                bytes.len()
            )));
        }
        let mut buff = [0u8; LINK_ID_SIZE];
        buff.copy_from_slice(bytes);
        Ok(LinkId(buff))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({})", self.to_hex())
    }
}

impl Serialize for LinkId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LinkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        LinkId::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// The kinds of team link this client produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// First link of a root team's chain
    #[serde(rename = "team.root")]
    TeamRoot,
    /// A parent team's record that a subteam exists
    #[serde(rename = "team.new_subteam")]
    NewSubteam,
    /// First link of a subteam's chain
    #[serde(rename = "team.subteam_head")]
    SubteamHead,
}

impl LinkType {
    /// Legacy (v1) string form, used in inner bodies and submissions
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::TeamRoot => "team.root",
            LinkType::NewSubteam => "team.new_subteam",
            LinkType::SubteamHead => "team.subteam_head",
        }
    }

    /// Numeric type carried by the outer link.
    ///
    /// Team links have no revoking variants, so `has_revokes` must be false.
    pub fn v2_type(&self, has_revokes: bool) -> Result<u8, LinkError> {
        if has_revokes {
            return Err(LinkError::RevokesUnsupported(*self));
        }
        Ok(match self {
            LinkType::TeamRoot => 33,
            LinkType::NewSubteam => 34,
            LinkType::SubteamHead => 38,
        })
    }

    /// Whether links of this type introduce a new per-team key generation
    pub fn introduces_per_team_key(&self) -> bool {
        matches!(self, LinkType::TeamRoot | LinkType::SubteamHead)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which sequence a chain belongs to on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SeqType {
    Public,
    Private,
    SemiPrivate,
}

impl SeqType {
    /// Teams are either public or semi-private
    pub fn for_team(public: bool) -> Self {
        if public {
            SeqType::Public
        } else {
            SeqType::SemiPrivate
        }
    }
}

impl From<SeqType> for u8 {
    fn from(seq_type: SeqType) -> Self {
        match seq_type {
            SeqType::Public => 1,
            SeqType::Private => 2,
            SeqType::SemiPrivate => 3,
        }
    }
}

impl TryFrom<u8> for SeqType {
    type Error = String;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SeqType::Public),
            2 => Ok(SeqType::Private),
            3 => Ok(SeqType::SemiPrivate),
            other => Err(format!("unknown seq type {}", other)),
        }
    }
}

/// Where a new link goes: its seqno and the id of the link before it.
///
/// The only way to obtain one is through [`LinkPosition::new`] (or the
/// helpers built on it), which enforces `seqno = 1 ⇔ prev is absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPosition {
    seqno: Seqno,
    prev: Option<LinkId>,
}

impl LinkPosition {
    /// # Errors
    ///
    /// - `seqno` of zero
    /// - `seqno = 1` with a `prev`
    /// - `seqno > 1` without a `prev`
    pub fn new(seqno: Seqno, prev: Option<LinkId>) -> Result<Self, LinkError> {
        match (seqno, prev) {
            (0, _) => Err(LinkError::InvalidSeqno(0)),
            (1, Some(_)) => Err(LinkError::InvalidPrev {
                seqno,
                prev_present: true,
            }),
            (s, None) if s > 1 => Err(LinkError::InvalidPrev {
                seqno,
                prev_present: false,
            }),
            _ => Ok(Self { seqno, prev }),
        }
    }

    /// Position of the first link of a new chain
    pub fn head() -> Self {
        Self {
            seqno: 1,
            prev: None,
        }
    }

    /// Position directly after a chain tip
    pub fn after(tip_seqno: Seqno, tip_link_id: LinkId) -> Result<Self, LinkError> {
        let seqno = tip_seqno
            .checked_add(1)
            .ok_or(LinkError::InvalidSeqno(tip_seqno))?;
        Self::new(seqno, Some(tip_link_id))
    }

    pub fn seqno(&self) -> Seqno {
        self.seqno
    }

    pub fn prev(&self) -> Option<LinkId> {
        self.prev
    }
}

/// The envelope that is actually signed.
///
/// Encoded as a DAG-CBOR array:
/// `[version, seqno, prev | null, curr, type, seq_type, ignore_if_unsupported]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterLink {
    pub version: u8,
    pub seqno: Seqno,
    pub prev: Option<LinkId>,
    pub curr: LinkId,
    pub link_type: u8,
    pub seq_type: SeqType,
    pub ignore_if_unsupported: bool,
}

type OuterLinkArray = (u8, Seqno, Option<Bytes>, Bytes, u8, u8, bool);

impl OuterLink {
    pub fn encode(&self) -> Result<Vec<u8>, LinkError> {
        let array: OuterLinkArray = (
            self.version,
            self.seqno,
            self.prev.map(|p| Bytes::from(&p.bytes()[..])),
            Bytes::from(&self.curr.bytes()[..]),
            self.link_type,
            self.seq_type.into(),
            self.ignore_if_unsupported,
        );
        Ok(cbor_encode(&array)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LinkError> {
        let (version, seqno, prev, curr, link_type, seq_type, ignore_if_unsupported): OuterLinkArray =
            cbor_decode(bytes)?;
        if version != SIGCHAIN_V2 {
            return Err(LinkError::Malformed(format!(
                "unsupported outer link version {}",
                version
            )));
        }
        let prev = prev.map(|p| LinkId::try_from(p.as_ref())).transpose()?;
        Ok(Self {
            version,
            seqno,
            prev,
            curr: LinkId::try_from(curr.as_ref())?,
            link_type,
            seq_type: SeqType::try_from(seq_type).map_err(LinkError::Malformed)?,
            ignore_if_unsupported,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_position_preconditions() {
        let h = LinkId::compute(b"tip");
        assert!(LinkPosition::new(1, None).is_ok());
        assert!(LinkPosition::new(5, Some(h)).is_ok());
        assert!(matches!(
            LinkPosition::new(1, Some(h)),
            Err(LinkError::InvalidPrev {
                seqno: 1,
                prev_present: true
            })
        ));
        assert!(matches!(
            LinkPosition::new(2, None),
            Err(LinkError::InvalidPrev {
                seqno: 2,
                prev_present: false
            })
        ));
        assert!(matches!(
            LinkPosition::new(0, None),
            Err(LinkError::InvalidSeqno(0))
        ));
    }

    #[test]
    fn test_position_after_tip() {
        let h = LinkId::compute(b"tip");
        let position = LinkPosition::after(4, h).unwrap();
        assert_eq!(position.seqno(), 5);
        assert_eq!(position.prev(), Some(h));
        assert!(LinkPosition::after(u64::MAX, h).is_err());
    }

    #[test]
    fn test_link_types() {
        assert_eq!(LinkType::TeamRoot.v2_type(false).unwrap(), 33);
        assert_eq!(LinkType::NewSubteam.v2_type(false).unwrap(), 34);
        assert_eq!(LinkType::SubteamHead.v2_type(false).unwrap(), 38);
        assert!(LinkType::TeamRoot.v2_type(true).is_err());
        assert!(LinkType::SubteamHead.introduces_per_team_key());
        assert!(!LinkType::NewSubteam.introduces_per_team_key());
        assert_eq!(
            serde_json::to_string(&LinkType::NewSubteam).unwrap(),
            "\"team.new_subteam\""
        );
    }

    #[test]
    fn test_outer_link_encoding() {
        let outer = OuterLink {
            version: SIGCHAIN_V2,
            seqno: 1,
            prev: None,
            curr: LinkId::compute(b"body"),
            link_type: 33,
            seq_type: SeqType::SemiPrivate,
            ignore_if_unsupported: false,
        };
        let encoded = outer.encode().unwrap();
        // 7-element CBOR array
        assert_eq!(encoded[0], 0x87);
        assert_eq!(OuterLink::decode(&encoded).unwrap(), outer);
        assert_eq!(encoded, outer.encode().unwrap());
    }

    #[test]
    fn test_link_id_hex() {
        let id = LinkId::compute(b"x");
        assert_eq!(LinkId::from_hex(&id.to_hex()).unwrap(), id);
        assert!(LinkId::from_hex("abcd").is_err());
    }
}
