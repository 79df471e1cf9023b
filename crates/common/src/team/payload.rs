use serde::{Deserialize, Serialize};

use super::boxes::SecretBoxSet;
use super::id::TeamId;
use super::reverse_sig::{verify_reverse_sig, ReverseSigError};
use super::section::InnerLink;
use crate::crypto::Kid;
use crate::sigchain::{verify_link, LinkError, LinkId, LinkType, SeqType, Seqno, SignedLink, VerifiedLink};

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("reverse signature error: {0}")]
    ReverseSig(#[from] ReverseSigError),
    #[error("malformed inner body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("submission item disagrees with its inner body: {0}")]
    Inconsistent(String),
}

/// The per-team public keys a link introduces, exposed next to it so the
/// server can index them without parsing the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeys {
    pub encryption: Kid,
    pub signing: Kid,
}

/// One signed link as submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigMultiItem {
    pub sig: String,
    pub signing_kid: Kid,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub seq_type: SeqType,
    pub sig_inner: String,
    pub team_id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_keys: Option<PublicKeys>,
}

impl SigMultiItem {
    pub fn new(
        link: &SignedLink,
        seq_type: SeqType,
        team_id: TeamId,
        public_keys: Option<PublicKeys>,
    ) -> Self {
        Self {
            sig: link.sig().to_string(),
            signing_kid: *link.signing_kid(),
            link_type: link.link_type(),
            seq_type,
            sig_inner: link.sig_inner().to_string(),
            team_id,
            public_keys,
        }
    }

    /// Parse the inner body
    pub fn inner(&self) -> Result<InnerLink, PayloadError> {
        Ok(serde_json::from_str(&self.sig_inner)?)
    }

    /// Check this item as a team chain reader would.
    ///
    /// Verifies the link itself against `tip` (see [`verify_link`]), that the
    /// inner body agrees with the item's type and team, and, for links that
    /// introduce a per-team key, the reverse signature and exposed public
    /// keys.
    pub fn verify(&self, tip: Option<(Seqno, LinkId)>) -> Result<VerifiedLink, PayloadError> {
        let verified = verify_link(&self.sig, &self.signing_kid, &self.sig_inner, tip)?;
        let inner = self.inner()?;

        if inner.link_type() != self.link_type {
            return Err(PayloadError::Inconsistent(format!(
                "item type {} but body type {}",
                self.link_type,
                inner.link_type()
            )));
        }
        if inner.team().id != self.team_id {
            return Err(PayloadError::Inconsistent(format!(
                "item team {} but body team {}",
                self.team_id,
                inner.team().id
            )));
        }
        if inner.body.key.kid != self.signing_kid {
            return Err(PayloadError::Inconsistent(
                "body key is not the signing key".to_string(),
            ));
        }
        if inner.seqno != verified.outer.seqno || inner.prev != verified.outer.prev {
            return Err(PayloadError::Inconsistent(
                "body position disagrees with outer link".to_string(),
            ));
        }

        match (&inner.team().per_team_key, &self.public_keys) {
            (Some(ptk), Some(keys)) if self.link_type.introduces_per_team_key() => {
                if keys.signing != ptk.signing_kid || keys.encryption != ptk.encryption_kid {
                    return Err(PayloadError::Inconsistent(
                        "public keys disagree with per-team key section".to_string(),
                    ));
                }
                verify_reverse_sig(self.sig_inner.as_bytes())?;
            }
            (None, None) if !self.link_type.introduces_per_team_key() => {}
            _ => {
                return Err(PayloadError::Inconsistent(format!(
                    "unexpected per-team key layout for {}",
                    self.link_type
                )));
            }
        }

        Ok(verified)
    }
}

/// Everything one team creation submits, in one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigMultiPayload {
    pub sigs: Vec<SigMultiItem>,
    pub per_team_key: SecretBoxSet,
}
