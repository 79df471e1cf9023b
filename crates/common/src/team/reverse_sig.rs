//! Reverse signatures
//!
//! A link that introduces a per-team key is signed twice. The new per-team
//! signing key signs the canonical body with `reverse_sig` set to `null`,
//! the signature is spliced into `body.team.per_team_key.reverse_sig`, and
//! the device key then signs the outer link over the completed body.
//!
//! The stages are separate values so the body cannot change between the
//! two passes:
//!
//! ```text
//! UnsignedBody --sign_reverse--> BodyWithReverseSig --build--> SignedLink
//! ```

use crate::codec::{canonical_json, CodecError};
use crate::crypto::{sig, Kid, SigError, SigningSecretKey};
use crate::sigchain::{LinkError, SigchainLinkBuilder, SignedLink};

use super::section::InnerLink;

#[derive(Debug, thiserror::Error)]
pub enum ReverseSigError {
    #[error("body introduces no per-team key")]
    NoPerTeamKey,
    #[error("body already carries a reverse signature")]
    AlreadySigned,
    #[error("body has no reverse signature")]
    Missing,
    #[error("reverse signature key {found} is not the body's per-team signing key {expected}")]
    WrongKey { expected: Kid, found: Kid },
    #[error("inner body is not in canonical form")]
    NotCanonical,
    #[error("malformed inner body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("signature error: {0}")]
    Sig(#[from] SigError),
}

/// A complete body whose per-team key section has no reverse signature yet
#[derive(Debug, Clone)]
pub struct UnsignedBody {
    inner: InnerLink,
}

impl UnsignedBody {
    pub fn new(inner: InnerLink) -> Result<Self, ReverseSigError> {
        let per_team_key = inner
            .team()
            .per_team_key
            .as_ref()
            .ok_or(ReverseSigError::NoPerTeamKey)?;
        if per_team_key.reverse_sig.is_some() {
            return Err(ReverseSigError::AlreadySigned);
        }
        Ok(Self { inner })
    }

    pub fn inner(&self) -> &InnerLink {
        &self.inner
    }

    /// The bytes the reverse signature covers
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, ReverseSigError> {
        Ok(canonical_json(&self.inner)?)
    }

    /// Sign with the per-team signing key the body names
    pub fn sign_reverse(self, key: &SigningSecretKey) -> Result<BodyWithReverseSig, ReverseSigError> {
        let expected = signing_kid(&self.inner)?;
        if key.kid() != expected {
            return Err(ReverseSigError::WrongKey {
                expected,
                found: key.kid(),
            });
        }
        let reverse_sig = sig::sign_detached(key, &self.canonical_bytes()?)?;

        let mut inner = self.inner;
        if let Some(per_team_key) = inner.body.team.per_team_key.as_mut() {
            per_team_key.reverse_sig = Some(reverse_sig);
        }
        let canonical = canonical_json(&inner)?;
        Ok(BodyWithReverseSig { inner, canonical })
    }
}

/// A body with its reverse signature in place, ready for the device
/// signature
#[derive(Debug, Clone)]
pub struct BodyWithReverseSig {
    inner: InnerLink,
    canonical: Vec<u8>,
}

impl BodyWithReverseSig {
    pub fn inner(&self) -> &InnerLink {
        &self.inner
    }

    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical
    }

    /// Sign the outer link over this body with the device key
    pub fn build(
        self,
        builder: &SigchainLinkBuilder,
        device: &SigningSecretKey,
    ) -> Result<SignedLink, LinkError> {
        builder.build_from_canonical(self.canonical, device)
    }
}

fn signing_kid(inner: &InnerLink) -> Result<Kid, ReverseSigError> {
    inner
        .team()
        .per_team_key
        .as_ref()
        .map(|ptk| ptk.signing_kid)
        .ok_or(ReverseSigError::NoPerTeamKey)
}

/// Check the reverse signature embedded in a posted inner body.
///
/// The body must be canonical. The signature is checked against the
/// `signing_kid` named in the same per-team key section, over the body with
/// `reverse_sig` nulled out.
pub fn verify_reverse_sig(sig_inner: &[u8]) -> Result<Kid, ReverseSigError> {
    let inner: InnerLink = serde_json::from_slice(sig_inner)?;
    if canonical_json(&inner)? != sig_inner {
        return Err(ReverseSigError::NotCanonical);
    }
    let expected = signing_kid(&inner)?;

    let mut unsigned = inner;
    let reverse_sig = unsigned
        .body
        .team
        .per_team_key
        .as_mut()
        .and_then(|ptk| ptk.reverse_sig.take())
        .ok_or(ReverseSigError::Missing)?;

    let info = sig::decode(&reverse_sig)?;
    info.verify_with_kid(&canonical_json(&unsigned)?, &expected)?;
    Ok(expected)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::PerTeamKeySeed;
    use crate::sigchain::{LinkPosition, LinkType};
    use crate::team::id::TeamId;
    use crate::team::name::TeamName;
    use crate::team::per_team_key::PerTeamKeyPair;
    use crate::team::section::{SignerKey, TeamMembers, TeamSection, UserVersion, DEFAULT_HOST};

    fn body(pair: &PerTeamKeyPair, device: &SigningSecretKey) -> InnerLink {
        let name = TeamName::parse_root("acme").unwrap();
        let team = TeamSection {
            id: TeamId::root_from_name(&name, false),
            name: Some(name),
            parent: None,
            subteam: None,
            members: Some(TeamMembers::sole_owner(UserVersion::new("u1", 1))),
            per_team_key: Some(pair.section()),
            entropy: None,
            public: false,
            implicit: false,
        };
        let key = SignerKey {
            eldest_kid: None,
            host: DEFAULT_HOST.to_string(),
            kid: device.kid(),
            uid: "u1".to_string(),
            username: "alice".to_string(),
        };
        InnerLink::new(LinkType::TeamRoot, key, team, 1, None, 1_700_000_000)
    }

    fn fixture() -> (PerTeamKeyPair, SigningSecretKey) {
        let pair = PerTeamKeyPair::from_seed(&PerTeamKeySeed::generate().unwrap(), 1).unwrap();
        (pair, SigningSecretKey::generate().unwrap())
    }

    #[test]
    fn test_reverse_sig_verifies_under_embedded_kid() {
        let (pair, device) = fixture();
        let signed = UnsignedBody::new(body(&pair, &device))
            .unwrap()
            .sign_reverse(pair.signing_key())
            .unwrap();
        let kid = verify_reverse_sig(signed.canonical_bytes()).unwrap();
        assert_eq!(kid, pair.signing_key().kid());
    }

    #[test]
    fn test_mutating_another_field_breaks_reverse_sig() {
        let (pair, device) = fixture();
        let signed = UnsignedBody::new(body(&pair, &device))
            .unwrap()
            .sign_reverse(pair.signing_key())
            .unwrap();

        let mut tampered = signed.inner().clone();
        tampered.ctime += 1;
        let bytes = canonical_json(&tampered).unwrap();
        assert!(matches!(
            verify_reverse_sig(&bytes),
            Err(ReverseSigError::Sig(SigError::Invalid))
        ));

        let mut tampered = signed.inner().clone();
        tampered.body.team.members = Some(TeamMembers::sole_owner(UserVersion::new("mallory", 1)));
        assert!(verify_reverse_sig(&canonical_json(&tampered).unwrap()).is_err());
    }

    #[test]
    fn test_only_the_named_key_may_sign() {
        let (pair, device) = fixture();
        let result = UnsignedBody::new(body(&pair, &device))
            .unwrap()
            .sign_reverse(&device);
        assert!(matches!(result, Err(ReverseSigError::WrongKey { .. })));
    }

    #[test]
    fn test_substituted_key_is_detected() {
        let (pair, device) = fixture();
        let other = PerTeamKeyPair::from_seed(&PerTeamKeySeed::generate().unwrap(), 1).unwrap();
        let signed = UnsignedBody::new(body(&pair, &device))
            .unwrap()
            .sign_reverse(pair.signing_key())
            .unwrap();

        let mut swapped = signed.inner().clone();
        if let Some(ptk) = swapped.body.team.per_team_key.as_mut() {
            ptk.signing_kid = other.signing_key().kid();
        }
        assert!(matches!(
            verify_reverse_sig(&canonical_json(&swapped).unwrap()),
            Err(ReverseSigError::Sig(SigError::WrongKid { .. }))
        ));
    }

    #[test]
    fn test_stage_preconditions() {
        let (pair, device) = fixture();
        let mut no_key = body(&pair, &device);
        no_key.body.team.per_team_key = None;
        assert!(matches!(
            UnsignedBody::new(no_key),
            Err(ReverseSigError::NoPerTeamKey)
        ));

        let mut already = body(&pair, &device);
        if let Some(ptk) = already.body.team.per_team_key.as_mut() {
            ptk.reverse_sig = Some("sig".to_string());
        }
        assert!(matches!(
            UnsignedBody::new(already),
            Err(ReverseSigError::AlreadySigned)
        ));

        let unsigned = canonical_json(&body(&pair, &device)).unwrap();
        assert!(matches!(
            verify_reverse_sig(&unsigned),
            Err(ReverseSigError::Missing)
        ));
    }

    #[test]
    fn test_build_signs_with_device_key() {
        let (pair, device) = fixture();
        let signed = UnsignedBody::new(body(&pair, &device))
            .unwrap()
            .sign_reverse(pair.signing_key())
            .unwrap();
        let expected = signed.canonical_bytes().to_vec();
        let link = signed
            .build(
                &SigchainLinkBuilder::new(LinkType::TeamRoot, LinkPosition::head()),
                &device,
            )
            .unwrap();
        assert_eq!(link.sig_inner().as_bytes(), expected.as_slice());
        assert_eq!(link.signing_kid(), &device.kid());
    }
}
