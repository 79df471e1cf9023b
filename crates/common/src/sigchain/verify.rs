use super::link::{LinkId, OuterLink, Seqno};
use super::LinkError;
use crate::crypto::{sig, Kid};

/// The parts of a link that survive verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLink {
    pub outer: OuterLink,
    pub link_id: LinkId,
    pub signer: Kid,
}

/// Check one link the way a chain reader would.
///
/// 1. The signature string verifies, was made by `signing_kid`, and carries
///    the encoded outer link.
/// 2. The inner body hashes to the outer link's `curr`.
/// 3. If `tip` is given, the link extends it (`seqno = tip.0 + 1`,
///    `prev = tip.1`); otherwise it must be a head link.
///
/// Reverse signatures are a team concern and are checked separately.
pub fn verify_link(
    sig_str: &str,
    signing_kid: &Kid,
    sig_inner: &str,
    tip: Option<(Seqno, LinkId)>,
) -> Result<VerifiedLink, LinkError> {
    let info = sig::decode(sig_str)?;
    if info.kid() != signing_kid {
        return Err(crate::crypto::SigError::WrongKid {
            expected: *signing_kid,
            found: *info.kid(),
        }
        .into());
    }
    let encoded_outer = info.verify_attached()?;
    let outer = OuterLink::decode(encoded_outer)?;

    let actual = LinkId::compute(sig_inner.as_bytes());
    if actual != outer.curr {
        return Err(LinkError::HashMismatch {
            expected: outer.curr,
            actual,
        });
    }

    match tip {
        None if outer.seqno != 1 || outer.prev.is_some() => {
            return Err(LinkError::ChainMismatch(format!(
                "expected a head link, got seqno {}",
                outer.seqno
            )));
        }
        Some((tip_seqno, tip_link_id))
            if outer.seqno != tip_seqno.saturating_add(1) || outer.prev != Some(tip_link_id) =>
        {
            return Err(LinkError::ChainMismatch(format!(
                "link at seqno {} does not extend tip at seqno {}",
                outer.seqno, tip_seqno
            )));
        }
        _ => {}
    }

    Ok(VerifiedLink {
        link_id: LinkId::compute(encoded_outer),
        signer: *info.kid(),
        outer,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SigningSecretKey;
    use crate::sigchain::{LinkPosition, LinkType, SigchainLinkBuilder};
    use serde_json::json;

    #[test]
    fn test_verify_chain_of_two() {
        let signer = SigningSecretKey::generate().unwrap();
        let head = SigchainLinkBuilder::new(LinkType::TeamRoot, LinkPosition::head())
            .build(&json!({"n": 1}), &signer)
            .unwrap();
        let next = SigchainLinkBuilder::new(
            LinkType::NewSubteam,
            LinkPosition::after(1, head.link_id()).unwrap(),
        )
        .build(&json!({"n": 2}), &signer)
        .unwrap();

        let verified = verify_link(head.sig(), &signer.kid(), head.sig_inner(), None).unwrap();
        assert_eq!(verified.link_id, head.link_id());
        verify_link(
            next.sig(),
            &signer.kid(),
            next.sig_inner(),
            Some((1, head.link_id())),
        )
        .unwrap();

        // not a head
        assert!(verify_link(next.sig(), &signer.kid(), next.sig_inner(), None).is_err());
        // stale tip
        assert!(verify_link(
            next.sig(),
            &signer.kid(),
            next.sig_inner(),
            Some((1, LinkId::compute(b"other")))
        )
        .is_err());
    }

    #[test]
    fn test_tampered_body_detected() {
        let signer = SigningSecretKey::generate().unwrap();
        let link = SigchainLinkBuilder::new(LinkType::TeamRoot, LinkPosition::head())
            .build(&json!({"name": "acme"}), &signer)
            .unwrap();
        let tampered = link.sig_inner().replace("acme", "acmf");
        assert!(matches!(
            verify_link(link.sig(), &signer.kid(), &tampered, None),
            Err(LinkError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_signer_detected() {
        let signer = SigningSecretKey::generate().unwrap();
        let other = SigningSecretKey::generate().unwrap();
        let link = SigchainLinkBuilder::new(LinkType::TeamRoot, LinkPosition::head())
            .build(&json!({}), &signer)
            .unwrap();
        assert!(verify_link(link.sig(), &other.kid(), link.sig_inner(), None).is_err());
    }
}
