use serde::Serialize;

use super::link::{LinkId, LinkPosition, LinkType, OuterLink, SeqType, Seqno, SIGCHAIN_V2};
use super::verify::{verify_link, VerifiedLink};
use super::LinkError;
use crate::codec::canonical_json;
use crate::crypto::{sig, Kid, SigningSecretKey};

/// A finished link: the signed outer link plus the inner body it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    sig: String,
    signing_kid: Kid,
    link_type: LinkType,
    sig_inner: String,
    seqno: Seqno,
    prev: Option<LinkId>,
    curr: LinkId,
    link_id: LinkId,
}

impl SignedLink {
    /// Attached signature string over the encoded outer link
    pub fn sig(&self) -> &str {
        &self.sig
    }

    pub fn signing_kid(&self) -> &Kid {
        &self.signing_kid
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// The canonical inner body, exactly as hashed
    pub fn sig_inner(&self) -> &str {
        &self.sig_inner
    }

    pub fn seqno(&self) -> Seqno {
        self.seqno
    }

    pub fn prev(&self) -> Option<LinkId> {
        self.prev
    }

    /// Hash of the inner body
    pub fn curr(&self) -> LinkId {
        self.curr
    }

    /// Hash of the encoded outer link; the next link's `prev`
    pub fn link_id(&self) -> LinkId {
        self.link_id
    }

    /// Check this link as a reader would, see [`verify_link`]
    pub fn verify(&self, tip: Option<(Seqno, LinkId)>) -> Result<VerifiedLink, LinkError> {
        verify_link(&self.sig, &self.signing_kid, &self.sig_inner, tip)
    }
}

/// Assembles and signs one sigchain link.
///
/// ```ignore
/// let link = SigchainLinkBuilder::new(LinkType::TeamRoot, LinkPosition::head())
///     .seq_type(SeqType::SemiPrivate)
///     .build(&inner_body, &device_signing_key)?;
/// ```
#[derive(Debug, Clone)]
pub struct SigchainLinkBuilder {
    link_type: LinkType,
    position: LinkPosition,
    seq_type: SeqType,
    has_revokes: bool,
    ignore_if_unsupported: bool,
}

impl SigchainLinkBuilder {
    pub fn new(link_type: LinkType, position: LinkPosition) -> Self {
        Self {
            link_type,
            position,
            seq_type: SeqType::SemiPrivate,
            has_revokes: false,
            ignore_if_unsupported: false,
        }
    }

    pub fn seq_type(mut self, seq_type: SeqType) -> Self {
        self.seq_type = seq_type;
        self
    }

    pub fn has_revokes(mut self, has_revokes: bool) -> Self {
        self.has_revokes = has_revokes;
        self
    }

    /// Canonicalize `body` and build a signed link around it
    pub fn build<T: Serialize>(
        &self,
        body: &T,
        signer: &SigningSecretKey,
    ) -> Result<SignedLink, LinkError> {
        let inner = canonical_json(body)?;
        self.build_from_canonical(inner, signer)
    }

    /// Build a signed link around an already-canonical inner body.
    ///
    /// If the body carries top-level `seqno`/`prev` fields they must agree
    /// with the builder's position.
    pub fn build_from_canonical(
        &self,
        inner: Vec<u8>,
        signer: &SigningSecretKey,
    ) -> Result<SignedLink, LinkError> {
        check_inner_position(&inner, &self.position)?;

        let curr = LinkId::compute(&inner);
        let outer = OuterLink {
            version: SIGCHAIN_V2,
            seqno: self.position.seqno(),
            prev: self.position.prev(),
            curr,
            link_type: self.link_type.v2_type(self.has_revokes)?,
            seq_type: self.seq_type,
            ignore_if_unsupported: self.ignore_if_unsupported,
        };
        let encoded_outer = outer.encode()?;
        let signature = sig::sign_attached(signer, &encoded_outer)?;
        let link_id = LinkId::compute(&encoded_outer);

        let sig_inner = String::from_utf8(inner)
            .map_err(|_| LinkError::Malformed("inner body is not utf-8".to_string()))?;

        tracing::debug!(
            link_type = %self.link_type,
            seqno = self.position.seqno(),
            %curr,
            %link_id,
            "built sigchain link"
        );

        Ok(SignedLink {
            sig: signature,
            signing_kid: signer.kid(),
            link_type: self.link_type,
            sig_inner,
            seqno: self.position.seqno(),
            prev: self.position.prev(),
            curr,
            link_id,
        })
    }
}

fn check_inner_position(inner: &[u8], position: &LinkPosition) -> Result<(), LinkError> {
    let value: serde_json::Value = serde_json::from_slice(inner)
        .map_err(|e| LinkError::Malformed(format!("inner body is not json: {}", e)))?;

    if let Some(seqno) = value.get("seqno") {
        if seqno.as_u64() != Some(position.seqno()) {
            return Err(LinkError::ChainMismatch(format!(
                "inner seqno {} disagrees with outer seqno {}",
                seqno,
                position.seqno()
            )));
        }
    }
    if let Some(prev) = value.get("prev") {
        let inner_prev = match prev {
            serde_json::Value::Null => None,
            serde_json::Value::String(hex) => Some(LinkId::from_hex(hex)?),
            other => {
                return Err(LinkError::Malformed(format!("inner prev is {}", other)));
            }
        };
        if inner_prev != position.prev() {
            return Err(LinkError::ChainMismatch(
                "inner prev disagrees with outer prev".to_string(),
            ));
        }
    }
    Ok(())
}
