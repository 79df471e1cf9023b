//! # Sigchains
//!
//! A sigchain is an append-only sequence of signed links. Each link has two
//! layers:
//!
//! - an **inner body**, canonical JSON describing what the link does, and
//! - an **outer link**, a compact DAG-CBOR array committing to the inner
//!   body's hash (`curr`), the previous link's id (`prev`), and the link's
//!   position (`seqno`).
//!
//! The outer link is what gets signed. The id of a link is the SHA-256 of
//! its encoded outer link, and the next link's `prev` must equal it. Changing
//! any byte of any body therefore breaks either its own signature or the
//! chain after it.
//!
//! This module knows nothing about teams; it builds and checks individual
//! links. See [`crate::team`] for what goes inside them.

mod builder;
mod link;
mod verify;

pub use builder::{SigchainLinkBuilder, SignedLink};
pub use link::{
    LinkId, LinkPosition, LinkType, OuterLink, SeqType, Seqno, LINK_ID_SIZE, SIGCHAIN_V2,
};
pub use verify::{verify_link, VerifiedLink};

use crate::codec::CodecError;
use crate::crypto::SigError;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// `seqno = 1` must have no `prev`; every later seqno must have one
    #[error("invalid prev for seqno {seqno} (prev present: {prev_present})")]
    InvalidPrev { seqno: Seqno, prev_present: bool },
    #[error("invalid seqno {0}")]
    InvalidSeqno(Seqno),
    #[error("link type {0} has no revoking variant")]
    RevokesUnsupported(LinkType),
    #[error("malformed link: {0}")]
    Malformed(String),
    /// The inner body does not hash to the `curr` the outer link commits to
    #[error("inner body hash mismatch: outer link commits to {expected}, body hashes to {actual}")]
    HashMismatch { expected: LinkId, actual: LinkId },
    /// The outer link does not extend the chain it was checked against
    #[error("link does not follow chain tip: {0}")]
    ChainMismatch(String),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("signature error: {0}")]
    Sig(#[from] SigError),
}
