//! Self-describing signature strings
//!
//! A signature string carries everything a verifier needs besides trust in
//! the key: the signer's [`Kid`], the raw Ed25519 signature, and (for
//! attached signatures) the signed payload itself.
//!
//! ```text
//! base64( dag-cbor( { version: 1, tag: 514, body: { detached, hash_type: 10,
//!                     key, payload?, sig, sig_type: 0 } } ) )
//! ```
//!
//! Outer links are signed *attached*, so the posting endpoint can recover the
//! outer link from the signature alone. Reverse signatures are *detached*:
//! their payload is the body they are embedded in.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};

use super::keys::{KeyError, Kid, SigningPublicKey, SigningSecretKey};
use crate::codec::{cbor_decode, cbor_encode, Bytes, CodecError};

const PACKET_VERSION: u8 = 1;
const PACKET_TAG_SIGNATURE: u16 = 514;
const HASH_TYPE_NONE: u8 = 10;
const SIG_TYPE_ED25519: u8 = 0;

#[derive(Debug, thiserror::Error)]
pub enum SigError {
    #[error("signature error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("signature was made by {found}, expected {expected}")]
    WrongKid { expected: Kid, found: Kid },
    #[error("signature verification failed")]
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SigBody {
    detached: bool,
    hash_type: u8,
    key: Bytes,
    payload: Option<Bytes>,
    sig: Bytes,
    sig_type: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SigPacket {
    version: u8,
    tag: u16,
    body: SigBody,
}

/// A decoded signature string
#[derive(Debug, Clone)]
pub struct SigInfo {
    kid: Kid,
    signature: Signature,
    payload: Option<Vec<u8>>,
}

impl SigInfo {
    pub fn kid(&self) -> &Kid {
        &self.kid
    }

    /// The embedded payload, present only for attached signatures
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Check the signature over `msg` under the embedded key
    pub fn verify(&self, msg: &[u8]) -> Result<(), SigError> {
        let key = SigningPublicKey::from_kid(&self.kid)?;
        key.verify(msg, &self.signature)
            .map_err(|_| SigError::Invalid)
    }

    /// Check an attached signature and return the payload it covers
    pub fn verify_attached(&self) -> Result<&[u8], SigError> {
        let payload = self
            .payload()
            .ok_or_else(|| anyhow::anyhow!("signature has no attached payload"))?;
        self.verify(payload)?;
        Ok(payload)
    }

    /// Like [`SigInfo::verify`], additionally requiring a specific signer
    pub fn verify_with_kid(&self, msg: &[u8], expected: &Kid) -> Result<(), SigError> {
        if &self.kid != expected {
            return Err(SigError::WrongKid {
                expected: *expected,
                found: self.kid,
            });
        }
        self.verify(msg)
    }
}

fn encode(key: &SigningSecretKey, msg: &[u8], attach: bool) -> Result<String, SigError> {
    let signature = key.sign(msg);
    let packet = SigPacket {
        version: PACKET_VERSION,
        tag: PACKET_TAG_SIGNATURE,
        body: SigBody {
            detached: !attach,
            hash_type: HASH_TYPE_NONE,
            key: Bytes::from(key.kid().bytes()),
            payload: attach.then(|| Bytes::from(msg)),
            sig: Bytes(signature.to_bytes().to_vec()),
            sig_type: SIG_TYPE_ED25519,
        },
    };
    Ok(STANDARD.encode(cbor_encode(&packet)?))
}

/// Sign `msg`, embedding it in the signature string
pub fn sign_attached(key: &SigningSecretKey, msg: &[u8]) -> Result<String, SigError> {
    encode(key, msg, true)
}

/// Sign `msg` without embedding it; verifiers must supply it
pub fn sign_detached(key: &SigningSecretKey, msg: &[u8]) -> Result<String, SigError> {
    encode(key, msg, false)
}

/// Decode a signature string without checking it
pub fn decode(sig: &str) -> Result<SigInfo, SigError> {
    let raw = STANDARD
        .decode(sig)
        .map_err(|e| anyhow::anyhow!("signature base64 decode error: {}", e))?;
    let packet: SigPacket = cbor_decode(&raw)?;

    if packet.version != PACKET_VERSION || packet.tag != PACKET_TAG_SIGNATURE {
        return Err(anyhow::anyhow!(
            "unsupported signature packet v{} tag {}",
            packet.version,
            packet.tag
        )
        .into());
    }
    if packet.body.sig_type != SIG_TYPE_ED25519 {
        return Err(anyhow::anyhow!("unsupported sig type {}", packet.body.sig_type).into());
    }
    if packet.body.detached == packet.body.payload.is_some() {
        return Err(anyhow::anyhow!("detached flag disagrees with payload").into());
    }

    let kid = Kid::try_from(packet.body.key.as_ref())?;
    let signature = Signature::from_slice(packet.body.sig.as_ref())
        .map_err(|e| anyhow::anyhow!("malformed signature: {}", e))?;

    Ok(SigInfo {
        kid,
        signature,
        payload: packet.body.payload.map(|p| p.0),
    })
}
