//! Distribution of a per-team key seed to team members
//!
//! One distribution seals the same seed once per recipient. Every box in a
//! distribution uses the nonce `prefix || counter`, where the 20-byte
//! prefix is drawn fresh for the distribution and the 4-byte big-endian
//! counter starts at 1 and increases per recipient, so no two boxes share
//! a nonce.
//!
//! Each box travels as a base64 [`CiphertextRecord`]:
//!
//! ```text
//! dag-cbor [box_version, recipient_key_generation, counter (4 bytes), ciphertext]
//! ```

use std::collections::{BTreeMap, HashSet};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::codec::{cbor_decode, cbor_encode, Bytes, CodecError};
use crate::crypto::secret_box::{self, NONCE_COUNTER_SIZE, NONCE_PREFIX_SIZE};
use crate::crypto::{
    BoxNonce, EncryptionPublicKey, EncryptionSecretKey, KeyError, Kid, NoncePrefix,
    PerTeamKeySeed, SecretBoxError, SeedError,
};

/// Version of the box record layout
pub const BOX_VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum BoxDistributionError {
    #[error("no recipients to distribute to")]
    NoRecipients,
    #[error("duplicate recipient {0}")]
    DuplicateRecipient(String),
    #[error("too many recipients")]
    TooManyRecipients,
    #[error("no box for {0}")]
    MissingBox(String),
    #[error("malformed box: {0}")]
    Malformed(String),
    #[error("box error: {0}")]
    Box(#[from] SecretBoxError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("seed error: {0}")]
    Seed(#[from] SeedError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// A member receiving the seed, addressed by one of their per-user
/// encryption keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub uid: String,
    pub public_key: EncryptionPublicKey,
    /// Generation of the recipient's per-user key
    pub key_generation: u32,
}

impl Recipient {
    pub fn new(uid: impl Into<String>, public_key: EncryptionPublicKey, key_generation: u32) -> Self {
        Self {
            uid: uid.into(),
            public_key,
            key_generation,
        }
    }

    /// Build a recipient from a KID, which must name an encryption key
    pub fn from_kid(uid: impl Into<String>, kid: &Kid, key_generation: u32) -> Result<Self, KeyError> {
        Ok(Self::new(uid, EncryptionPublicKey::from_kid(kid)?, key_generation))
    }
}

/// One sealed copy of the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiphertextRecord {
    pub box_version: u8,
    pub key_generation: u32,
    pub counter: u32,
    pub ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct RecordWire(u8, u32, Bytes, Bytes);

impl CiphertextRecord {
    pub fn encode(&self) -> Result<String, BoxDistributionError> {
        let wire = RecordWire(
            self.box_version,
            self.key_generation,
            Bytes(self.counter.to_be_bytes().to_vec()),
            Bytes(self.ciphertext.clone()),
        );
        Ok(STANDARD.encode(cbor_encode(&wire)?))
    }

    pub fn decode(encoded: &str) -> Result<Self, BoxDistributionError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| BoxDistributionError::Malformed(e.to_string()))?;
        let RecordWire(box_version, key_generation, counter, ciphertext) = cbor_decode(&raw)?;
        if box_version != BOX_VERSION {
            return Err(BoxDistributionError::Malformed(format!(
                "unsupported box version {}",
                box_version
            )));
        }
        let counter: [u8; NONCE_COUNTER_SIZE] = counter
            .0
            .as_slice()
            .try_into()
            .map_err(|_| BoxDistributionError::Malformed("counter is not 4 bytes".to_string()))?;
        Ok(Self {
            box_version,
            key_generation,
            counter: u32::from_be_bytes(counter),
            ciphertext: ciphertext.0,
        })
    }
}

/// The boxes for one per-team key generation, as submitted alongside the
/// link that introduces it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBoxSet {
    pub generation: u32,
    pub encrypting_kid: Kid,
    /// Base64 nonce prefix shared by every box
    pub nonce: String,
    /// Reference to the previous generation's secret; none for generation 1
    pub prev: Option<String>,
    /// uid -> base64 [`CiphertextRecord`]
    pub boxes: BTreeMap<String, String>,
}

impl SecretBoxSet {
    pub fn nonce_prefix(&self) -> Result<NoncePrefix, BoxDistributionError> {
        let raw = STANDARD
            .decode(&self.nonce)
            .map_err(|e| BoxDistributionError::Malformed(e.to_string()))?;
        let prefix: [u8; NONCE_PREFIX_SIZE] = raw
            .as_slice()
            .try_into()
            .map_err(|_| BoxDistributionError::Malformed("nonce prefix is not 20 bytes".to_string()))?;
        Ok(NoncePrefix::from(prefix))
    }

    pub fn record(&self, uid: &str) -> Result<CiphertextRecord, BoxDistributionError> {
        let encoded = self
            .boxes
            .get(uid)
            .ok_or_else(|| BoxDistributionError::MissingBox(uid.to_string()))?;
        CiphertextRecord::decode(encoded)
    }

    /// Open `uid`'s box with their per-user secret key
    pub fn open(
        &self,
        uid: &str,
        recipient: &EncryptionSecretKey,
    ) -> Result<PerTeamKeySeed, BoxDistributionError> {
        let record = self.record(uid)?;
        let sender = EncryptionPublicKey::from_kid(&self.encrypting_kid)?;
        let nonce = BoxNonce::new(&self.nonce_prefix()?, record.counter);
        let opened = secret_box::open(&record.ciphertext, recipient, &sender, &nonce)?;
        Ok(PerTeamKeySeed::from_slice(&opened)?)
    }
}

/// Seal `seed` to every recipient.
///
/// All-or-nothing: any failure returns an error and no boxes. Recipients
/// are boxed in order, so the first gets counter 1.
pub fn distribute(
    seed: &PerTeamKeySeed,
    generation: u32,
    sender: &EncryptionSecretKey,
    recipients: &[Recipient],
) -> Result<SecretBoxSet, BoxDistributionError> {
    if recipients.is_empty() {
        return Err(BoxDistributionError::NoRecipients);
    }
    let mut seen = HashSet::with_capacity(recipients.len());
    for recipient in recipients {
        if !seen.insert(recipient.uid.as_str()) {
            return Err(BoxDistributionError::DuplicateRecipient(recipient.uid.clone()));
        }
    }

    let prefix = NoncePrefix::generate()?;
    let mut boxes = BTreeMap::new();
    for (i, recipient) in recipients.iter().enumerate() {
        let counter = u32::try_from(i + 1).map_err(|_| BoxDistributionError::TooManyRecipients)?;
        let nonce = BoxNonce::new(&prefix, counter);
        let ciphertext = secret_box::seal(seed.bytes(), sender, &recipient.public_key, &nonce)?;
        let record = CiphertextRecord {
            box_version: BOX_VERSION,
            key_generation: recipient.key_generation,
            counter,
            ciphertext,
        };
        boxes.insert(recipient.uid.clone(), record.encode()?);
    }

    tracing::debug!(generation, recipients = boxes.len(), "distributed per-team key");

    Ok(SecretBoxSet {
        generation,
        encrypting_kid: sender.kid(),
        nonce: STANDARD.encode(prefix.bytes()),
        prev: None,
        boxes,
    })
}
