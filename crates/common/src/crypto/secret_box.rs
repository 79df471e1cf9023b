//! Public-key authenticated encryption
//!
//! Seals a message from one X25519 key to another under an explicit 24-byte
//! nonce:
//!
//! 1. **Agree**: X25519 between the sender's secret and the recipient's public key
//! 2. **Derive**: `HMAC-SHA256(dh_output, "Teamchain-Box-Key-1")` as the box key
//! 3. **Seal**: XChaCha20-Poly1305 under that key and the caller's nonce
//!
//! Both sides compute the same DH output, so the recipient opens with their
//! secret key and the sender's public key. Authentication comes from the
//! AEAD tag: only the holder of either secret can produce a box that opens.
//!
//! Nonces are the caller's responsibility. A team secret distribution builds
//! them from one random prefix plus a per-recipient counter (see
//! [`BoxNonce::new`]) so that no two boxes in a distribution share one.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};

use super::keys::{EncryptionPublicKey, EncryptionSecretKey, KeyError};
use super::seed::{derive_from_secret, DeriveReason, SeedError};

/// Size of the random part of a box nonce
pub const NONCE_PREFIX_SIZE: usize = 20;
/// Size of the per-box counter appended to the prefix
pub const NONCE_COUNTER_SIZE: usize = 4;
/// Full XChaCha20 nonce size
pub const NONCE_SIZE: usize = NONCE_PREFIX_SIZE + NONCE_COUNTER_SIZE;
/// Poly1305 tag size
pub const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SecretBoxError {
    #[error("box error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("derivation error: {0}")]
    Seed(#[from] SeedError),
}

/// The random prefix shared by every nonce in one distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoncePrefix([u8; NONCE_PREFIX_SIZE]);

impl From<[u8; NONCE_PREFIX_SIZE]> for NoncePrefix {
    fn from(bytes: [u8; NONCE_PREFIX_SIZE]) -> Self {
        NoncePrefix(bytes)
    }
}

impl NoncePrefix {
    pub fn generate() -> Result<Self, SecretBoxError> {
        let mut buff = [0u8; NONCE_PREFIX_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce prefix: {}", e))?;
        Ok(Self(buff))
    }

    pub fn bytes(&self) -> &[u8; NONCE_PREFIX_SIZE] {
        &self.0
    }
}

/// `prefix || big-endian(counter)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxNonce([u8; NONCE_SIZE]);

impl BoxNonce {
    pub fn new(prefix: &NoncePrefix, counter: u32) -> Self {
        let mut buff = [0u8; NONCE_SIZE];
        buff[..NONCE_PREFIX_SIZE].copy_from_slice(&prefix.0);
        buff[NONCE_PREFIX_SIZE..].copy_from_slice(&counter.to_be_bytes());
        BoxNonce(buff)
    }

    pub fn bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    pub fn counter_bytes(&self) -> [u8; NONCE_COUNTER_SIZE] {
        let mut buff = [0u8; NONCE_COUNTER_SIZE];
        buff.copy_from_slice(&self.0[NONCE_PREFIX_SIZE..]);
        buff
    }
}

fn box_cipher(
    ours: &EncryptionSecretKey,
    theirs: &EncryptionPublicKey,
) -> Result<XChaCha20Poly1305, SecretBoxError> {
    let shared = ours.diffie_hellman(theirs)?;
    let box_key = derive_from_secret(&shared, DeriveReason::BOX_KEY)?;
    Ok(XChaCha20Poly1305::new(Key::from_slice(&box_key)))
}

/// Seal `msg` from `sender` to `recipient` under `nonce`.
///
/// The output is `ciphertext || tag`; the nonce is not included.
pub fn seal(
    msg: &[u8],
    sender: &EncryptionSecretKey,
    recipient: &EncryptionPublicKey,
    nonce: &BoxNonce,
) -> Result<Vec<u8>, SecretBoxError> {
    let cipher = box_cipher(sender, recipient)?;
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce.0), msg)
        .map_err(|_| anyhow::anyhow!("box seal error"))?;
    Ok(sealed)
}

/// Open a box produced by [`seal`].
///
/// # Errors
///
/// Fails if the box was sealed to someone else, by someone else, under a
/// different nonce, or was tampered with.
pub fn open(
    sealed: &[u8],
    recipient: &EncryptionSecretKey,
    sender: &EncryptionPublicKey,
    nonce: &BoxNonce,
) -> Result<Vec<u8>, SecretBoxError> {
    if sealed.len() < TAG_SIZE {
        return Err(anyhow::anyhow!("box too short for tag").into());
    }
    let cipher = box_cipher(recipient, sender)?;
    let opened = cipher
        .decrypt(XNonce::from_slice(&nonce.0), sealed)
        .map_err(|_| anyhow::anyhow!("box open error"))?;
    Ok(opened)
}

#[cfg(test)]
mod test {
    use super::*;

    fn keypair() -> EncryptionSecretKey {
        EncryptionSecretKey::generate().unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let sender = keypair();
        let recipient = keypair();
        let nonce = BoxNonce::new(&NoncePrefix::generate().unwrap(), 1);

        let sealed = seal(b"team secret", &sender, &recipient.public(), &nonce).unwrap();
        assert_eq!(sealed.len(), b"team secret".len() + TAG_SIZE);

        let opened = open(&sealed, &recipient, &sender.public(), &nonce).unwrap();
        assert_eq!(opened, b"team secret");
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let sender = keypair();
        let recipient = keypair();
        let eve = keypair();
        let nonce = BoxNonce::new(&NoncePrefix::generate().unwrap(), 1);

        let sealed = seal(b"team secret", &sender, &recipient.public(), &nonce).unwrap();
        assert!(open(&sealed, &eve, &sender.public(), &nonce).is_err());
        assert!(open(&sealed, &recipient, &eve.public(), &nonce).is_err());
    }

    #[test]
    fn test_open_with_wrong_nonce_fails() {
        let sender = keypair();
        let recipient = keypair();
        let prefix = NoncePrefix::generate().unwrap();

        let sealed = seal(b"team secret", &sender, &recipient.public(), &BoxNonce::new(&prefix, 1))
            .unwrap();
        let result = open(&sealed, &recipient, &sender.public(), &BoxNonce::new(&prefix, 2));
        assert!(result.is_err());
    }

    #[test]
    fn test_tampered_box_fails() {
        let sender = keypair();
        let recipient = keypair();
        let nonce = BoxNonce::new(&NoncePrefix::generate().unwrap(), 7);

        let mut sealed = seal(b"team secret", &sender, &recipient.public(), &nonce).unwrap();
        sealed[0] ^= 0x01;
        assert!(open(&sealed, &recipient, &sender.public(), &nonce).is_err());
    }

    #[test]
    fn test_nonce_layout() {
        let prefix = NoncePrefix::from([9u8; NONCE_PREFIX_SIZE]);
        let nonce = BoxNonce::new(&prefix, 0x01020304);
        assert_eq!(&nonce.bytes()[..NONCE_PREFIX_SIZE], &[9u8; NONCE_PREFIX_SIZE]);
        assert_eq!(nonce.counter_bytes(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_low_order_recipient_rejected() {
        let sender = keypair();
        let zero = EncryptionPublicKey::from([0u8; 32]);
        let nonce = BoxNonce::new(&NoncePrefix::generate().unwrap(), 1);
        assert!(seal(b"x", &sender, &zero, &nonce).is_err());
    }
}
