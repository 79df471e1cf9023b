use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// Size of an Ed25519 or X25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an Ed25519 or X25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of a binary key identifier: version || type || key || suffix
pub const KID_SIZE: usize = PUBLIC_KEY_SIZE + 3;

const KID_VERSION: u8 = 0x01;
const KID_SUFFIX: u8 = 0x0a;
const PEM_TAG: &str = "PRIVATE KEY";

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// The algorithm a [`Kid`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KidType {
    /// Ed25519 signing key
    Signing,
    /// X25519 Diffie-Hellman encryption key
    Encryption,
}

impl KidType {
    fn tag(self) -> u8 {
        match self {
            KidType::Signing => 0x20,
            KidType::Encryption => 0x21,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x20 => Some(KidType::Signing),
            0x21 => Some(KidType::Encryption),
            _ => None,
        }
    }
}

impl fmt::Display for KidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KidType::Signing => write!(f, "signing"),
            KidType::Encryption => write!(f, "encryption"),
        }
    }
}

/// Key identifier
///
/// A stable, self-describing name for a public key. Layout:
///
/// ```text
/// [ 0x01 ][ type: 0x20 | 0x21 ][ public key: 32 bytes ][ 0x0a ]
/// ```
///
/// Serialized as lowercase hex wherever it appears on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kid([u8; KID_SIZE]);

impl Kid {
    fn new(kind: KidType, key: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        let mut buff = [0u8; KID_SIZE];
        buff[0] = KID_VERSION;
        buff[1] = kind.tag();
        buff[2..2 + PUBLIC_KEY_SIZE].copy_from_slice(key);
        buff[KID_SIZE - 1] = KID_SUFFIX;
        Kid(buff)
    }

    /// The algorithm this identifier names
    pub fn kind(&self) -> KidType {
        // Validated on construction
        KidType::from_tag(self.0[1]).unwrap_or(KidType::Signing)
    }

    /// The raw public key bytes embedded in the identifier
    pub fn key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let mut buff = [0u8; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(&self.0[2..2 + PUBLIC_KEY_SIZE]);
        buff
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a key identifier from its hexadecimal form
    ///
    /// # Errors
    ///
    /// Returns an error if the hex is malformed, has the wrong length, or
    /// carries an unknown version, type, or suffix byte.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let mut buff = [0u8; KID_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("kid hex decode error: {}", hex))?;
        Self::try_from(&buff[..])
    }
}

impl TryFrom<&[u8]> for Kid {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != KID_SIZE {
            return Err(anyhow::anyhow!(
                "invalid kid size, expected {}, got {}",
                KID_SIZE,
                bytes.len()
            )
            .into());
        }
        if bytes[0] != KID_VERSION || bytes[KID_SIZE - 1] != KID_SUFFIX {
            return Err(anyhow::anyhow!("malformed kid framing").into());
        }
        if KidType::from_tag(bytes[1]).is_none() {
            return Err(anyhow::anyhow!("unknown kid type 0x{:02x}", bytes[1]).into());
        }
        let mut buff = [0u8; KID_SIZE];
        buff.copy_from_slice(bytes);
        Ok(Kid(buff))
    }
}

impl fmt::Display for Kid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Kid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kid({})", self.to_hex())
    }
}

impl Serialize for Kid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Kid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Kid::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

fn fill_random() -> Result<[u8; PRIVATE_KEY_SIZE], KeyError> {
    let mut bytes = [0u8; PRIVATE_KEY_SIZE];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
    Ok(bytes)
}

fn encode_pem(bytes: [u8; PRIVATE_KEY_SIZE]) -> String {
    let pem = pem::Pem::new(PEM_TAG, bytes);
    pem::encode(&pem)
}

fn decode_pem(pem_str: &str) -> Result<[u8; PRIVATE_KEY_SIZE], KeyError> {
    let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;

    if pem.tag() != PEM_TAG {
        return Err(anyhow::anyhow!("invalid PEM tag, expected {}", PEM_TAG).into());
    }

    let contents = pem.contents();
    if contents.len() != PRIVATE_KEY_SIZE {
        return Err(anyhow::anyhow!(
            "invalid private key size in PEM, expected {}, got {}",
            PRIVATE_KEY_SIZE,
            contents.len()
        )
        .into());
    }

    let mut bytes = [0u8; PRIVATE_KEY_SIZE];
    bytes.copy_from_slice(contents);
    Ok(bytes)
}

/// Public half of an Ed25519 signing key
///
/// Device keys and per-team signing keys are both of this type. A verifier
/// usually reconstructs one from the [`Kid`] carried next to a signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SigningPublicKey(VerifyingKey);

impl SigningPublicKey {
    pub fn kid(&self) -> Kid {
        Kid::new(KidType::Signing, self.0.as_bytes())
    }

    /// Recover the public key named by a signing [`Kid`]
    ///
    /// # Errors
    ///
    /// Fails if the identifier names an encryption key or the embedded bytes
    /// are not a valid Edwards point.
    pub fn from_kid(kid: &Kid) -> Result<Self, KeyError> {
        if kid.kind() != KidType::Signing {
            return Err(anyhow::anyhow!("expected a signing kid, got {} kid", kid.kind()).into());
        }
        let key = VerifyingKey::from_bytes(&kid.key_bytes())
            .map_err(|e| anyhow::anyhow!("invalid signing key: {}", e))?;
        Ok(Self(key))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Verify an Ed25519 signature on a message.
    pub fn verify(
        &self,
        msg: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<(), ed25519_dalek::SignatureError> {
        self.0.verify(msg, signature)
    }
}

impl fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningPublicKey({})", self.kid())
    }
}

/// Secret half of an Ed25519 signing key
///
/// Used both for the long-lived device key that signs outer links and for
/// the per-team signing key that produces reverse signatures.
#[derive(Clone)]
pub struct SigningSecretKey(SigningKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SigningSecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&secret))
    }
}

impl SigningSecretKey {
    /// Generate a new random signing key using the OS random source
    pub fn generate() -> Result<Self, KeyError> {
        Ok(Self::from(fill_random()?))
    }

    pub fn public(&self) -> SigningPublicKey {
        SigningPublicKey(self.0.verifying_key())
    }

    pub fn kid(&self) -> Kid {
        self.public().kid()
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Encode the key in PEM format for on-disk storage
    pub fn to_pem(&self) -> String {
        encode_pem(self.to_bytes())
    }

    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        Ok(Self::from(decode_pem(pem_str)?))
    }

    /// Sign a message, returning a detached signature
    pub fn sign(&self, msg: &[u8]) -> ed25519_dalek::Signature {
        self.0.sign(msg)
    }
}

impl fmt::Debug for SigningSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecretKey({})", self.kid())
    }
}

/// Public half of an X25519 encryption key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncryptionPublicKey(X25519PublicKey);

impl From<[u8; PUBLIC_KEY_SIZE]> for EncryptionPublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(X25519PublicKey::from(bytes))
    }
}

impl EncryptionPublicKey {
    pub fn kid(&self) -> Kid {
        Kid::new(KidType::Encryption, self.0.as_bytes())
    }

    /// Recover the public key named by an encryption [`Kid`]
    ///
    /// # Errors
    ///
    /// Fails if the identifier names a signing key; box recipients must be
    /// Diffie-Hellman keys.
    pub fn from_kid(kid: &Kid) -> Result<Self, KeyError> {
        if kid.kind() != KidType::Encryption {
            return Err(
                anyhow::anyhow!("expected an encryption kid, got {} kid", kid.kind()).into(),
            );
        }
        Ok(Self::from(kid.key_bytes()))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub(crate) fn as_x25519(&self) -> &X25519PublicKey {
        &self.0
    }
}

impl fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionPublicKey({})", self.kid())
    }
}

/// Secret half of an X25519 encryption key
///
/// Device encryption keys, per-user keys, and per-team encryption keys are
/// all of this type.
#[derive(Clone)]
pub struct EncryptionSecretKey(StaticSecret);

impl From<[u8; PRIVATE_KEY_SIZE]> for EncryptionSecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(StaticSecret::from(secret))
    }
}

impl EncryptionSecretKey {
    /// Generate a new random encryption key using the OS random source
    pub fn generate() -> Result<Self, KeyError> {
        Ok(Self::from(fill_random()?))
    }

    pub fn public(&self) -> EncryptionPublicKey {
        EncryptionPublicKey(X25519PublicKey::from(&self.0))
    }

    pub fn kid(&self) -> Kid {
        self.public().kid()
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_pem(&self) -> String {
        encode_pem(self.to_bytes())
    }

    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        Ok(Self::from(decode_pem(pem_str)?))
    }

    /// Raw X25519 agreement with a peer's public key.
    ///
    /// Fails on low-order peer points, which would yield a predictable
    /// shared secret.
    pub(crate) fn diffie_hellman(
        &self,
        peer: &EncryptionPublicKey,
    ) -> Result<[u8; PUBLIC_KEY_SIZE], KeyError> {
        let shared = self.0.diffie_hellman(peer.as_x25519());
        if !shared.was_contributory() {
            return Err(anyhow::anyhow!("non-contributory diffie-hellman result").into());
        }
        Ok(*shared.as_bytes())
    }
}

impl fmt::Debug for EncryptionSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionSecretKey({})", self.kid())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kid_layout() {
        let key = SigningSecretKey::generate().unwrap();
        let kid = key.kid();
        assert_eq!(kid.bytes()[0], 0x01);
        assert_eq!(kid.bytes()[1], 0x20);
        assert_eq!(kid.bytes()[KID_SIZE - 1], 0x0a);
        assert_eq!(kid.key_bytes(), key.public().to_bytes());
        assert_eq!(kid.to_hex().len(), KID_SIZE * 2);

        let enc = EncryptionSecretKey::generate().unwrap();
        assert_eq!(enc.kid().bytes()[1], 0x21);
        assert_eq!(enc.kid().kind(), KidType::Encryption);
    }

    #[test]
    fn test_kid_hex_rejects_bad_framing() {
        let kid = SigningSecretKey::generate().unwrap().kid();
        let mut hex = kid.to_hex();
        assert_eq!(Kid::from_hex(&hex).unwrap(), kid);

        // unknown type byte
        hex.replace_range(2..4, "99");
        assert!(Kid::from_hex(&hex).is_err());
        // wrong length
        assert!(Kid::from_hex("0120").is_err());
    }

    #[test]
    fn test_from_kid_checks_type() {
        let signing = SigningSecretKey::generate().unwrap();
        let encryption = EncryptionSecretKey::generate().unwrap();

        assert!(EncryptionPublicKey::from_kid(&signing.kid()).is_err());
        assert!(SigningPublicKey::from_kid(&encryption.kid()).is_err());
        assert_eq!(
            EncryptionPublicKey::from_kid(&encryption.kid()).unwrap(),
            encryption.public()
        );
        assert_eq!(
            SigningPublicKey::from_kid(&signing.kid()).unwrap(),
            signing.public()
        );
    }

    #[test]
    fn test_pem_serialization() {
        let signing = SigningSecretKey::generate().unwrap();
        let recovered = SigningSecretKey::from_pem(&signing.to_pem()).unwrap();
        assert_eq!(signing.to_bytes(), recovered.to_bytes());

        let encryption = EncryptionSecretKey::generate().unwrap();
        let recovered = EncryptionSecretKey::from_pem(&encryption.to_pem()).unwrap();
        assert_eq!(encryption.public(), recovered.public());
    }

    #[test]
    fn test_sign_and_verify() {
        let secret_key = SigningSecretKey::generate().unwrap();
        let public_key = secret_key.public();
        let message = b"hello, world!";

        let signature = secret_key.sign(message);
        assert!(public_key.verify(message, &signature).is_ok());
        assert!(public_key.verify(b"hello, world?", &signature).is_err());

        let other_key = SigningSecretKey::generate().unwrap().public();
        assert!(other_key.verify(message, &signature).is_err());
    }

    #[test]
    fn test_diffie_hellman_agrees() {
        let alice = EncryptionSecretKey::generate().unwrap();
        let bob = EncryptionSecretKey::generate().unwrap();
        assert_eq!(
            alice.diffie_hellman(&bob.public()).unwrap(),
            bob.diffie_hellman(&alice.public()).unwrap()
        );
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let key = EncryptionSecretKey::generate().unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains(&hex::encode(key.to_bytes())));
    }
}
