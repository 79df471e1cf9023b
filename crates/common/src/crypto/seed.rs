//! Per-team key seeds and domain-separated key derivation
//!
//! Every per-team key generation starts from one 32-byte random seed. The
//! seed itself is never used as a key: the signing and encryption keypairs
//! (and the box keys used to distribute the seed) are derived from it with
//! `HMAC-SHA256(key = seed, data = reason)`, where each use has its own
//! fixed reason string.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a per-team key seed in bytes (256 bits)
pub const SEED_SIZE: usize = 32;
/// Size of every derived key in bytes
pub const DERIVED_KEY_SIZE: usize = 32;
/// Derivation reasons shorter than this are refused
pub const MIN_REASON_SIZE: usize = 8;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur while generating seeds or deriving from them
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("seed error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A domain tag for [`derive_from_secret`].
///
/// Distinct reasons yield independent keys from the same secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeriveReason(&'static str);

impl DeriveReason {
    /// Seed of the per-team Ed25519 signing key
    pub const TEAM_SIGNING: DeriveReason = DeriveReason("Keybase-Derived-Team-NaCl-EdDSA-1");
    /// Seed of the per-team X25519 encryption key
    pub const TEAM_ENCRYPTION: DeriveReason = DeriveReason("Keybase-Derived-Team-NaCl-DH-1");
    /// Symmetric key for one sender/recipient box, derived from their DH output
    pub const BOX_KEY: DeriveReason = DeriveReason("Teamchain-Box-Key-1");

    pub const fn new(reason: &'static str) -> Self {
        DeriveReason(reason)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Derive a key from a secret that exists only to be derived from.
///
/// Computes `HMAC-SHA256(key = secret, data = reason)`.
pub fn derive_from_secret(
    secret: &[u8; SEED_SIZE],
    reason: DeriveReason,
) -> Result<[u8; DERIVED_KEY_SIZE], SeedError> {
    if reason.0.len() < MIN_REASON_SIZE {
        return Err(anyhow::anyhow!(
            "derivation reason must be at least {} bytes",
            MIN_REASON_SIZE
        )
        .into());
    }

    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("invalid hmac key: {}", e))?;
    mac.update(reason.0.as_bytes());
    let out = mac.finalize().into_bytes();

    let mut key = [0u8; DERIVED_KEY_SIZE];
    key.copy_from_slice(&out[..DERIVED_KEY_SIZE]);
    Ok(key)
}

/// The shared secret of one per-team key generation.
///
/// Lives only for the duration of a single team creation call. It is
/// zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PerTeamKeySeed([u8; SEED_SIZE]);

impl From<[u8; SEED_SIZE]> for PerTeamKeySeed {
    fn from(bytes: [u8; SEED_SIZE]) -> Self {
        PerTeamKeySeed(bytes)
    }
}

impl fmt::Debug for PerTeamKeySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PerTeamKeySeed(<redacted>)")
    }
}

impl PerTeamKeySeed {
    /// Draw a fresh seed from the OS random source
    ///
    /// # Errors
    ///
    /// Only fails if the random source does.
    pub fn generate() -> Result<Self, SeedError> {
        let mut buff = [0u8; SEED_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
        Ok(Self(buff))
    }

    /// Create a seed from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SEED_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SeedError> {
        if data.len() != SEED_SIZE {
            return Err(anyhow::anyhow!(
                "invalid seed size, expected {}, got {}",
                SEED_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0u8; SEED_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Derive a 32-byte key for the given purpose
    pub fn derive(&self, reason: DeriveReason) -> Result<[u8; DERIVED_KEY_SIZE], SeedError> {
        derive_from_secret(&self.0, reason)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_is_deterministic() {
        let seed = PerTeamKeySeed::from([7u8; SEED_SIZE]);
        let a = seed.derive(DeriveReason::TEAM_SIGNING).unwrap();
        let b = seed.derive(DeriveReason::TEAM_SIGNING).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_matches_hmac_sha256() {
        let seed = [1u8; SEED_SIZE];
        let derived = derive_from_secret(&seed, DeriveReason::TEAM_ENCRYPTION).unwrap();

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&seed).unwrap();
        mac.update(b"Keybase-Derived-Team-NaCl-DH-1");
        assert_eq!(&derived[..], &mac.finalize().into_bytes()[..]);
    }

    #[test]
    fn test_short_reason_rejected() {
        let seed = PerTeamKeySeed::generate().unwrap();
        assert!(seed.derive(DeriveReason::new("short")).is_err());
    }

    #[test]
    fn test_seed_size_validation() {
        assert!(PerTeamKeySeed::from_slice(&[1u8; 16]).is_err());
        assert!(PerTeamKeySeed::from_slice(&[1u8; 64]).is_err());
        assert!(PerTeamKeySeed::from_slice(&[1u8; SEED_SIZE]).is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let seed = PerTeamKeySeed::from([0xabu8; SEED_SIZE]);
        assert!(!format!("{:?}", seed).contains("ab"));
    }

    #[test]
    fn test_generate_is_fresh() {
        let a = PerTeamKeySeed::generate().unwrap();
        let b = PerTeamKeySeed::generate().unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_domain_separation(bytes in any::<[u8; SEED_SIZE]>()) {
            let seed = PerTeamKeySeed::from(bytes);
            let signing = seed.derive(DeriveReason::TEAM_SIGNING).unwrap();
            let encryption = seed.derive(DeriveReason::TEAM_ENCRYPTION).unwrap();
            let boxing = seed.derive(DeriveReason::BOX_KEY).unwrap();
            prop_assert_ne!(signing, encryption);
            prop_assert_ne!(signing, boxing);
            prop_assert_ne!(encryption, boxing);
        }
    }
}
