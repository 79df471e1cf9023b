use crate::crypto::{
    DeriveReason, EncryptionPublicKey, EncryptionSecretKey, PerTeamKeySeed, SeedError,
    SigningPublicKey, SigningSecretKey,
};

use super::section::PerTeamKeySection;

/// The keypairs of one per-team key generation, derived from its seed
pub struct PerTeamKeyPair {
    generation: u32,
    signing: SigningSecretKey,
    encryption: EncryptionSecretKey,
}

impl PerTeamKeyPair {
    pub fn from_seed(seed: &PerTeamKeySeed, generation: u32) -> Result<Self, SeedError> {
        if generation == 0 {
            return Err(anyhow::anyhow!("per-team key generations start at 1").into());
        }
        let signing = SigningSecretKey::from(seed.derive(DeriveReason::TEAM_SIGNING)?);
        let encryption = EncryptionSecretKey::from(seed.derive(DeriveReason::TEAM_ENCRYPTION)?);
        Ok(Self {
            generation,
            signing,
            encryption,
        })
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn signing_key(&self) -> &SigningSecretKey {
        &self.signing
    }

    pub fn signing_public(&self) -> SigningPublicKey {
        self.signing.public()
    }

    pub fn encryption_public(&self) -> EncryptionPublicKey {
        self.encryption.public()
    }

    /// The section naming this generation, with no reverse signature yet
    pub fn section(&self) -> PerTeamKeySection {
        PerTeamKeySection {
            generation: self.generation,
            encryption_kid: self.encryption.kid(),
            signing_kid: self.signing.kid(),
            reverse_sig: None,
        }
    }
}

impl std::fmt::Debug for PerTeamKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerTeamKeyPair")
            .field("generation", &self.generation)
            .field("signing_kid", &self.signing.kid())
            .field("encryption_kid", &self.encryption.kid())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::KidType;

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = PerTeamKeySeed::from([7u8; 32]);
        let a = PerTeamKeyPair::from_seed(&seed, 1).unwrap();
        let b = PerTeamKeyPair::from_seed(&seed, 1).unwrap();
        assert_eq!(a.section(), b.section());
    }

    #[test]
    fn test_section_names_both_keys() {
        let pair = PerTeamKeyPair::from_seed(&PerTeamKeySeed::generate().unwrap(), 1).unwrap();
        let section = pair.section();
        assert_eq!(section.generation, 1);
        assert_eq!(section.signing_kid.kind(), KidType::Signing);
        assert_eq!(section.encryption_kid.kind(), KidType::Encryption);
        assert_ne!(section.signing_kid.key_bytes(), section.encryption_kid.key_bytes());
        assert!(section.reverse_sig.is_none());
    }

    #[test]
    fn test_generation_zero_rejected() {
        assert!(PerTeamKeyPair::from_seed(&PerTeamKeySeed::generate().unwrap(), 0).is_err());
    }
}
