//! Cryptographic primitives for team sigchains
//!
//! This module provides the building blocks the team creation protocol is
//! assembled from:
//!
//! - **Identity & Authentication**: Ed25519 signing keys, named by [`Kid`]s
//! - **Key Agreement**: X25519 encryption keys for boxing secrets to members
//! - **Derivation**: HMAC-SHA256 derivation of per-team keys from one seed
//! - **Signature Strings**: self-describing, base64 signature packets
//!
//! # Security Model
//!
//! ## Devices
//! Every device holds an Ed25519 signing key and an X25519 encryption key.
//! The signing key authors sigchain links; the encryption key is the sender
//! side of every box the device produces.
//!
//! ## Per-Team Keys
//! A team's key material for one generation is a single random
//! [`PerTeamKeySeed`]. Both per-team keypairs are derived from it under
//! distinct [`DeriveReason`]s, so distributing the seed to a member
//! distributes both keys.
//!
//! ## Seed Distribution
//! The seed is sealed separately to each member's per-user encryption key
//! with [`secret_box::seal`], using one random nonce prefix per
//! distribution and a per-recipient counter.

mod keys;
pub mod secret_box;
mod seed;
pub mod sig;

pub use ed25519_dalek::Signature;
pub use keys::{
    EncryptionPublicKey, EncryptionSecretKey, KeyError, Kid, KidType, SigningPublicKey,
    SigningSecretKey, KID_SIZE, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
};
pub use secret_box::{BoxNonce, NoncePrefix, SecretBoxError};
pub use seed::{derive_from_secret, DeriveReason, PerTeamKeySeed, SeedError, SEED_SIZE};
pub use sig::{SigError, SigInfo};
