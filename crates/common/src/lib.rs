/**
 * Encodings shared by links, boxes, and
 *  signature strings.
 */
pub mod codec;
/**
 * Cryptographic types and operations.
 *  - Device and per-team keys, named by KIDs
 *  - Per-team key derivation from a seed
 *  - Public-key boxes for distributing seeds
 *  - Self-describing signature strings
 */
pub mod crypto;
/**
 * Construction and checking of individual
 *  hash-chained, signed links.
 */
pub mod sigchain;
/**
 * Team creation: names, ids, link bodies,
 *  reverse signatures, box distribution, and
 *  the creation flows that tie them together.
 */
pub mod team;
/**
 * Where team chains live: reading chain
 *  tips and submitting new links.
 */
pub mod team_log;

pub mod prelude {
    pub use crate::crypto::{EncryptionPublicKey, EncryptionSecretKey, Kid, SigningSecretKey};
    pub use crate::sigchain::{LinkId, SignedLink};
    pub use crate::team::{
        create_root_team, create_subteam, create_subteam_with_retry, CreateError, DeviceKeys,
        ParentTeam, PerUserKey, SelfIdentity, TeamId, TeamName,
    };
    pub use crate::team_log::{ChainTip, ChainTipProvider, TeamPoster};
}
