//! Shared test utilities for team creation integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::crypto::{EncryptionSecretKey, SigningSecretKey};
use common::team::{DeviceKeys, PerUserKey, SelfIdentity, SigMultiPayload, TeamId};
use common::team_log::{
    ChainTip, ChainTipProvider, MemoryTeamLog, MemoryTeamLogError, TeamLogError, TeamPoster,
};

/// Route `tracing` output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A creator with fresh device keys and a per-user key.
/// Returns the identity, the device keys, and the per-user secret key.
pub fn setup_creator(uid: &str, username: &str) -> (SelfIdentity, DeviceKeys, EncryptionSecretKey) {
    let puk = EncryptionSecretKey::generate().unwrap();
    let device = DeviceKeys {
        signing: SigningSecretKey::generate().unwrap(),
        encryption: EncryptionSecretKey::generate().unwrap(),
    };
    let identity = SelfIdentity {
        uid: uid.to_string(),
        username: username.to_string(),
        eldest_seqno: 1,
        eldest_kid: Some(device.signing.kid()),
        per_user_key: Some(PerUserKey {
            public: puk.public(),
            generation: 1,
        }),
    };
    (identity, device, puk)
}

/// Always reports the same tip
#[derive(Debug, Clone)]
pub struct StaticTipProvider(pub ChainTip);

#[async_trait]
impl ChainTipProvider for StaticTipProvider {
    type Error = String;

    async fn tip(&self, _id: &TeamId) -> Result<ChainTip, TeamLogError<Self::Error>> {
        Ok(self.0)
    }
}

/// Fails every tip read with a fixed error
#[derive(Debug, Clone)]
pub struct FailingTipProvider(pub TeamLogError<String>);

#[async_trait]
impl ChainTipProvider for FailingTipProvider {
    type Error = String;

    async fn tip(&self, _id: &TeamId) -> Result<ChainTip, TeamLogError<Self::Error>> {
        Err(self.0.clone())
    }
}

/// Accepts everything and keeps what it was given
#[derive(Debug, Clone, Default)]
pub struct RecordingPoster {
    pub posted: Arc<Mutex<Vec<SigMultiPayload>>>,
}

impl RecordingPoster {
    pub fn payloads(&self) -> Vec<SigMultiPayload> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TeamPoster for RecordingPoster {
    type Error = String;

    async fn post(&self, payload: &SigMultiPayload) -> Result<(), TeamLogError<Self::Error>> {
        self.posted.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Fails every post with a fixed error
#[derive(Debug, Clone)]
pub struct FailingPoster(pub TeamLogError<String>);

#[async_trait]
impl TeamPoster for FailingPoster {
    type Error = String;

    async fn post(&self, _payload: &SigMultiPayload) -> Result<(), TeamLogError<Self::Error>> {
        Err(self.0.clone())
    }
}

/// Serves a stale tip for the first `stale_reads` reads, then the log's
/// real tip
#[derive(Debug, Clone)]
pub struct StaleTipProvider {
    pub log: MemoryTeamLog,
    pub stale: ChainTip,
    pub stale_reads: Arc<AtomicU32>,
    pub reads: Arc<AtomicU32>,
}

impl StaleTipProvider {
    pub fn new(log: MemoryTeamLog, stale: ChainTip, stale_reads: u32) -> Self {
        Self {
            log,
            stale,
            stale_reads: Arc::new(AtomicU32::new(stale_reads)),
            reads: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainTipProvider for StaleTipProvider {
    type Error = MemoryTeamLogError;

    async fn tip(&self, id: &TeamId) -> Result<ChainTip, TeamLogError<Self::Error>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(self.stale);
        }
        self.log.tip(id).await
    }
}
