use clap::Args;
use url::Url;

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Our user id on the team server
    #[arg(long)]
    pub uid: String,

    /// Our username
    #[arg(long)]
    pub username: String,

    /// Team server URL (default: https://teamchain.io)
    #[arg(long)]
    pub api_url: Option<Url>,

    /// Seqno of the account's eldest link
    #[arg(long, default_value_t = 1)]
    pub eldest_seqno: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::new(self.uid.clone(), self.username.clone());
        config.eldest_seqno = self.eldest_seqno;
        if let Some(api_url) = self.api_url.clone().or_else(|| ctx.remote.clone()) {
            config.api_url = api_url;
        }

        let state = AppState::init(ctx.config_path.clone(), config)?;
        let device = state.load_device_keys()?;
        tracing::info!(uid = %state.config.uid, device_kid = %device.signing.kid(), "initialized");

        let output = format!(
            "Initialized teamchain directory at: {}\n\
             - Config: {}\n\
             - Device signing key: {} ({})\n\
             - Device encryption key: {} ({})\n\
             - Per-user key: {}\n\
             - Team server: {}",
            state.teamchain_dir.display(),
            state.config_path.display(),
            state.device_signing_path.display(),
            device.signing.kid(),
            state.device_encryption_path.display(),
            device.encryption.kid(),
            state.puk_encryption_path.display(),
            state.config.api_url,
        );

        Ok(output)
    }
}
