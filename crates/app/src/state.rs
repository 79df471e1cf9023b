use std::{fs, path::PathBuf};

use common::crypto::{EncryptionSecretKey, SigningSecretKey};
use common::team::{DeviceKeys, PerUserKey, SelfIdentity};
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "teamchain";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEVICE_SIGNING_KEY_FILE_NAME: &str = "device_signing.pem";
pub const DEVICE_ENCRYPTION_KEY_FILE_NAME: &str = "device_encryption.pem";
pub const PUK_ENCRYPTION_KEY_FILE_NAME: &str = "puk_encryption.pem";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the team server
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// Our user id
    pub uid: String,
    pub username: String,
    /// Seqno of our account's current eldest link
    #[serde(default = "default_eldest_seqno")]
    pub eldest_seqno: u64,
    /// Generation of the per-user key in `puk_encryption.pem`
    #[serde(default = "default_puk_generation")]
    pub puk_generation: u32,
    /// Default log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How many times subteam creation rebuilds after a chain conflict
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_api_url() -> Url {
    Url::parse("https://teamchain.io").expect("hardcoded URL must parse")
}

fn default_eldest_seqno() -> u64 {
    1
}

fn default_puk_generation() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

impl AppConfig {
    pub fn new(uid: String, username: String) -> Self {
        Self {
            api_url: default_api_url(),
            uid,
            username,
            eldest_seqno: default_eldest_seqno(),
            puk_generation: default_puk_generation(),
            log_level: default_log_level(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the teamchain directory (~/.teamchain)
    pub teamchain_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Path to the device signing key PEM file
    pub device_signing_path: PathBuf,
    /// Path to the device encryption key PEM file
    pub device_encryption_path: PathBuf,
    /// Path to the per-user encryption key PEM file
    pub puk_encryption_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the teamchain directory path (custom or default ~/.teamchain)
    pub fn teamchain_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn paths(teamchain_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            config_path: teamchain_dir.join(CONFIG_FILE_NAME),
            device_signing_path: teamchain_dir.join(DEVICE_SIGNING_KEY_FILE_NAME),
            device_encryption_path: teamchain_dir.join(DEVICE_ENCRYPTION_KEY_FILE_NAME),
            puk_encryption_path: teamchain_dir.join(PUK_ENCRYPTION_KEY_FILE_NAME),
            teamchain_dir,
            config,
        }
    }

    /// Initialize a new teamchain state directory with fresh keys
    pub fn init(custom_path: Option<PathBuf>, config: AppConfig) -> Result<Self, StateError> {
        let teamchain_dir = Self::teamchain_dir(custom_path)?;

        if teamchain_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&teamchain_dir)?;
        let state = Self::paths(teamchain_dir, config);

        // Generate and save keys
        let device_signing = SigningSecretKey::generate().map_err(StateError::invalid_key)?;
        fs::write(&state.device_signing_path, device_signing.to_pem())?;
        let device_encryption = EncryptionSecretKey::generate().map_err(StateError::invalid_key)?;
        fs::write(&state.device_encryption_path, device_encryption.to_pem())?;
        let puk = EncryptionSecretKey::generate().map_err(StateError::invalid_key)?;
        fs::write(&state.puk_encryption_path, puk.to_pem())?;

        let config_toml = toml::to_string_pretty(&state.config)?;
        fs::write(&state.config_path, config_toml)?;

        Ok(state)
    }

    /// Load existing state from the teamchain directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let teamchain_dir = Self::teamchain_dir(custom_path)?;

        if !teamchain_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = teamchain_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }
        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        let state = Self::paths(teamchain_dir, config);
        for (path, name) in [
            (&state.device_signing_path, DEVICE_SIGNING_KEY_FILE_NAME),
            (&state.device_encryption_path, DEVICE_ENCRYPTION_KEY_FILE_NAME),
            (&state.puk_encryption_path, PUK_ENCRYPTION_KEY_FILE_NAME),
        ] {
            if !path.exists() {
                return Err(StateError::MissingFile(name.to_string()));
            }
        }

        Ok(state)
    }

    /// Load this device's signing and encryption keys
    pub fn load_device_keys(&self) -> Result<DeviceKeys, StateError> {
        let signing = SigningSecretKey::from_pem(&fs::read_to_string(&self.device_signing_path)?)
            .map_err(StateError::invalid_key)?;
        let encryption =
            EncryptionSecretKey::from_pem(&fs::read_to_string(&self.device_encryption_path)?)
                .map_err(StateError::invalid_key)?;
        Ok(DeviceKeys {
            signing,
            encryption,
        })
    }

    /// Our identity as recorded in the config, with the public half of the
    /// per-user key
    pub fn load_identity(&self) -> Result<SelfIdentity, StateError> {
        let puk = EncryptionSecretKey::from_pem(&fs::read_to_string(&self.puk_encryption_path)?)
            .map_err(StateError::invalid_key)?;
        Ok(SelfIdentity {
            uid: self.config.uid.clone(),
            username: self.config.username.clone(),
            eldest_seqno: self.config.eldest_seqno,
            eldest_kid: None,
            per_user_key: Some(PerUserKey {
                public: puk.public(),
                generation: self.config.puk_generation,
            }),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("teamchain directory not initialized. Run 'teamchain init' first")]
    NotInitialized,

    #[error("teamchain directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl StateError {
    fn invalid_key(e: impl std::fmt::Display) -> Self {
        StateError::InvalidKey(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_then_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tc");
        let config = AppConfig::new("a1b2c3".to_string(), "alice".to_string());

        let state = AppState::init(Some(dir.clone()), config.clone()).unwrap();
        assert!(state.device_signing_path.exists());
        assert!(state.puk_encryption_path.exists());

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config, config);

        let device = loaded.load_device_keys().unwrap();
        let again = loaded.load_device_keys().unwrap();
        assert_eq!(device.signing.kid(), again.signing.kid());

        let identity = loaded.load_identity().unwrap();
        assert_eq!(identity.uid, "a1b2c3");
        assert_eq!(identity.per_user_key.unwrap().generation, 1);

        assert!(matches!(
            AppState::init(Some(dir), config),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_requires_init() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            AppState::load(Some(temp.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = toml::from_str("uid = \"u\"\nusername = \"bob\"\n").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.api_url.as_str(), "https://teamchain.io/");
    }
}
