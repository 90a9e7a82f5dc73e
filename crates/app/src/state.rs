use std::{fs, path::PathBuf};

use common::crypto::{KeyError, SecretKey};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "streamvault";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "identity.pem";
pub const UPLOADS_FILE_NAME: &str = "uploads.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// RPC endpoint of the storage market
    #[serde(default = "default_network_endpoint")]
    pub network_endpoint: String,
    /// Endpoint of the threshold-cryptography network
    #[serde(default = "default_threshold_endpoint")]
    pub threshold_endpoint: String,
    /// Encrypt recordings before upload
    #[serde(default)]
    pub encryption_enabled: bool,
    /// Reuse this dataset for every upload (optional)
    #[serde(default)]
    pub dataset_id: Option<String>,
}

fn default_network_endpoint() -> String {
    "https://market.streamvault.dev/".to_string()
}

fn default_threshold_endpoint() -> String {
    "https://threshold.streamvault.dev/".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network_endpoint: default_network_endpoint(),
            threshold_endpoint: default_threshold_endpoint(),
            encryption_enabled: false,
            dataset_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the streamvault directory (~/.streamvault)
    pub app_dir: PathBuf,
    /// Path to the identity key PEM file
    pub key_path: PathBuf,
    /// Path to the persisted upload records
    pub uploads_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the streamvault directory path (custom or default ~/.streamvault)
    pub fn app_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new streamvault state directory
    pub fn init(custom_path: Option<PathBuf>, config: Option<AppConfig>) -> Result<Self, StateError> {
        let app_dir = Self::app_dir(custom_path)?;

        if app_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&app_dir)?;

        // Generate and save identity key
        let key = SecretKey::generate();
        let key_path = app_dir.join(KEY_FILE_NAME);
        fs::write(&key_path, key.to_pem())?;

        // Create config (use provided or default)
        let config = config.unwrap_or_default();
        let config_path = app_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // Empty upload record store
        let uploads_path = app_dir.join(UPLOADS_FILE_NAME);
        fs::write(&uploads_path, "[]")?;

        Ok(Self {
            app_dir,
            key_path,
            uploads_path,
            config_path,
            config,
        })
    }

    /// Load an existing streamvault state directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let app_dir = Self::app_dir(custom_path)?;
        if !app_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = app_dir.join(CONFIG_FILE_NAME);
        let config: AppConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;

        Ok(Self {
            key_path: app_dir.join(KEY_FILE_NAME),
            uploads_path: app_dir.join(UPLOADS_FILE_NAME),
            config_path,
            config,
            app_dir,
        })
    }

    /// Load the identity key from its PEM file
    pub fn identity_key(&self) -> Result<SecretKey, StateError> {
        let pem = fs::read_to_string(&self.key_path)?;
        Ok(SecretKey::from_pem(&pem)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not determine home directory")]
    NoHomeDirectory,
    #[error("streamvault directory already initialized")]
    AlreadyInitialized,
    #[error("streamvault directory not initialized; run `streamvault init` first")]
    NotInitialized,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_init_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("vault");

        let state = AppState::init(Some(custom.clone()), None).unwrap();
        assert!(state.key_path.exists());
        assert!(state.config_path.exists());

        let loaded = AppState::load(Some(custom)).unwrap();
        assert_eq!(
            loaded.config.network_endpoint,
            state.config.network_endpoint
        );
        // The persisted key parses back to the same identity
        let key = loaded.identity_key().unwrap();
        assert_eq!(
            key.public().to_hex(),
            state.identity_key().unwrap().public().to_hex()
        );
    }

    #[test]
    fn test_double_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("vault");

        AppState::init(Some(custom.clone()), None).unwrap();
        assert!(matches!(
            AppState::init(Some(custom), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }
}
