//! Storage of the agent's signing key.
use crate::did_jwk::is_private;
use log::info;
use ssi::jwk::JWK;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the file holding the signing key.
const SIGNING_KEY_FILE: &str = "signing_key.json";

/// An error relating to key management.
#[derive(Error, Debug)]
pub enum KeyManagerError {
    /// Key does not exist or could not be read.
    #[error("Key does not exist.")]
    FailedToLoadKey,
    /// Key could not be saved.
    #[error("Key could not be saved.")]
    FailedToSaveKey,
    /// File content is not a JWK.
    #[error("Failed to parse JSON string to JWK.")]
    FailedToParseJWK,
    /// Failed to create the key directory.
    #[error("Failed to create key directory.")]
    FailedToCreateDir,
    /// Stored key holds no private component.
    #[error("Stored key is not a private key.")]
    NotAPrivateKey,
    /// Key generation failed.
    #[error("Failed to generate key: {0}")]
    FailedToGenerateKey(String),
}

/// Reads, writes and generates the agent signing key below a directory.
pub trait KeyManager {
    /// Directory holding key material.
    fn key_dir(&self) -> &Path;

    fn signing_key_path(&self) -> PathBuf {
        self.key_dir().join(SIGNING_KEY_FILE)
    }

    /// Reads the signing key.
    fn read_signing_key(&self) -> Result<JWK, KeyManagerError> {
        let content = fs::read_to_string(self.signing_key_path())
            .map_err(|_| KeyManagerError::FailedToLoadKey)?;
        let key: JWK =
            serde_json::from_str(&content).map_err(|_| KeyManagerError::FailedToParseJWK)?;
        if !is_private(&key) {
            return Err(KeyManagerError::NotAPrivateKey);
        }
        Ok(key)
    }

    /// Saves the signing key. An existing key is never overwritten.
    fn save_signing_key(&self, key: &JWK) -> Result<(), KeyManagerError> {
        fs::create_dir_all(self.key_dir()).map_err(|_| KeyManagerError::FailedToCreateDir)?;
        let path = self.signing_key_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|_| KeyManagerError::FailedToSaveKey)?;
        let json = serde_json::to_string_pretty(key).map_err(|_| KeyManagerError::FailedToSaveKey)?;
        file.write_all(json.as_bytes())
            .map_err(|_| KeyManagerError::FailedToSaveKey)?;
        let mut permissions = fs::metadata(&path)
            .map_err(|_| KeyManagerError::FailedToSaveKey)?
            .permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).map_err(|_| KeyManagerError::FailedToSaveKey)
    }

    /// Reads the signing key, generating and saving a secp256k1 key on first use.
    fn load_or_generate(&self) -> Result<JWK, KeyManagerError> {
        if self.signing_key_path().exists() {
            return self.read_signing_key();
        }
        info!(
            "No signing key found, generating one at {:?}",
            self.signing_key_path()
        );
        let key = JWK::generate_secp256k1()
            .map_err(|err| KeyManagerError::FailedToGenerateKey(err.to_string()))?;
        self.save_signing_key(&key)?;
        Ok(key)
    }
}

/// Key manager rooted at the service data directory.
#[derive(Debug, Clone)]
pub struct AgentKeyManager {
    key_dir: PathBuf,
}

impl AgentKeyManager {
    /// Keys are kept in `<data_dir>/key_manager`; a leading `~` is expanded.
    pub fn new(data_dir: &str) -> Self {
        let data_dir = shellexpand::tilde(data_dir);
        Self {
            key_dir: Path::new(data_dir.as_ref()).join("key_manager"),
        }
    }
}

impl KeyManager for AgentKeyManager {
    fn key_dir(&self) -> &Path {
        &self.key_dir
    }
}
