//! At-rest encryption for data source credentials.
//!
//! Ciphertext is `base64(nonce || ciphertext || tag)` with a 12 byte nonce.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use once_cell::sync::OnceCell;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{self, Environment};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

pub trait CredentialEncryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;

    /// Whether stored values are actually protected
    fn is_encrypting(&self) -> bool {
        true
    }
}

pub struct Aes256GcmEncryptor {
    cipher: Aes256Gcm,
}

impl Aes256GcmEncryptor {
    pub fn new(key: [u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key);
        Self { cipher: Aes256Gcm::new(key) }
    }

    pub fn from_base64_key(key_base64: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid base64: {}", e)))?;

        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("Key must be 32 bytes, got {} bytes", bytes.len())))?;
        Ok(Self::new(key))
    }
}

impl CredentialEncryptor for Aes256GcmEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(&combined))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let combined = BASE64
            .decode(ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid base64: {}", e)))?;

        if combined.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::DecryptionFailed("Ciphertext too short".to_string()));
        }

        let (nonce_bytes, body) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|_| CryptoError::DecryptionFailed("Authentication tag mismatch".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
    }
}

/// Stores credentials as-is. Development only.
pub struct PlaintextEncryptor;

impl CredentialEncryptor for PlaintextEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        Ok(ciphertext.to_string())
    }

    fn is_encrypting(&self) -> bool {
        false
    }
}

/// Picks the encryptor for `environment`. A missing key is tolerated in
/// development and staging, a missing or malformed key fails in production.
pub fn create_encryptor(
    environment: Environment,
    key: Option<&str>,
) -> Result<Arc<dyn CredentialEncryptor>, CryptoError> {
    match key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => {
            let encryptor = Aes256GcmEncryptor::from_base64_key(key)?;
            tracing::info!("Credential encryption enabled with AES-256-GCM");
            Ok(Arc::new(encryptor))
        }
        None if environment == Environment::Production => Err(CryptoError::InvalidKey(
            "ENCRYPTION_KEY must be set in production".to_string(),
        )),
        None => {
            tracing::warn!(
                "ENCRYPTION_KEY not set; data source credentials will be stored in PLAINTEXT. \
                 Generate a key with `mssp keygen`"
            );
            Ok(Arc::new(PlaintextEncryptor))
        }
    }
}

static ENCRYPTOR: OnceCell<Arc<dyn CredentialEncryptor>> = OnceCell::new();

/// Process-wide encryptor built from configuration on first use
pub fn encryptor() -> Result<Arc<dyn CredentialEncryptor>, CryptoError> {
    ENCRYPTOR
        .get_or_try_init(|| {
            let cfg = config::config();
            create_encryptor(cfg.environment, cfg.security.encryption_key.as_deref())
        })
        .cloned()
}

/// Random 32-byte key, base64 encoded
pub fn generate_encryption_key() -> String {
    let mut key = [0u8; 32];
    rand::thread_rng().fill(&mut key);
    BASE64.encode(key)
}
