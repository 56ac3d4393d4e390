//! AES-256-GCM envelope for OAuth secrets.
//!
//! Each token is encrypted separately with a unique nonce. The envelope is a
//! single string, `base64(nonce):base64(ciphertext)`, so it can live inside a
//! JSON credential bundle next to the non-secret fields.
//! The master key must be 32 bytes (256 bits) and comes from configuration.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Separates the nonce from the ciphertext. Not part of the base64 alphabet.
const SEPARATOR: char = ':';

/// Errors raised by the credential envelope.
///
/// Decryption failures are hard errors: a token that cannot be decrypted must
/// never be handed to a provider as if it were valid.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("malformed token envelope: {0}")]
    MalformedEnvelope(String),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    #[error("decrypted token is not valid UTF-8")]
    InvalidUtf8,
}

/// Validates that the master key is exactly 32 bytes when base64 decoded.
///
/// # Returns
/// * `Ok(Vec<u8>)` - Decoded key bytes (32 bytes)
/// * `Err` - If key is invalid length or invalid base64
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>, CryptoError> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("not valid base64: {}", e)))?;

    if key_bytes.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey(format!(
            "key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        )));
    }

    Ok(key_bytes)
}

/// Symmetric cipher used for every token written into a credential bundle.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher(<redacted>)")
    }
}

impl TokenCipher {
    /// Builds a cipher from a base64-encoded 32-byte master key.
    pub fn new(key_base64: &str) -> Result<Self, CryptoError> {
        let key = validate_key(key_base64)?;
        Self::from_key_bytes(&key)
    }

    /// Builds a cipher from raw key bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "key must be {} bytes",
                KEY_SIZE
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// Encrypts a token with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        // Generate random nonce (never reuse!)
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(format!(
            "{}{}{}",
            BASE64.encode(nonce),
            SEPARATOR,
            BASE64.encode(ciphertext)
        ))
    }

    /// Decrypts an envelope produced by [`TokenCipher::encrypt`].
    pub fn decrypt(&self, envelope: &str) -> Result<String, CryptoError> {
        let (nonce_b64, ciphertext_b64) = envelope
            .split_once(SEPARATOR)
            .ok_or_else(|| CryptoError::MalformedEnvelope("missing nonce separator".into()))?;

        let nonce_bytes = BASE64
            .decode(nonce_b64)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("nonce: {}", e)))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::MalformedEnvelope(format!(
                "invalid nonce size: expected {}, got {}",
                NONCE_SIZE,
                nonce_bytes.len()
            )));
        }

        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("ciphertext: {}", e)))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Encrypts an optional token, keeping `None` as `None`.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }
}
