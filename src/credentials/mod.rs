//! Credential bundles and the encryption envelope for their tokens.
//!
//! Every access or refresh token goes through [`TokenCipher::encrypt`] before
//! it is written into a [`CredentialBundle`] and through
//! [`TokenCipher::decrypt`] right before it is used.
//!
//! # Usage
//!
//! ```no_run
//! use marketlens::credentials::{CredentialBundle, GoogleCredentials, TokenCipher};
//!
//! # fn main() -> anyhow::Result<()> {
//! let key = std::env::var("MARKETLENS_ENCRYPTION_KEY")?;
//! let cipher = TokenCipher::new(&key)?;
//!
//! let bundle = CredentialBundle::Google(GoogleCredentials {
//!     access_token: cipher.encrypt("ya29.access")?,
//!     refresh_token: cipher.encrypt_opt(Some("1//refresh"))?,
//!     expires_at: None,
//!     token_type: "Bearer".to_string(),
//!     property_id: None,
//! });
//!
//! let token = cipher.decrypt(bundle.access_token())?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - AES-256-GCM with a unique random nonce per token
//! - Master key must be 32 bytes (256 bits) and lives in memory only
//! - Tampering or a wrong key is a hard error, never an empty token

mod bundle;
mod encryption;

pub use bundle::{CredentialBundle, FacebookCredentials, FacebookPage, GoogleCredentials};
pub use encryption::{validate_key, CryptoError, TokenCipher};
