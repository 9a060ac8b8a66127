//! Encrypted credential values.
//!
//! Credential fields in config files (`password`, `auth`, `access_key`,
//! `access_secret`) may hold `base64(nonce || ciphertext)` produced by
//! [`Secrets::encrypt`] under AES-256-GCM. [`Secrets::reveal`] turns a raw
//! field into the value to use: decryption failures fall back to the raw
//! text, so plaintext configs keep working.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use strata_config::Config;

use crate::error::{Error, Result};

/// Environment variable consulted when the config has no key.
pub const CREDENTIAL_KEY_ENV: &str = "STRATA_CREDENTIAL_KEY";

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// Name used in errors raised here.
const RESOURCE: &str = "credentials";

/// Credential decryptor.
///
/// Without a key every value is used as written.
#[derive(Clone, Default)]
pub struct Secrets {
    cipher: Option<Aes256Gcm>,
}

impl Secrets {
    /// Secrets without a key: every value is plaintext.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from a base64-encoded 32-byte key.
    pub fn from_key(key_b64: &str) -> Result<Self> {
        let key = STANDARD.decode(key_b64.trim()).map_err(|e| {
            Error::initialization(RESOURCE, "credential key is not valid base64", e)
        })?;
        if key.len() != KEY_SIZE {
            return Err(Error::Initialization {
                resource: RESOURCE.to_string(),
                reason: format!("credential key must be {KEY_SIZE} bytes, got {}", key.len()),
                source: None,
            });
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| Error::initialization(RESOURCE, "invalid credential key", e.to_string()))?;
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    /// Key from `[security] credential_key`, else from
    /// `STRATA_CREDENTIAL_KEY`, else none.
    pub fn from_config(config: &Config) -> Result<Self> {
        let configured = config
            .section("security")
            .optional_string("credential_key")
            .map_err(|e| Error::Initialization {
                resource: RESOURCE.to_string(),
                reason: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        match configured.or_else(|| std::env::var(CREDENTIAL_KEY_ENV).ok()) {
            Some(key) if !key.trim().is_empty() => Self::from_key(&key),
            _ => Ok(Self::none()),
        }
    }

    /// Generate a fresh random key, base64-encoded.
    #[must_use]
    pub fn generate_key() -> String {
        STANDARD.encode(Aes256Gcm::generate_key(&mut OsRng))
    }

    /// Whether a key is configured.
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Encrypt `plaintext` into the config-file representation.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher.as_ref().ok_or_else(|| Error::Initialization {
            resource: RESOURCE.to_string(),
            reason: format!("no credential key configured (set {CREDENTIAL_KEY_ENV})"),
            source: None,
        })?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::initialization(RESOURCE, "encryption failed", e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    /// The value to use for credential `field` of `resource`.
    ///
    /// Values that are not shaped like ciphertext are taken as plaintext.
    /// Values that are but fail to authenticate are also used as written,
    /// with a warning, since they are most likely plaintext that happens to
    /// be valid base64 or were encrypted under another key.
    pub fn reveal(&self, resource: &str, field: &str, raw: String) -> SecretString {
        let Some(cipher) = &self.cipher else {
            return SecretString::from(raw);
        };

        let decoded = match STANDARD.decode(raw.trim()) {
            Ok(bytes) if bytes.len() >= NONCE_SIZE + TAG_SIZE => bytes,
            _ => {
                tracing::debug!(resource, field, "credential is plaintext");
                return SecretString::from(raw);
            }
        };

        let (nonce, ciphertext) = decoded.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());

        match plaintext {
            Some(value) => SecretString::from(value),
            None => {
                tracing::warn!(
                    resource,
                    field,
                    "credential looks encrypted but could not be decrypted; using it as written"
                );
                SecretString::from(raw)
            }
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn keyed() -> Secrets {
        Secrets::from_key(&Secrets::generate_key()).unwrap()
    }

    #[test]
    fn encrypted_value_round_trips_through_reveal() {
        let secrets = keyed();
        let stored = secrets.encrypt("s3cret!").unwrap();
        assert_ne!(stored, "s3cret!");

        let revealed = secrets.reveal("primary", "password", stored);
        assert_eq!(revealed.expose_secret(), "s3cret!");
    }

    #[test]
    fn plaintext_passes_through() {
        let secrets = keyed();
        let revealed = secrets.reveal("primary", "password", "hunter2".to_string());
        assert_eq!(revealed.expose_secret(), "hunter2");
    }

    #[test]
    fn ciphertext_from_another_key_falls_back_to_raw() {
        let stored = keyed().encrypt("value").unwrap();
        let revealed = keyed().reveal("primary", "password", stored.clone());
        assert_eq!(revealed.expose_secret(), stored);
    }

    #[test]
    fn without_key_values_are_untouched() {
        let secrets = Secrets::none();
        assert!(!secrets.is_enabled());
        assert!(secrets.encrypt("x").is_err());
        let revealed = secrets.reveal("c", "auth", "abc".to_string());
        assert_eq!(revealed.expose_secret(), "abc");
    }

    #[test]
    fn short_keys_are_rejected() {
        let err = Secrets::from_key(&STANDARD.encode([0u8; 16])).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn key_is_read_from_security_section() {
        let key = Secrets::generate_key();
        let config =
            Config::from_toml_str(&format!("[security]\ncredential_key = \"{key}\"")).unwrap();
        assert!(Secrets::from_config(&config).unwrap().is_enabled());
    }
}
