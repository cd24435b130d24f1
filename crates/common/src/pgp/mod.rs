//! The asymmetric engine seam
//!
//! The key-exchange protocol never performs public-key cryptography itself.
//! It talks to a [`PgpEngine`]: something that can describe public keys,
//! encrypt to one of them, and decrypt with a locally held private key.
//!
//! Two engines exist:
//! - [`NativeEngine`] in this crate, built on native Ed25519/X25519 identities
//! - a `gpg` subprocess adapter in the command-line crate

mod fingerprint;
mod native;

use chrono::{DateTime, Utc};

pub use fingerprint::{Fingerprint, FingerprintError};
pub use native::{public_key_info, NativeEngine};

#[derive(Debug, thiserror::Error)]
pub enum PgpError {
    #[error("no secret key available for {0}")]
    NoSecretKey(Fingerprint),
    #[error("malformed public key: {0}")]
    MalformedKey(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("pgp error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One public key found in a key source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    pub fingerprint: Fingerprint,
    /// User ids attached to the key, possibly empty
    pub identities: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
    /// Armored export of exactly this key
    pub armored: Vec<u8>,
}

impl PublicKeyInfo {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiry, Some(expiry) if expiry <= now)
    }

    /// Whether the key can still be encrypted to
    pub fn is_usable(&self) -> bool {
        !self.is_expired_at(Utc::now())
    }
}

/// Asymmetric encryption used to distribute the key store
pub trait PgpEngine {
    /// Encrypt `plaintext` so that only `recipient` can read it
    fn encrypt(&self, plaintext: &[u8], recipient: &PublicKeyInfo) -> Result<Vec<u8>, PgpError>;

    /// Decrypt `ciphertext` with the private key identified by `selector`
    fn decrypt(&self, ciphertext: &[u8], selector: &Fingerprint) -> Result<Vec<u8>, PgpError>;

    /// Describe every public key contained in `source`
    fn list_public_keys(&self, source: &[u8]) -> Result<Vec<PublicKeyInfo>, PgpError>;

    /// Fingerprints of the private keys available locally
    fn secret_key_fingerprints(&self) -> Result<Vec<Fingerprint>, PgpError>;
}
