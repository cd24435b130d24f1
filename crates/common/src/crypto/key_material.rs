//! Symmetric key material for a single epoch
//!
//! One `KeyMaterial` holds everything needed to encode and decode content
//! written under its epoch:
//! - **AES subkey**: 32 bytes, keys the AEAD construction
//! - **HMAC subkey**: 64 bytes, derives the synthetic nonce from the plaintext
//!
//! The raw secret never leaves this type except through the subkey accessors
//! and the store serializer. `Debug` is redacted and `Display` prints only a
//! short SHA-1 based identifier.

use std::fmt;

use sha1::{Digest, Sha1};
use zeroize::Zeroize;

/// Size of the AES-256 subkey in bytes
pub const AES_KEY_SIZE: usize = 32;
/// Size of the HMAC-SHA-256 subkey in bytes
pub const HMAC_KEY_SIZE: usize = 64;
/// Size of a format 0 secret in bytes (AES subkey || HMAC subkey)
pub const SECRET_SIZE: usize = AES_KEY_SIZE + HMAC_KEY_SIZE;

/// Key generation counter. Epoch 0 is reserved and means "latest".
pub type Epoch = u32;

/// Epoch value callers pass to ask for the newest key
pub const LATEST_EPOCH: Epoch = 0;

/// Errors that can occur while building key material
#[derive(Debug, thiserror::Error)]
pub enum KeyMaterialError {
    #[error("invalid secret size, expected {expected}, got {got}")]
    InvalidSize { expected: usize, got: usize },
    #[error("epoch 0 is reserved")]
    ReservedEpoch,
    #[error("random source failed: {0}")]
    Random(getrandom::Error),
}

/// On-disk layout of a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFormat {
    /// 96 bytes: AES-256 subkey followed by HMAC-SHA-256 subkey
    V0,
}

impl KeyFormat {
    pub fn tag(&self) -> u32 {
        match self {
            KeyFormat::V0 => 0,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(KeyFormat::V0),
            _ => None,
        }
    }

    pub fn secret_size(&self) -> usize {
        match self {
            KeyFormat::V0 => SECRET_SIZE,
        }
    }
}

/// The symmetric secret for one epoch
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    format: KeyFormat,
    epoch: Epoch,
    secret: [u8; SECRET_SIZE],
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("format", &self.format)
            .field("epoch", &self.epoch)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digest = Sha1::digest(&self.secret[..]);
        write!(f, "#{} {}", self.epoch, hex::encode(&digest[..4]))
    }
}

impl KeyMaterial {
    /// Generate fresh key material for `epoch` from the OS random source
    pub fn generate(epoch: Epoch) -> Result<Self, KeyMaterialError> {
        if epoch == LATEST_EPOCH {
            return Err(KeyMaterialError::ReservedEpoch);
        }
        let mut secret = [0u8; SECRET_SIZE];
        getrandom::getrandom(&mut secret).map_err(KeyMaterialError::Random)?;
        Ok(Self {
            format: KeyFormat::V0,
            epoch,
            secret,
        })
    }

    /// Rebuild key material from persisted bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly `SECRET_SIZE` bytes or
    /// the epoch is the reserved value 0.
    pub fn from_slice(epoch: Epoch, data: &[u8]) -> Result<Self, KeyMaterialError> {
        if epoch == LATEST_EPOCH {
            return Err(KeyMaterialError::ReservedEpoch);
        }
        if data.len() != SECRET_SIZE {
            return Err(KeyMaterialError::InvalidSize {
                expected: SECRET_SIZE,
                got: data.len(),
            });
        }
        let mut secret = [0u8; SECRET_SIZE];
        secret.copy_from_slice(data);
        Ok(Self {
            format: KeyFormat::V0,
            epoch,
            secret,
        })
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn format(&self) -> KeyFormat {
        self.format
    }

    /// The AEAD key
    pub fn aes_key(&self) -> &[u8] {
        &self.secret[..AES_KEY_SIZE]
    }

    /// The nonce derivation key
    pub fn hmac_key(&self) -> &[u8] {
        &self.secret[AES_KEY_SIZE..]
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.secret
    }
}
