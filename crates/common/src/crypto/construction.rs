//! AEAD constructions and their registry
//!
//! A construction is a keyed AEAD primitive identified on the wire by a
//! small integer. The set is closed: AES-256-GCM and ChaCha20-Poly1305, both
//! with 32-byte keys, 12-byte nonces and 16-byte tags.
//!
//! The [`Registry`] maps wire ids to constructions. It is built once at
//! startup, which is where a duplicate id is rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use aes_gcm::Aes256Gcm as AesGcmCipher;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305 as ChaChaCipher,
};
use serde::{Deserialize, Serialize};

/// Key size shared by both constructions (256 bits)
pub const KEY_SIZE: usize = 32;
/// Nonce size shared by both constructions (96 bits)
pub const NONCE_SIZE: usize = 12;
/// Authentication tag size shared by both constructions
pub const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("unknown construction id {0}")]
    UnknownConstruction(u32),
    #[error("unknown construction name {0:?}")]
    UnknownName(String),
    #[error("construction id {0} already registered")]
    ConstructionAlreadyRegistered(u32),
    #[error("{construction} requires a {expected} byte key, got {got}")]
    InvalidKeySize {
        construction: Construction,
        expected: usize,
        got: usize,
    },
    #[error("{construction} requires a {expected} byte nonce, got {got}")]
    InvalidNonceSize {
        construction: Construction,
        expected: usize,
        got: usize,
    },
    #[error("{0} encryption failed")]
    SealFailure(Construction),
    #[error("authentication failed")]
    AuthenticationFailure,
}

/// The operations every construction provides
pub trait CipherConstruction {
    fn required_key_size(&self) -> usize;
    fn nonce_size(&self) -> usize;
    /// Encrypt and authenticate, returning `ciphertext || tag`
    fn seal(&self, key: &[u8], nonce: &[u8], plaintext: &[u8])
        -> Result<Vec<u8>, ConstructionError>;
    /// Verify and decrypt `ciphertext || tag`
    ///
    /// Never returns partial plaintext: a tag mismatch yields
    /// `AuthenticationFailure` and nothing else.
    fn open(&self, key: &[u8], nonce: &[u8], ciphertext: &[u8])
        -> Result<Vec<u8>, ConstructionError>;
}

/// A registered AEAD algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Construction {
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl Default for Construction {
    fn default() -> Self {
        Construction::Aes256Gcm
    }
}

impl fmt::Display for Construction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Construction {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Construction::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConstructionError::UnknownName(s.to_string()))
    }
}

impl Construction {
    pub const ALL: [Construction; 2] = [Construction::Aes256Gcm, Construction::ChaCha20Poly1305];

    /// Wire id written into every envelope
    pub fn id(&self) -> u32 {
        match self {
            Construction::Aes256Gcm => 1,
            Construction::ChaCha20Poly1305 => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Construction::Aes256Gcm => "aes-256-gcm",
            Construction::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }

    pub fn tag_size(&self) -> usize {
        TAG_SIZE
    }

    fn check_sizes(&self, key: &[u8], nonce: &[u8]) -> Result<(), ConstructionError> {
        if key.len() != self.required_key_size() {
            return Err(ConstructionError::InvalidKeySize {
                construction: *self,
                expected: self.required_key_size(),
                got: key.len(),
            });
        }
        if nonce.len() != self.nonce_size() {
            return Err(ConstructionError::InvalidNonceSize {
                construction: *self,
                expected: self.nonce_size(),
                got: nonce.len(),
            });
        }
        Ok(())
    }
}

impl CipherConstruction for Construction {
    fn required_key_size(&self) -> usize {
        KEY_SIZE
    }

    fn nonce_size(&self) -> usize {
        NONCE_SIZE
    }

    fn seal(
        &self,
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ConstructionError> {
        self.check_sizes(key, nonce)?;
        let sealed = match self {
            Construction::Aes256Gcm => AesGcmCipher::new_from_slice(key)
                .map_err(|_| ConstructionError::SealFailure(*self))?
                .encrypt(aes_gcm::Nonce::from_slice(nonce), plaintext),
            Construction::ChaCha20Poly1305 => ChaChaCipher::new_from_slice(key)
                .map_err(|_| ConstructionError::SealFailure(*self))?
                .encrypt(chacha20poly1305::Nonce::from_slice(nonce), plaintext),
        };
        sealed.map_err(|_| ConstructionError::SealFailure(*self))
    }

    fn open(
        &self,
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, ConstructionError> {
        self.check_sizes(key, nonce)?;
        let opened = match self {
            Construction::Aes256Gcm => AesGcmCipher::new_from_slice(key)
                .map_err(|_| ConstructionError::AuthenticationFailure)?
                .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext),
            Construction::ChaCha20Poly1305 => ChaChaCipher::new_from_slice(key)
                .map_err(|_| ConstructionError::AuthenticationFailure)?
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext),
        };
        opened.map_err(|_| ConstructionError::AuthenticationFailure)
    }
}

/// Wire id to construction mapping
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<u32, Construction>,
}

impl Registry {
    /// A registry holding every built-in construction
    pub fn standard() -> Result<Self, ConstructionError> {
        let mut registry = Self::default();
        for construction in Construction::ALL {
            registry.register(construction)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, construction: Construction) -> Result<(), ConstructionError> {
        let id = construction.id();
        if self.entries.contains_key(&id) {
            return Err(ConstructionError::ConstructionAlreadyRegistered(id));
        }
        self.entries.insert(id, construction);
        Ok(())
    }

    pub fn lookup(&self, id: u32) -> Result<Construction, ConstructionError> {
        self.entries
            .get(&id)
            .copied()
            .ok_or(ConstructionError::UnknownConstruction(id))
    }

    pub fn contains(&self, construction: Construction) -> bool {
        self.entries.get(&construction.id()) == Some(&construction)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Construction)> + '_ {
        self.entries.iter().map(|(id, c)| (*id, *c))
    }
}
