use std::fmt;

use anyhow::anyhow;
use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::pgp::Fingerprint;

/// Size of Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of a native fingerprint in bytes (same width as an OpenPGP v4 fingerprint)
pub const FINGERPRINT_SIZE: usize = 20;

/// PEM tag for armored native public keys
pub const PUBLIC_KEY_PEM_TAG: &str = "REDACT PUBLIC KEY";
/// PEM tag for armored native private keys
pub const PRIVATE_KEY_PEM_TAG: &str = "REDACT PRIVATE KEY";

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Public half of a native identity
///
/// An Ed25519 public key. It is converted to X25519 when something is
/// sealed to it, and its fingerprint addresses the collaborator's exchange
/// artifacts.
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate()?;
/// let public_key = secret_key.public();
///
/// // Armor for the exchange directory
/// let pem = public_key.to_pem();
/// let recovered = PublicKey::from_pem(&pem)?;
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(VerifyingKey);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(anyhow!(
                "invalid public key size, expected {}, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut buff = [0; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(bytes);
        let key = VerifyingKey::from_bytes(&buff)
            .map_err(|_| anyhow!("public key is not a valid edwards point"))?;
        Ok(PublicKey(key))
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PUBLIC_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow!("public key hex decode error"))?;
        Self::try_from(&buff[..])
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// First 20 bytes of SHA-256 over the raw public key
    pub fn fingerprint(&self) -> Fingerprint {
        let digest = Sha256::digest(self.to_bytes());
        Fingerprint::from(&digest[..FINGERPRINT_SIZE])
    }

    /// Encode in PEM format with tag [`PUBLIC_KEY_PEM_TAG`]
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(PUBLIC_KEY_PEM_TAG, self.to_bytes());
        pem::encode(&pem)
    }

    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow!("failed to parse PEM: {}", e))?;
        Self::from_parsed_pem(&pem)
    }

    pub(crate) fn from_parsed_pem(pem: &pem::Pem) -> Result<Self, KeyError> {
        if pem.tag() != PUBLIC_KEY_PEM_TAG {
            return Err(anyhow!("invalid PEM tag, expected {}", PUBLIC_KEY_PEM_TAG).into());
        }
        Self::try_from(pem.contents())
    }

    /// Convert Ed25519 public key to X25519 (Montgomery curve) for ECDH
    ///
    /// # Errors
    ///
    /// Returns an error if the Ed25519 point cannot be decompressed.
    #[allow(clippy::wrong_self_convention)]
    pub(crate) fn to_x25519(&self) -> Result<X25519PublicKey, KeyError> {
        let edwards_bytes = self.to_bytes();
        let edwards_point = CompressedEdwardsY::from_slice(&edwards_bytes)
            .map_err(|_| anyhow!("public key invalid edwards point"))?
            .decompress()
            .ok_or_else(|| anyhow!("public key failed to decompress edwards point"))?;

        let montgomery_point = edwards_point.to_montgomery();
        Ok(X25519PublicKey::from(montgomery_point.to_bytes()))
    }
}

/// Private half of a native identity
///
/// Kept in the user's keyring directory as a PEM file with mode `0600`.
/// It never enters a repository.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(public: {})", self.public().to_hex())
    }
}

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&secret))
    }
}

impl SecretKey {
    /// Generate a new random secret key using the OS random source
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|e| anyhow!("failed to generate key: {}", e))?;
        Ok(Self::from(bytes))
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Encode in PEM format with tag [`PRIVATE_KEY_PEM_TAG`]
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(PRIVATE_KEY_PEM_TAG, self.to_bytes());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is malformed, carries the wrong tag, or
    /// the key size is incorrect.
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow!("failed to parse PEM: {}", e))?;

        if pem.tag() != PRIVATE_KEY_PEM_TAG {
            return Err(anyhow!("invalid PEM tag, expected {}", PRIVATE_KEY_PEM_TAG).into());
        }

        let contents = pem.contents();
        if contents.len() != PRIVATE_KEY_SIZE {
            return Err(anyhow!(
                "invalid private key size in PEM, expected {}, got {}",
                PRIVATE_KEY_SIZE,
                contents.len()
            )
            .into());
        }

        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        bytes.copy_from_slice(contents);
        Ok(Self::from(bytes))
    }

    /// Convert Ed25519 secret key to X25519 for ECDH
    ///
    /// The clamped scalar of the Ed25519 key is used directly as the X25519
    /// private key, matching the public key conversion above.
    pub(crate) fn to_x25519(&self) -> StaticSecret {
        StaticSecret::from(self.0.to_scalar_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keypair_hex_roundtrip() {
        let private_key = SecretKey::generate().unwrap();
        let public_key = private_key.public();

        let public_hex = public_key.to_hex();
        let recovered_public = PublicKey::from_hex(&public_hex).unwrap();
        assert_eq!(public_key, recovered_public);
        assert_eq!(
            PublicKey::from_hex(&format!("0x{}", public_hex)).unwrap(),
            public_key
        );
    }

    #[test]
    fn test_pem_serialization() {
        let private_key = SecretKey::generate().unwrap();

        let pem = private_key.to_pem();
        let recovered_private = SecretKey::from_pem(&pem).unwrap();
        assert_eq!(private_key.to_bytes(), recovered_private.to_bytes());
        assert_eq!(private_key.public(), recovered_private.public());

        let public_pem = private_key.public().to_pem();
        assert_eq!(PublicKey::from_pem(&public_pem).unwrap(), private_key.public());

        // Tags are not interchangeable
        assert!(SecretKey::from_pem(&public_pem).is_err());
        assert!(PublicKey::from_pem(&pem).is_err());
    }

    #[test]
    fn test_x25519_conversion_agrees() {
        let alice = SecretKey::generate().unwrap();
        let bob = SecretKey::generate().unwrap();

        let ab = alice
            .to_x25519()
            .diffie_hellman(&bob.public().to_x25519().unwrap());
        let ba = bob
            .to_x25519()
            .diffie_hellman(&alice.public().to_x25519().unwrap());
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let key = SecretKey::from([5u8; PRIVATE_KEY_SIZE]).public();
        assert_eq!(key.fingerprint(), key.fingerprint());
        assert_eq!(key.fingerprint().as_bytes().len(), FINGERPRINT_SIZE);
        assert_ne!(
            key.fingerprint(),
            SecretKey::from([6u8; PRIVATE_KEY_SIZE]).public().fingerprint()
        );
    }
}
