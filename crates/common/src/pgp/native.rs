use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;

use super::{Fingerprint, PgpEngine, PgpError, PublicKeyInfo};
use crate::crypto::{sealed, PublicKey, SecretKey, PUBLIC_KEY_PEM_TAG};
use crate::perms;

const IDENTITY_EXTENSION: &str = "pem";

/// Engine built on native Ed25519 identities
///
/// Private keys live as PEM files in a keyring directory; public keys are
/// exchanged as PEM blocks tagged `REDACT PUBLIC KEY`. Encryption is a
/// [`sealed`] box, so no OpenPGP installation is needed.
#[derive(Debug, Clone, Default)]
pub struct NativeEngine {
    identities: Vec<(String, SecretKey)>,
}

impl NativeEngine {
    pub fn new(identities: Vec<(String, SecretKey)>) -> Self {
        Self { identities }
    }

    /// Load every `*.pem` private key in `dir`
    ///
    /// A missing directory is an empty keyring.
    pub fn load_keyring(dir: &Path) -> Result<Self, PgpError> {
        let mut identities = Vec::new();
        if !dir.exists() {
            return Ok(Self { identities });
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == IDENTITY_EXTENSION))
            .collect();
        paths.sort();

        for path in paths {
            let pem = fs::read_to_string(&path)?;
            let key = SecretKey::from_pem(&pem)
                .map_err(|e| anyhow!("{}: {}", path.display(), e))?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            identities.push((name, key));
        }
        tracing::debug!(dir = %dir.display(), count = identities.len(), "loaded native keyring");
        Ok(Self { identities })
    }

    /// Generate a new identity and persist it owner-only as `<dir>/<name>.pem`
    pub fn create_identity(dir: &Path, name: &str) -> Result<SecretKey, PgpError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(anyhow!("invalid identity name {:?}", name).into());
        }
        let path = dir.join(format!("{}.{}", name, IDENTITY_EXTENSION));
        if path.exists() {
            return Err(anyhow!("identity {} already exists", path.display()).into());
        }

        perms::create_private_dir(dir)?;
        let key = SecretKey::generate().map_err(|e| anyhow!("{}", e))?;
        perms::write_private_file(&path, key.to_pem().as_bytes())?;
        Ok(key)
    }

    pub fn identities(&self) -> impl Iterator<Item = (&str, &SecretKey)> + '_ {
        self.identities.iter().map(|(name, key)| (name.as_str(), key))
    }

    fn identity(&self, fingerprint: &Fingerprint) -> Option<&SecretKey> {
        self.identities
            .iter()
            .map(|(_, key)| key)
            .find(|key| &key.public().fingerprint() == fingerprint)
    }
}

/// Describe a native public key the way the exchange protocol expects
pub fn public_key_info(key: &PublicKey, identities: Vec<String>) -> PublicKeyInfo {
    PublicKeyInfo {
        fingerprint: key.fingerprint(),
        identities,
        expiry: None,
        armored: key.to_pem().into_bytes(),
    }
}

impl PgpEngine for NativeEngine {
    fn encrypt(&self, plaintext: &[u8], recipient: &PublicKeyInfo) -> Result<Vec<u8>, PgpError> {
        let armored = std::str::from_utf8(&recipient.armored)
            .map_err(|_| PgpError::MalformedKey("public key is not valid UTF-8".to_string()))?;
        let key =
            PublicKey::from_pem(armored).map_err(|e| PgpError::MalformedKey(e.to_string()))?;
        if key.fingerprint() != recipient.fingerprint {
            return Err(PgpError::MalformedKey(format!(
                "armored key does not match fingerprint {}",
                recipient.fingerprint
            )));
        }
        Ok(sealed::seal(plaintext, &key).map_err(|e| anyhow!("{}", e))?)
    }

    fn decrypt(&self, ciphertext: &[u8], selector: &Fingerprint) -> Result<Vec<u8>, PgpError> {
        let key = self
            .identity(selector)
            .ok_or_else(|| PgpError::NoSecretKey(selector.clone()))?;
        sealed::open(ciphertext, key).map_err(|e| PgpError::DecryptionFailed(e.to_string()))
    }

    fn list_public_keys(&self, source: &[u8]) -> Result<Vec<PublicKeyInfo>, PgpError> {
        let blocks = pem::parse_many(source).map_err(|e| PgpError::MalformedKey(e.to_string()))?;
        blocks
            .iter()
            .filter(|block| block.tag() == PUBLIC_KEY_PEM_TAG)
            .map(|block| {
                PublicKey::from_parsed_pem(block)
                    .map(|key| public_key_info(&key, vec![]))
                    .map_err(|e| PgpError::MalformedKey(e.to_string()))
            })
            .collect()
    }

    fn secret_key_fingerprints(&self) -> Result<Vec<Fingerprint>, PgpError> {
        Ok(self
            .identities
            .iter()
            .map(|(_, key)| key.public().fingerprint())
            .collect())
    }
}
