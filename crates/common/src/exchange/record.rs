use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::ExchangeError;
use crate::crypto::KeyStore;
use crate::pgp::{Fingerprint, PgpEngine};

/// One collaborator's pair of artifacts in the exchange directory
///
/// The record only knows where the artifacts live; whether each exists is
/// checked on demand because either may be missing after an interrupted
/// grant or revoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRecord {
    fingerprint: Fingerprint,
    public_key_path: PathBuf,
    wrapped_store_path: PathBuf,
}

impl ExchangeRecord {
    pub(crate) fn new(
        fingerprint: Fingerprint,
        public_key_path: PathBuf,
        wrapped_store_path: PathBuf,
    ) -> Self {
        Self {
            fingerprint,
            public_key_path,
            wrapped_store_path,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn public_key_path(&self) -> &Path {
        &self.public_key_path
    }

    pub fn wrapped_store_path(&self) -> &Path {
        &self.wrapped_store_path
    }

    pub fn has_public_key(&self) -> bool {
        self.public_key_path.is_file()
    }

    pub fn has_wrapped_store(&self) -> bool {
        self.wrapped_store_path.is_file()
    }

    pub fn read_public_key(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.public_key_path)
    }

    pub fn read_wrapped_store(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.wrapped_store_path)
    }

    /// Decrypt the key store wrapped for this record without saving it
    ///
    /// The returned store is bound to `location`; nothing is written there
    /// until the caller saves it.
    ///
    /// # Errors
    ///
    /// - `Pgp` if the engine cannot decrypt (wrong or missing private key)
    /// - `Corrupt` if decryption succeeded but the payload is not a key store
    pub fn recover(
        &self,
        engine: &dyn PgpEngine,
        location: impl Into<PathBuf>,
    ) -> Result<KeyStore, ExchangeError> {
        let wrapped = self.read_wrapped_store()?;
        let plaintext = engine.decrypt(&wrapped, &self.fingerprint)?;
        KeyStore::from_bytes(location, &plaintext).map_err(|source| ExchangeError::Corrupt {
            fingerprint: self.fingerprint.clone(),
            source,
        })
    }

    /// Recover the key store wrapped for this record and save it at `location`
    ///
    /// Overwrites whatever store is already there; use [`Self::recover`] to
    /// compare against a local store first.
    pub fn unlock(
        &self,
        engine: &dyn PgpEngine,
        location: impl Into<PathBuf>,
    ) -> Result<KeyStore, ExchangeError> {
        let store = self.recover(engine, location)?;
        store.save()?;

        tracing::debug!(
            fingerprint = %self.fingerprint,
            latest_epoch = store.latest_epoch(),
            "unlocked key store from exchange record"
        );
        Ok(store)
    }
}
