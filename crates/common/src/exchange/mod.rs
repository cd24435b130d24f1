//! # Key exchange
//!
//! The exchange directory is the only place key material enters version
//! control. For every collaborator it holds:
//!
//! - `<fingerprint>.asc`: the collaborator's public key, kept so the store can
//!   be re-wrapped later without fetching the key again
//! - `<fingerprint>.key`: the complete serialized [`KeyStore`], encrypted to
//!   that public key
//!
//! plus a fixed `.gitattributes` that keeps the artifacts themselves out of
//! the encryption filter.
//!
//! ## Lifecycle of a record
//!
//! ```text
//! absent --grant--> granted --rotate--> granted --revoke--> absent
//! ```
//!
//! Within one grant the public key is written and synced before the wrapped
//! store is attempted, so an interruption leaves at worst a public key with
//! nothing wrapped for it, which a second grant repairs.
//!
//! ## Rotation
//!
//! Every new epoch must be followed by [`ExchangeDir::rotate_all`]. A
//! collaborator whose copy is stale can still read old epochs but is locked
//! out of new content until the next successful rotation.

mod record;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::crypto::{KeyStore, KeyStoreError};
use crate::pgp::{Fingerprint, PgpEngine, PgpError, PublicKeyInfo};

pub use record::ExchangeRecord;

/// Conventional exchange directory name at the repository root
pub const EXCHANGE_DIR_NAME: &str = ".redact";
/// Extension of public key artifacts
pub const PUBLIC_KEY_EXTENSION: &str = "asc";
/// Extension of wrapped key store artifacts
pub const WRAPPED_STORE_EXTENSION: &str = "key";
/// Attributes file that exempts the directory from the filter
pub const GITATTRIBUTES_NAME: &str = ".gitattributes";
pub const GITATTRIBUTES_CONTENTS: &str =
    "# Exchange artifacts are public keys or already encrypted.\n* !filter !diff\n";

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("no usable public key to grant access to")]
    NobodyToGrant,
    #[error("no exchange record is addressed to a local secret key")]
    NoSuitableKey,
    #[error("several exchange records are addressed to local secret keys: {}", join(.0))]
    AmbiguousSelection(Vec<Fingerprint>),
    #[error("no exchange record for {0}")]
    NotFound(Fingerprint),
    #[error("public key artifact for {0} does not contain that key")]
    MissingPublicKey(Fingerprint),
    #[error("public key {0} has expired")]
    Expired(Fingerprint),
    #[error("exchange record for {fingerprint} decrypted to an invalid key store: {source}")]
    Corrupt {
        fingerprint: Fingerprint,
        source: KeyStoreError,
    },
    #[error("rotation stopped after updating {updated} collaborators: {source}")]
    PartialRotationFailure {
        updated: usize,
        source: Box<ExchangeError>,
    },
    #[error("revoking {fingerprint} left artifacts behind: {}", describe_failures(.failures))]
    RevokeFailed {
        fingerprint: Fingerprint,
        failures: Vec<(PathBuf, io::Error)>,
    },
    #[error("pgp error: {0}")]
    Pgp(#[from] PgpError),
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn join(fingerprints: &[Fingerprint]) -> String {
    fingerprints
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_failures(failures: &[(PathBuf, io::Error)]) -> String {
    failures
        .iter()
        .map(|(path, e)| format!("{}: {}", path.display(), e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of [`ExchangeDir::rotate_all`]
#[derive(Debug, Default)]
pub struct RotationReport {
    /// Collaborators whose wrapped store now holds the current store
    pub updated: Vec<Fingerprint>,
    /// Collaborators whose update failed; each failure went to the handler
    pub failed: Vec<Fingerprint>,
    /// Set when the directory itself could not be enumerated
    pub error: Option<ExchangeError>,
}

impl RotationReport {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    /// Fold the hard error, if any, into `PartialRotationFailure`
    pub fn into_result(self) -> Result<usize, ExchangeError> {
        let updated = self.updated.len();
        match self.error {
            Some(source) => Err(ExchangeError::PartialRotationFailure {
                updated,
                source: Box::new(source),
            }),
            None => Ok(updated),
        }
    }
}

/// The repository-tracked directory of per-collaborator artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDir {
    path: PathBuf,
}

impl ExchangeDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The exchange directory of the work tree rooted at `root`
    pub fn in_work_tree(root: &Path) -> Self {
        Self::new(root.join(EXCHANGE_DIR_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory and its `.gitattributes`
    pub fn init(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path)?;
        let attributes = self.path.join(GITATTRIBUTES_NAME);
        let current = fs::read_to_string(&attributes).ok();
        if current.as_deref() != Some(GITATTRIBUTES_CONTENTS) {
            write_synced(&attributes, GITATTRIBUTES_CONTENTS.as_bytes())?;
        }
        Ok(())
    }

    /// The record addressed by `fingerprint`, whether or not it exists
    pub fn record(&self, fingerprint: &Fingerprint) -> ExchangeRecord {
        let stem = fingerprint.to_hex();
        ExchangeRecord::new(
            fingerprint.clone(),
            self.path
                .join(format!("{}.{}", stem, PUBLIC_KEY_EXTENSION)),
            self.path
                .join(format!("{}.{}", stem, WRAPPED_STORE_EXTENSION)),
        )
    }

    /// Every record with at least one artifact on disk, ordered by fingerprint
    pub fn records(&self) -> Result<Vec<ExchangeRecord>, ExchangeError> {
        let fingerprints =
            self.fingerprints_with(&[PUBLIC_KEY_EXTENSION, WRAPPED_STORE_EXTENSION])?;
        Ok(fingerprints.iter().map(|f| self.record(f)).collect())
    }

    fn fingerprints_with(&self, extensions: &[&str]) -> io::Result<BTreeSet<Fingerprint>> {
        let mut found = BTreeSet::new();
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let path = entry?.path();
            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext));
            if !matches_extension {
                continue;
            }
            let fingerprint = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<Fingerprint>().ok());
            match fingerprint {
                Some(fingerprint) => {
                    found.insert(fingerprint);
                }
                None => tracing::debug!(path = %path.display(), "ignoring unrecognized artifact"),
            }
        }
        Ok(found)
    }

    /// Grant every usable key in `source` access to `store`
    ///
    /// Returns the fingerprints granted. Granting again overwrites both
    /// artifacts with the current store.
    ///
    /// # Errors
    ///
    /// - `NobodyToGrant` if `source` holds no usable public key
    /// - `Pgp` / `Io` if listing, encrypting or writing fails
    pub fn grant(
        &self,
        engine: &dyn PgpEngine,
        store: &KeyStore,
        source: &[u8],
    ) -> Result<Vec<Fingerprint>, ExchangeError> {
        let keys: Vec<PublicKeyInfo> = engine
            .list_public_keys(source)?
            .into_iter()
            .filter(|key| {
                let usable = key.is_usable();
                if !usable {
                    tracing::debug!(fingerprint = %key.fingerprint, "skipping expired key");
                }
                usable
            })
            .collect();
        if keys.is_empty() {
            return Err(ExchangeError::NobodyToGrant);
        }

        self.init()?;
        let serialized = store.to_bytes();
        let mut granted = Vec::with_capacity(keys.len());
        for key in &keys {
            let record = self.record(&key.fingerprint);
            write_synced(record.public_key_path(), &key.armored)?;
            self.wrap(engine, &serialized, key, &record)?;
            tracing::debug!(fingerprint = %key.fingerprint, "granted access");
            granted.push(key.fingerprint.clone());
        }
        Ok(granted)
    }

    fn wrap(
        &self,
        engine: &dyn PgpEngine,
        serialized: &[u8],
        key: &PublicKeyInfo,
        record: &ExchangeRecord,
    ) -> Result<(), ExchangeError> {
        let wrapped = engine.encrypt(serialized, key)?;
        write_synced(record.wrapped_store_path(), &wrapped)?;
        Ok(())
    }

    /// Re-wrap the current `store` for every collaborator on file
    ///
    /// Each collaborator is processed independently: a failure is passed to
    /// `on_error` and the remaining collaborators are still updated. Only a
    /// failure to enumerate the directory is reported as the report's hard
    /// error. Iteration order is unspecified.
    pub fn rotate_all<F>(
        &self,
        engine: &dyn PgpEngine,
        store: &KeyStore,
        mut on_error: F,
    ) -> RotationReport
    where
        F: FnMut(&Fingerprint, &ExchangeError),
    {
        let mut report = RotationReport::default();
        let fingerprints = match self.fingerprints_with(&[PUBLIC_KEY_EXTENSION]) {
            Ok(fingerprints) => fingerprints,
            Err(e) => {
                report.error = Some(e.into());
                return report;
            }
        };

        let serialized = store.to_bytes();
        for fingerprint in fingerprints {
            let record = self.record(&fingerprint);
            match self.rewrap(engine, &serialized, &record) {
                Ok(()) => {
                    tracing::debug!(%fingerprint, epoch = store.latest_epoch(), "rotated");
                    report.updated.push(fingerprint);
                }
                Err(e) => {
                    on_error(&fingerprint, &e);
                    report.failed.push(fingerprint);
                }
            }
        }
        report
    }

    fn rewrap(
        &self,
        engine: &dyn PgpEngine,
        serialized: &[u8],
        record: &ExchangeRecord,
    ) -> Result<(), ExchangeError> {
        let armored = record.read_public_key()?;
        let key = engine
            .list_public_keys(&armored)?
            .into_iter()
            .find(|key| &key.fingerprint == record.fingerprint())
            .ok_or_else(|| ExchangeError::MissingPublicKey(record.fingerprint().clone()))?;
        if !key.is_usable() {
            return Err(ExchangeError::Expired(key.fingerprint));
        }
        self.wrap(engine, serialized, &key, record)
    }

    /// Pick the single record a local secret key can open
    ///
    /// Never guesses: when more than one record matches, every match is
    /// returned inside `AmbiguousSelection` so the caller can show them.
    pub fn select(&self, candidates: &[Fingerprint]) -> Result<ExchangeRecord, ExchangeError> {
        let mut matches: Vec<ExchangeRecord> = self
            .fingerprints_with(&[WRAPPED_STORE_EXTENSION])?
            .into_iter()
            .filter(|fingerprint| candidates.contains(fingerprint))
            .map(|fingerprint| self.record(&fingerprint))
            .collect();

        match matches.len() {
            0 => Err(ExchangeError::NoSuitableKey),
            1 => Ok(matches.remove(0)),
            _ => Err(ExchangeError::AmbiguousSelection(
                matches.iter().map(|r| r.fingerprint().clone()).collect(),
            )),
        }
    }

    /// Remove both artifacts of `fingerprint`
    ///
    /// The wrapped store goes first. Each removal failure is reported on its
    /// own inside `RevokeFailed`.
    pub fn revoke(&self, fingerprint: &Fingerprint) -> Result<(), ExchangeError> {
        let record = self.record(fingerprint);
        let mut removed = 0;
        let mut failures = Vec::new();

        for path in [record.wrapped_store_path(), record.public_key_path()] {
            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => failures.push((path.to_path_buf(), e)),
            }
        }

        if !failures.is_empty() {
            return Err(ExchangeError::RevokeFailed {
                fingerprint: fingerprint.clone(),
                failures,
            });
        }
        if removed == 0 {
            return Err(ExchangeError::NotFound(fingerprint.clone()));
        }
        tracing::debug!(%fingerprint, "revoked access");
        Ok(())
    }
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}
