//! Epoch-versioned key store
//!
//! The key store keeps every generation of [`KeyMaterial`] a repository has
//! ever used, indexed by epoch. New content is always encoded under the
//! newest epoch while older content stays decodable under the epoch that
//! produced it, which is what makes rotation non-destructive to history.
//!
//! # On-disk format
//!
//! ```text
//! [ magic "\0REDACT\0": 8 bytes ][ format tag: u32 ]
//! repeated until EOF:
//! [ epoch: u32 ][ secret: 96 bytes ]
//! ```
//!
//! All integers are big-endian. The file lives beneath the git common
//! directory with mode `0600` inside a `0700` directory, and is replaced
//! atomically on save.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use super::key_material::{
    Epoch, KeyFormat, KeyMaterial, KeyMaterialError, LATEST_EPOCH, SECRET_SIZE,
};
use crate::perms::{self, PermsError};
use crate::wire;

/// Magic bytes opening every key store file
pub const STORE_MAGIC: &[u8; 8] = b"\0REDACT\0";
/// Size of one persisted record (epoch + secret)
pub const RECORD_SIZE: usize = 4 + SECRET_SIZE;

/// How `load` reacts to a key file or directory that others can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionPolicy {
    /// Refuse to load
    #[default]
    Strict,
    /// Load anyway and report a warning
    Lenient,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("no key for epoch {0}")]
    KeyNotFound(Epoch),
    #[error("invalid key store preamble")]
    InvalidPreamble,
    #[error("unsupported key store format {0}")]
    UnsupportedFormat(u32),
    #[error("duplicate epoch {0} in key store")]
    DuplicateEpoch(Epoch),
    #[error("corrupt key store: {0}")]
    Corrupt(String),
    #[error("insecure permissions on {}: mode {mode:03o}, expected {expected:03o}", path.display())]
    InsecurePermissions {
        path: PathBuf,
        mode: u32,
        expected: u32,
    },
    #[error("epoch counter exhausted")]
    EpochExhausted,
    #[error("key material error: {0}")]
    KeyMaterial(#[from] KeyMaterialError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<PermsError> for KeyStoreError {
    fn from(err: PermsError) -> Self {
        match err {
            PermsError::Insecure {
                path,
                mode,
                expected,
            } => KeyStoreError::InsecurePermissions {
                path,
                mode,
                expected,
            },
            PermsError::Io(e) => KeyStoreError::Io(e),
        }
    }
}

/// All key material of a repository, keyed by epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    location: PathBuf,
    keys: BTreeMap<Epoch, KeyMaterial>,
}

impl fmt::Display for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.latest() {
            Some(key) => write!(f, "{}: {}", self.location.display(), key),
            None => write!(f, "{}: empty", self.location.display()),
        }
    }
}

impl KeyStore {
    /// Create an empty store that will persist to `location`
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            keys: BTreeMap::new(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The newest epoch, or 0 when the store is empty
    pub fn latest_epoch(&self) -> Epoch {
        self.keys.keys().next_back().copied().unwrap_or(LATEST_EPOCH)
    }

    pub fn latest(&self) -> Option<&KeyMaterial> {
        self.keys.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Epochs in ascending order
    pub fn epochs(&self) -> impl Iterator<Item = Epoch> + '_ {
        self.keys.keys().copied()
    }

    /// Key material in ascending epoch order
    pub fn iter(&self) -> impl Iterator<Item = &KeyMaterial> + '_ {
        self.keys.values()
    }

    /// Allocate the next epoch and fill it with fresh random key material
    pub fn generate(&mut self) -> Result<&KeyMaterial, KeyStoreError> {
        let epoch = self
            .latest_epoch()
            .checked_add(1)
            .ok_or(KeyStoreError::EpochExhausted)?;
        let key = KeyMaterial::generate(epoch)?;
        tracing::debug!(epoch, "generated key material");
        Ok(self.keys.entry(epoch).or_insert(key))
    }

    /// Look up the key for `epoch`, where 0 means the latest
    pub fn key(&self, epoch: Epoch) -> Result<&KeyMaterial, KeyStoreError> {
        let resolved = if epoch == LATEST_EPOCH {
            self.latest_epoch()
        } else {
            epoch
        };
        self.keys
            .get(&resolved)
            .ok_or(KeyStoreError::KeyNotFound(epoch))
    }

    /// Load a store from `location`
    ///
    /// The containing directory and the file itself must be owner-only.
    /// Under [`PermissionPolicy::Lenient`] a violation is handed to
    /// `on_warning` instead of failing the load.
    ///
    /// # Errors
    ///
    /// - `InsecurePermissions` (strict policy only)
    /// - `InvalidPreamble`, `UnsupportedFormat`, `DuplicateEpoch`, `Corrupt`
    ///   for malformed content
    /// - `Io` if the file cannot be read
    pub fn load<F>(
        location: impl Into<PathBuf>,
        policy: PermissionPolicy,
        mut on_warning: F,
    ) -> Result<Self, KeyStoreError>
    where
        F: FnMut(&KeyStoreError),
    {
        let location = location.into();
        let dir = parent_dir(&location);

        for path in [dir, location.as_path()] {
            match perms::check_owner_only(path) {
                Ok(()) => {}
                Err(e @ PermsError::Insecure { .. }) if policy == PermissionPolicy::Lenient => {
                    on_warning(&e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let file = fs::File::open(&location)?;
        Self::read_from(location, BufReader::new(file))
    }

    /// Persist the store atomically
    ///
    /// Writes a temporary file next to the key file and renames it into
    /// place, creating the owner-only directory if needed.
    pub fn save(&self) -> Result<(), KeyStoreError> {
        let dir = parent_dir(&self.location);
        if !dir.exists() {
            perms::create_private_dir(dir)?;
        }

        let mut tmp = tempfile::Builder::new().prefix(".key-").tempfile_in(dir)?;
        self.write_to(&mut tmp)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.location).map_err(|e| e.error)?;

        tracing::debug!(
            location = %self.location.display(),
            epochs = self.keys.len(),
            "saved key store"
        );
        Ok(())
    }

    /// Serialize in the on-disk format
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STORE_MAGIC.len() + 4 + self.keys.len() * RECORD_SIZE);
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    /// Parse the on-disk format, binding the result to `location`
    pub fn from_bytes(location: impl Into<PathBuf>, data: &[u8]) -> Result<Self, KeyStoreError> {
        Self::read_from(location.into(), Cursor::new(data))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), KeyStoreError> {
        writer.write_all(STORE_MAGIC)?;
        wire::write_u32(writer, KeyFormat::V0.tag())?;
        for (epoch, key) in &self.keys {
            wire::write_u32(writer, *epoch)?;
            writer.write_all(key.bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(location: PathBuf, mut reader: R) -> Result<Self, KeyStoreError> {
        let mut magic = [0u8; 8];
        match reader.read_exact(&mut magic) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(KeyStoreError::InvalidPreamble)
            }
            Err(e) => return Err(e.into()),
        }
        if &magic != STORE_MAGIC {
            return Err(KeyStoreError::InvalidPreamble);
        }

        let tag = match wire::read_u32(&mut reader) {
            Ok(tag) => tag,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(KeyStoreError::Corrupt("missing format tag".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let format = KeyFormat::from_tag(tag).ok_or(KeyStoreError::UnsupportedFormat(tag))?;
        let secret_size = format.secret_size();

        let mut keys = BTreeMap::new();
        let mut record = vec![0u8; 4 + secret_size];
        loop {
            match wire::read_record(&mut reader, &mut record) {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(KeyStoreError::Corrupt(e.to_string()))
                }
                Err(e) => return Err(e.into()),
            }

            let epoch = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
            if epoch == LATEST_EPOCH {
                return Err(KeyStoreError::Corrupt("record uses reserved epoch 0".to_string()));
            }
            if keys.contains_key(&epoch) {
                return Err(KeyStoreError::DuplicateEpoch(epoch));
            }
            keys.insert(epoch, KeyMaterial::from_slice(epoch, &record[4..])?);
        }

        Ok(Self { location, keys })
    }
}

fn parent_dir(location: &Path) -> &Path {
    match location.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> KeyStore {
        KeyStore::new(temp.path().join("redact").join("key"))
    }

    #[test]
    fn test_generate_advances_epoch() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        assert_eq!(store.latest_epoch(), 0);
        assert!(store.is_empty());

        for expected in 1..=3 {
            let epoch = store.generate().unwrap().epoch();
            assert_eq!(epoch, expected);
            assert_eq!(store.latest_epoch(), expected);
        }
        assert_eq!(store.epochs().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_key_zero_resolves_latest() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        assert!(matches!(store.key(0), Err(KeyStoreError::KeyNotFound(0))));

        store.generate().unwrap();
        store.generate().unwrap();
        assert_eq!(store.key(0).unwrap().epoch(), 2);
        assert_eq!(store.key(1).unwrap().epoch(), 1);
        assert!(matches!(store.key(9), Err(KeyStoreError::KeyNotFound(9))));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        store.generate().unwrap();
        store.generate().unwrap();
        store.save().unwrap();

        let loaded = KeyStore::load(store.location(), PermissionPolicy::Strict, |_| {}).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.to_string(), store.to_string());
    }

    #[test]
    fn test_save_replaces_previous_copy() {
        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        store.generate().unwrap();
        store.save().unwrap();
        store.generate().unwrap();
        store.save().unwrap();

        let loaded = KeyStore::load(store.location(), PermissionPolicy::Strict, |_| {}).unwrap();
        assert_eq!(loaded.latest_epoch(), 2);

        let leftovers: Vec<_> = fs::read_dir(parent_dir(store.location()))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "key")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_empty_store_serializes_header_only() {
        let store = KeyStore::new("key");
        let bytes = store.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..8], STORE_MAGIC);

        let parsed = KeyStore::from_bytes("key", &bytes).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(parsed.to_string(), "key: empty");
    }

    #[test]
    fn test_invalid_preamble() {
        let mut bytes = KeyStore::new("key").to_bytes();
        bytes[1] = b'X';
        assert!(matches!(
            KeyStore::from_bytes("key", &bytes),
            Err(KeyStoreError::InvalidPreamble)
        ));
        assert!(matches!(
            KeyStore::from_bytes("key", b"\0RED"),
            Err(KeyStoreError::InvalidPreamble)
        ));
    }

    #[test]
    fn test_unsupported_format() {
        let mut bytes = KeyStore::new("key").to_bytes();
        bytes[11] = 3;
        assert!(matches!(
            KeyStore::from_bytes("key", &bytes),
            Err(KeyStoreError::UnsupportedFormat(3))
        ));
    }

    #[test]
    fn test_duplicate_epoch_is_rejected() {
        let mut store = KeyStore::new("key");
        store.generate().unwrap();
        let mut bytes = store.to_bytes();
        let record = bytes[12..12 + RECORD_SIZE].to_vec();
        bytes.extend_from_slice(&record);

        assert!(matches!(
            KeyStore::from_bytes("key", &bytes),
            Err(KeyStoreError::DuplicateEpoch(1))
        ));
    }

    #[test]
    fn test_truncated_record_is_corrupt() {
        let mut store = KeyStore::new("key");
        store.generate().unwrap();
        let bytes = store.to_bytes();

        assert!(matches!(
            KeyStore::from_bytes("key", &bytes[..bytes.len() - 1]),
            Err(KeyStoreError::Corrupt(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_policy() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        store.generate().unwrap();
        store.save().unwrap();
        fs::set_permissions(store.location(), fs::Permissions::from_mode(0o644)).unwrap();

        let strict = KeyStore::load(store.location(), PermissionPolicy::Strict, |_| {});
        assert!(matches!(
            strict,
            Err(KeyStoreError::InsecurePermissions { mode: 0o644, .. })
        ));

        let mut warnings = Vec::new();
        let lenient = KeyStore::load(store.location(), PermissionPolicy::Lenient, |w| {
            warnings.push(w.to_string())
        })
        .unwrap();
        assert_eq!(lenient.latest_epoch(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_creates_private_dir() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let mut store = store_in(&temp);
        store.generate().unwrap();
        store.save().unwrap();

        let dir_mode = fs::metadata(parent_dir(store.location()))
            .unwrap()
            .permissions()
            .mode();
        let file_mode = fs::metadata(store.location()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }
}
