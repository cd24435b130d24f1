//! Owner-only filesystem permissions
//!
//! Key material and native identities must never be readable by anyone but
//! their owner. Directories holding them are created `0700`, files `0600`,
//! and existing paths are checked before they are trusted.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Mode for directories holding secrets.
pub const PRIVATE_DIR_MODE: u32 = 0o700;
/// Mode for files holding secrets.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

#[derive(Debug, thiserror::Error)]
pub enum PermsError {
    #[error("{} has mode {mode:03o}, expected {expected:03o}", path.display())]
    Insecure {
        path: PathBuf,
        mode: u32,
        expected: u32,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Verify that no group or other permission bits are set on `path`.
#[cfg(unix)]
pub fn check_owner_only(path: &Path) -> Result<(), PermsError> {
    use std::os::unix::fs::PermissionsExt;

    let meta = fs::metadata(path)?;
    let mode = meta.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        let expected = if meta.is_dir() {
            PRIVATE_DIR_MODE
        } else {
            PRIVATE_FILE_MODE
        };
        return Err(PermsError::Insecure {
            path: path.to_path_buf(),
            mode,
            expected,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn check_owner_only(path: &Path) -> Result<(), PermsError> {
    fs::metadata(path)?;
    Ok(())
}

/// Create `path` (and missing parents) readable only by the owner.
pub fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(PRIVATE_DIR_MODE);
    }
    builder.create(path)
}

/// Write `data` to a new or truncated file readable only by the owner.
pub fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_private_dir_and_file_pass_check() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b");
        create_private_dir(&dir).unwrap();
        check_owner_only(&dir).unwrap();

        let file = dir.join("secret");
        write_private_file(&file, b"data").unwrap();
        check_owner_only(&file).unwrap();
    }

    #[test]
    fn test_group_readable_file_is_insecure() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("open");
        fs::write(&file, b"data").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o640)).unwrap();

        match check_owner_only(&file) {
            Err(PermsError::Insecure { mode, expected, .. }) => {
                assert_eq!(mode, 0o640);
                assert_eq!(expected, PRIVATE_FILE_MODE);
            }
            other => panic!("expected insecure error, got {:?}", other),
        }
    }
}
