//! Integration tests for key store persistence

mod common;

use ::common::crypto::{KeyStore, KeyStoreError, PermissionPolicy};

#[test]
fn test_save_load_preserves_every_epoch() {
    let repo = common::setup_repo(3);

    let loaded = KeyStore::load(repo.key_location(), PermissionPolicy::Strict, |_| {}).unwrap();
    assert_eq!(loaded.latest_epoch(), 3);
    assert_eq!(loaded.epochs().collect::<Vec<_>>(), vec![1, 2, 3]);
    for epoch in 1..=3 {
        assert_eq!(loaded.key(epoch).unwrap(), repo.store.key(epoch).unwrap());
    }
}

#[test]
fn test_epochs_grow_across_sessions() {
    let repo = common::setup_repo(1);

    let mut loaded =
        KeyStore::load(repo.key_location(), PermissionPolicy::Strict, |_| {}).unwrap();
    let before = loaded.latest_epoch();
    loaded.generate().unwrap();
    loaded.save().unwrap();

    let reloaded =
        KeyStore::load(repo.key_location(), PermissionPolicy::Strict, |_| {}).unwrap();
    assert!(reloaded.latest_epoch() > before);
    assert_eq!(reloaded.key(before).unwrap(), repo.store.key(before).unwrap());
}

#[test]
fn test_missing_store() {
    let repo = common::setup_repo(1);
    let missing = repo.key_location().with_file_name("absent");

    match KeyStore::load(&missing, PermissionPolicy::Strict, |_| {}) {
        Err(KeyStoreError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[cfg(unix)]
#[test]
fn test_missing_store_in_shared_directory() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::TempDir::new().unwrap();
    let dir = temp.path().join("shared");
    std::fs::create_dir(&dir).unwrap();
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

    // The directory is checked before the file is opened
    assert!(matches!(
        KeyStore::load(dir.join("key"), PermissionPolicy::Strict, |_| {}),
        Err(KeyStoreError::InsecurePermissions { .. })
    ));
}

#[cfg(unix)]
#[test]
fn test_permission_policies() {
    use std::os::unix::fs::PermissionsExt;

    let repo = common::setup_repo(1);
    let location = repo.key_location();
    std::fs::set_permissions(&location, std::fs::Permissions::from_mode(0o644)).unwrap();

    assert!(matches!(
        KeyStore::load(&location, PermissionPolicy::Strict, |_| {}),
        Err(KeyStoreError::InsecurePermissions { .. })
    ));

    let mut warnings = Vec::new();
    let loaded = KeyStore::load(&location, PermissionPolicy::Lenient, |w| {
        warnings.push(w.to_string())
    })
    .unwrap();
    assert_eq!(loaded.latest_epoch(), 1);
    assert_eq!(warnings.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_saved_store_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let repo = common::setup_repo(1);
    let location = repo.key_location();
    let file_mode = std::fs::metadata(&location).unwrap().permissions().mode();
    let dir_mode = std::fs::metadata(location.parent().unwrap())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(file_mode & 0o777, 0o600);
    assert_eq!(dir_mode & 0o777, 0o700);
}
