//! Shared test utilities for key store and exchange integration tests
#![allow(dead_code)]

use common::crypto::{KeyStore, SecretKey};
use common::exchange::ExchangeDir;
use common::pgp::NativeEngine;
use tempfile::TempDir;

/// A scratch repository: a private key location and an exchange directory
pub struct TestRepo {
    pub temp: TempDir,
    pub store: KeyStore,
    pub exchange: ExchangeDir,
}

impl TestRepo {
    pub fn key_location(&self) -> std::path::PathBuf {
        self.temp.path().join("git").join("redact").join("key")
    }
}

/// Set up a repository whose store holds `epochs` generated epochs
pub fn setup_repo(epochs: usize) -> TestRepo {
    let temp = TempDir::new().unwrap();
    let mut store = KeyStore::new(temp.path().join("git").join("redact").join("key"));
    for _ in 0..epochs {
        store.generate().unwrap();
    }
    store.save().unwrap();
    let exchange = ExchangeDir::in_work_tree(&temp.path().join("work"));

    TestRepo {
        temp,
        store,
        exchange,
    }
}

/// A collaborator with a single native identity
pub fn collaborator() -> (NativeEngine, SecretKey) {
    let key = SecretKey::generate().unwrap();
    let engine = NativeEngine::new(vec![("collaborator".to_string(), key.clone())]);
    (engine, key)
}

/// Armored public key of `key`, as a collaborator would hand it over
pub fn public_key_source(key: &SecretKey) -> Vec<u8> {
    key.public().to_pem().into_bytes()
}
