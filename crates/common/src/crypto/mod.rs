//! Cryptographic primitives for redact
//!
//! This module provides the cryptographic foundation of a protected repository:
//!
//! - **Key material**: one 96-byte secret per epoch (AES-256 subkey + HMAC subkey)
//! - **Key store**: every epoch a repository has used, persisted owner-only
//!   beneath the git directory
//! - **Envelopes**: AES-256-GCM or ChaCha20-Poly1305 with a synthetic,
//!   HMAC-derived nonce carried in the envelope header
//! - **Native identities**: Ed25519 keypairs that can receive a sealed copy of
//!   the key store without an OpenPGP installation
//!
//! # Security Model
//!
//! ## Epochs
//! Rotating generates a new epoch; it never replaces an old one. New content
//! is encoded under the latest epoch, history stays decodable under the epoch
//! recorded in each envelope.
//!
//! ## Deterministic encoding
//! The nonce is a keyed hash of the plaintext, so re-encoding an unchanged
//! file produces identical bytes and git sees no modification. Without the
//! HMAC subkey the nonce is unpredictable, and two different plaintexts only
//! share a nonce on an HMAC collision.

mod construction;
mod envelope;
pub mod kdf;
mod key_material;
mod key_store;
mod keys;
pub mod sealed;

pub use construction::{
    CipherConstruction, Construction, ConstructionError, Registry, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use envelope::{
    derive_nonce, probe, Codec, CodecError, EnvelopeHeader, ENVELOPE_MAGIC, HEADER_SIZE,
};
pub use key_material::{
    Epoch, KeyFormat, KeyMaterial, KeyMaterialError, AES_KEY_SIZE, HMAC_KEY_SIZE, LATEST_EPOCH,
    SECRET_SIZE,
};
pub use key_store::{KeyStore, KeyStoreError, PermissionPolicy, RECORD_SIZE, STORE_MAGIC};
pub use keys::{
    KeyError, PublicKey, SecretKey, FINGERPRINT_SIZE, PRIVATE_KEY_PEM_TAG, PUBLIC_KEY_PEM_TAG,
};
