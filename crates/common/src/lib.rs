/**
 * Symmetric cryptography for repository content.
 *  - Epoch-versioned key material and its on-disk store
 *  - AEAD constructions and the envelope codec
 *  - Native identities and sealed boxes
 */
pub mod crypto;
/**
 * Per-collaborator distribution of the key store.
 * Wraps the whole store once per public key and
 *  keeps every copy in sync across rotations.
 */
pub mod exchange;
/**
 * The asymmetric engine seam: fingerprints, public key
 *  descriptions, and a built-in engine.
 */
pub mod pgp;
/**
 * Owner-only permission checks and creation helpers.
 */
pub mod perms;
/**
 * Big-endian framing helpers shared by the on-disk
 *  formats.
 */
pub mod wire;

pub mod prelude {
    pub use crate::crypto::{Codec, Construction, KeyMaterial, KeyStore, PermissionPolicy};
    pub use crate::exchange::{ExchangeDir, ExchangeRecord, RotationReport};
    pub use crate::pgp::{Fingerprint, NativeEngine, PgpEngine, PublicKeyInfo};
}
