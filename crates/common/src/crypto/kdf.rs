//! HKDF-SHA-256 key derivation
//!
//! Used to turn raw Diffie-Hellman output into uniformly distributed
//! key-encryption keys. Envelope keys are never derived, they are stored.

use hkdf::Hkdf;
use sha2::Sha256;

#[derive(Debug, thiserror::Error)]
pub enum KdfError {
    #[error("requested {0} bytes, more than HKDF-SHA-256 can produce")]
    InvalidLength(usize),
}

/// Derive `N` bytes from `ikm` bound to `salt` and `info`
pub fn derive<const N: usize>(salt: &[u8], ikm: &[u8], info: &[u8]) -> Result<[u8; N], KdfError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; N];
    hk.expand(info, &mut okm)
        .map_err(|_| KdfError::InvalidLength(N))?;
    Ok(okm)
}
