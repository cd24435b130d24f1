//! Sealed boxes for native identities using ECDH + AES Key Wrap
//!
//! A sealed box encrypts an arbitrary payload so that only the holder of one
//! native [`SecretKey`] can open it. It is how the built-in engine wraps a
//! whole key store for a collaborator.
//!
//! # Protocol Overview
//!
//! To seal a payload for a recipient:
//! 1. **Generate ephemeral keypair**: Create a throwaway Ed25519 keypair
//! 2. **Perform ECDH**: Convert both keys to X25519 and compute the shared secret
//! 3. **Derive KEK**: Run the shared secret through HKDF-SHA-256, salted with
//!    both public keys
//! 4. **Wrap content key**: AES-KW the random 32-byte content key with the KEK
//! 5. **Encrypt payload**: ChaCha20-Poly1305 under the content key
//!
//! # Wire Format
//!
//! ```text
//! [ ephemeral_pubkey: 32 ][ wrapped_key: 40 ][ nonce: 12 ][ ciphertext || tag ]
//! ```

use aes_kw::KekAes256 as Kek;
use anyhow::anyhow;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

use super::kdf;
use super::keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};

/// Size of the random content key in bytes
pub const CONTENT_KEY_SIZE: usize = 32;
/// Size of AES Key Wrap integrity block in bytes
pub const KW_OVERHEAD: usize = 8;
/// Size of the wrapped content key
pub const WRAPPED_KEY_SIZE: usize = CONTENT_KEY_SIZE + KW_OVERHEAD;
/// Size of the ChaCha20-Poly1305 nonce
pub const NONCE_SIZE: usize = 12;
/// Size of everything before the ciphertext
pub const SEALED_HEADER_SIZE: usize = PUBLIC_KEY_SIZE + WRAPPED_KEY_SIZE + NONCE_SIZE;

const KEK_INFO: &[u8] = b"redact sealed box v1";

/// Errors that can occur while sealing or opening a box
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("seal error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

fn derive_kek(
    shared: &[u8],
    ephemeral: &PublicKey,
    recipient: &PublicKey,
) -> Result<Kek, SealError> {
    let mut salt = Vec::with_capacity(PUBLIC_KEY_SIZE * 2);
    salt.extend_from_slice(&ephemeral.to_bytes());
    salt.extend_from_slice(&recipient.to_bytes());
    let kek: [u8; CONTENT_KEY_SIZE] =
        kdf::derive(&salt, shared, KEK_INFO).map_err(|e| anyhow!("{}", e))?;
    Ok(Kek::from(kek))
}

/// Seal `plaintext` so that only `recipient` can open it
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, SealError> {
    // Generate ephemeral keypair
    let ephemeral_private = SecretKey::generate()?;
    let ephemeral_public = ephemeral_private.public();

    // Perform ECDH to get shared secret
    let shared_secret = ephemeral_private
        .to_x25519()
        .diffie_hellman(&recipient.to_x25519()?);
    let kek = derive_kek(shared_secret.as_bytes(), &ephemeral_public, recipient)?;

    let mut content_key = [0u8; CONTENT_KEY_SIZE];
    getrandom::getrandom(&mut content_key)
        .map_err(|e| anyhow!("failed to generate content key: {}", e))?;
    let wrapped = kek
        .wrap_vec(&content_key)
        .map_err(|_| anyhow!("AES-KW wrap error"))?;

    // sanity check we're getting `WRAPPED_KEY_SIZE` bytes here
    if wrapped.len() != WRAPPED_KEY_SIZE {
        return Err(anyhow!("expected wrapped key size is incorrect").into());
    }

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| anyhow!("failed to generate nonce: {}", e))?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&content_key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| anyhow!("encrypt error"))?;

    let mut out = Vec::with_capacity(SEALED_HEADER_SIZE + ciphertext.len());
    out.extend_from_slice(&ephemeral_public.to_bytes());
    out.extend_from_slice(&wrapped);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed box with the recipient's private key
///
/// # Errors
///
/// Returns an error if the box was sealed for a different recipient, is
/// truncated, or was tampered with.
pub fn open(data: &[u8], recipient_secret: &SecretKey) -> Result<Vec<u8>, SealError> {
    if data.len() < SEALED_HEADER_SIZE {
        return Err(anyhow!("sealed box too short").into());
    }

    let ephemeral_public = PublicKey::try_from(&data[..PUBLIC_KEY_SIZE])?;
    let wrapped = &data[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + WRAPPED_KEY_SIZE];
    let nonce = &data[PUBLIC_KEY_SIZE + WRAPPED_KEY_SIZE..SEALED_HEADER_SIZE];
    let ciphertext = &data[SEALED_HEADER_SIZE..];

    // Perform ECDH to get same shared secret
    let shared_secret = recipient_secret
        .to_x25519()
        .diffie_hellman(&ephemeral_public.to_x25519()?);
    let kek = derive_kek(
        shared_secret.as_bytes(),
        &ephemeral_public,
        &recipient_secret.public(),
    )?;

    let content_key = kek
        .unwrap_vec(wrapped)
        .map_err(|_| anyhow!("AES-KW unwrap error"))?;
    if content_key.len() != CONTENT_KEY_SIZE {
        return Err(anyhow!("unwrapped content key has wrong size").into());
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&content_key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| anyhow!("decrypt error"))?;
    Ok(plaintext)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open() {
        let private_key = SecretKey::generate().unwrap();
        let payload = b"the whole key store goes here".to_vec();

        let sealed = seal(&payload, &private_key.public()).unwrap();
        assert_eq!(sealed.len(), SEALED_HEADER_SIZE + payload.len() + 16);
        assert_eq!(open(&sealed, &private_key).unwrap(), payload);
    }

    #[test]
    fn test_wrong_recipient_cannot_open() {
        let alice = SecretKey::generate().unwrap();
        let bob = SecretKey::generate().unwrap();

        let sealed = seal(b"for alice", &alice.public()).unwrap();
        assert!(open(&sealed, &alice).is_ok());
        assert!(open(&sealed, &bob).is_err());
    }

    #[test]
    fn test_tampered_box_is_rejected() {
        let key = SecretKey::generate().unwrap();
        let mut sealed = seal(b"payload", &key.public()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(open(&sealed, &key).is_err());
        assert!(open(&sealed[..10], &key).is_err());
    }

    #[test]
    fn test_sealing_is_randomized() {
        let key = SecretKey::generate().unwrap();
        let a = seal(b"same", &key.public()).unwrap();
        let b = seal(b"same", &key.public()).unwrap();
        assert_ne!(a, b);
    }
}
