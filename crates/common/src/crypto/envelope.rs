//! Self-describing encrypted envelopes
//!
//! Every encrypted file in a repository is stored as an envelope:
//!
//! ```text
//! [ magic "\0REDACTED\0": 10 bytes ]
//! [ construction id: u32 ][ key epoch: u32 ]
//! [ nonce: construction nonce size ]
//! [ ciphertext || tag ]
//! ```
//!
//! # Synthetic nonces
//!
//! The nonce is `HMAC-SHA-256(hmac subkey, plaintext)` truncated to the
//! construction's nonce size. It is computed once when encoding and carried
//! in the envelope, so decoding never has to recompute it. Identical
//! plaintext under the same epoch and construction therefore always yields
//! an identical envelope, which keeps git from seeing spurious changes, and
//! no nonce is ever drawn from a counter or a random source.

use std::io::{self, Read, Write};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::construction::{CipherConstruction, Construction, ConstructionError, Registry};
use super::key_material::{Epoch, KeyMaterial, LATEST_EPOCH};
use super::key_store::{KeyStore, KeyStoreError};
use crate::wire;

type HmacSha256 = Hmac<Sha256>;

/// Magic bytes opening every envelope
pub const ENVELOPE_MAGIC: &[u8; 10] = b"\0REDACTED\0";
/// Size of the fixed header (magic, construction id, epoch)
pub const HEADER_SIZE: usize = ENVELOPE_MAGIC.len() + 4 + 4;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid envelope preamble")]
    InvalidPreamble,
    #[error("envelope truncated in {0}")]
    Truncated(&'static str),
    #[error("nonce derivation failed")]
    NonceDerivation,
    #[error("construction error: {0}")]
    Construction(#[from] ConstructionError),
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            CodecError::Construction(ConstructionError::AuthenticationFailure)
        )
    }
}

/// The fixed-size part of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub construction_id: u32,
    pub epoch: Epoch,
}

impl EnvelopeHeader {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(ENVELOPE_MAGIC)?;
        wire::write_u32(writer, self.construction_id)?;
        wire::write_u32(writer, self.epoch)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, CodecError> {
        let mut magic = [0u8; 10];
        reader
            .read_exact(&mut magic)
            .map_err(|e| eof_as(e, CodecError::InvalidPreamble))?;
        if &magic != ENVELOPE_MAGIC {
            return Err(CodecError::InvalidPreamble);
        }
        let construction_id = wire::read_u32(reader)
            .map_err(|e| eof_as(e, CodecError::Truncated("construction id")))?;
        let epoch = wire::read_u32(reader).map_err(|e| eof_as(e, CodecError::Truncated("epoch")))?;
        Ok(Self {
            construction_id,
            epoch,
        })
    }
}

fn eof_as(err: io::Error, replacement: CodecError) -> CodecError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        replacement
    } else {
        CodecError::Io(err)
    }
}

/// Derive the synthetic nonce for `plaintext` under `key`
pub fn derive_nonce(
    key: &KeyMaterial,
    plaintext: &[u8],
    size: usize,
) -> Result<Vec<u8>, CodecError> {
    let mut mac =
        HmacSha256::new_from_slice(key.hmac_key()).map_err(|_| CodecError::NonceDerivation)?;
    mac.update(plaintext);
    let digest = mac.finalize().into_bytes();
    if size > digest.len() {
        return Err(CodecError::NonceDerivation);
    }
    Ok(digest[..size].to_vec())
}

/// Classify `input` as encoded or not by reading only the header
///
/// Returns `(true, epoch)` for a well-formed header and `(false, 0)` for
/// anything else, including read errors. A missing header is how plaintext
/// is told apart from ciphertext.
pub fn probe<R: Read>(mut input: R) -> (bool, Epoch) {
    match EnvelopeHeader::read_from(&mut input) {
        Ok(header) => (true, header.epoch),
        Err(_) => (false, LATEST_EPOCH),
    }
}

/// Encodes and decodes envelopes against a fixed construction registry
#[derive(Debug, Clone)]
pub struct Codec {
    registry: Registry,
}

impl Codec {
    /// A codec over every built-in construction
    pub fn new() -> Result<Self, CodecError> {
        Ok(Self {
            registry: Registry::standard()?,
        })
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode `plaintext` under `epoch` (0 for latest) with the construction
    /// registered as `construction_id`, writing the envelope to `out`
    ///
    /// Key and construction are resolved before anything is written.
    pub fn encode<W: Write>(
        &self,
        construction_id: u32,
        epoch: Epoch,
        store: &KeyStore,
        plaintext: &[u8],
        out: &mut W,
    ) -> Result<(), CodecError> {
        let construction = self.registry.lookup(construction_id)?;
        let key = store.key(epoch)?;

        let nonce = derive_nonce(key, plaintext, construction.nonce_size())?;
        let sealed = construction.seal(key.aes_key(), &nonce, plaintext)?;

        let header = EnvelopeHeader {
            construction_id,
            epoch: key.epoch(),
        };
        header.write_to(out)?;
        out.write_all(&nonce)?;
        out.write_all(&sealed)?;
        Ok(())
    }

    pub fn encode_to_vec(
        &self,
        construction: Construction,
        epoch: Epoch,
        store: &KeyStore,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(
            HEADER_SIZE + construction.nonce_size() + plaintext.len() + construction.tag_size(),
        );
        self.encode(construction.id(), epoch, store, plaintext, &mut out)?;
        Ok(out)
    }

    /// Decode an envelope read from `input`
    ///
    /// # Errors
    ///
    /// - `InvalidPreamble` if the magic bytes are missing
    /// - `Construction(UnknownConstruction)` / `KeyStore(KeyNotFound)` if
    ///   the header names something this codec or store cannot resolve
    /// - `Truncated` if the envelope ends early
    /// - `Construction(AuthenticationFailure)` if the tag does not verify
    pub fn decode<R: Read>(&self, store: &KeyStore, mut input: R) -> Result<Vec<u8>, CodecError> {
        let header = EnvelopeHeader::read_from(&mut input)?;
        let construction = self.registry.lookup(header.construction_id)?;
        if header.epoch == LATEST_EPOCH {
            return Err(KeyStoreError::KeyNotFound(LATEST_EPOCH).into());
        }
        let key = store.key(header.epoch)?;

        let mut nonce = vec![0u8; construction.nonce_size()];
        input
            .read_exact(&mut nonce)
            .map_err(|e| eof_as(e, CodecError::Truncated("nonce")))?;

        let mut sealed = Vec::new();
        input.read_to_end(&mut sealed)?;
        if sealed.len() < construction.tag_size() {
            return Err(CodecError::Truncated("authentication tag"));
        }

        Ok(construction.open(key.aes_key(), &nonce, &sealed)?)
    }

    pub fn decode_slice(&self, store: &KeyStore, envelope: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.decode(store, envelope)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store_with(epochs: usize) -> KeyStore {
        let mut store = KeyStore::new("key");
        for _ in 0..epochs {
            store.generate().unwrap();
        }
        store
    }

    #[test]
    fn test_hello_envelope_layout() {
        let store = store_with(1);
        let codec = Codec::new().unwrap();

        let envelope = codec
            .encode_to_vec(Construction::Aes256Gcm, 1, &store, b"hello")
            .unwrap();
        assert_eq!(envelope.len(), 10 + 4 + 4 + 12 + (5 + 16));
        assert_eq!(&envelope[..10], ENVELOPE_MAGIC);
        assert_eq!(&envelope[10..14], &1u32.to_be_bytes());
        assert_eq!(&envelope[14..18], &1u32.to_be_bytes());

        assert_eq!(codec.decode_slice(&store, &envelope).unwrap(), b"hello");
    }

    #[test]
    fn test_corrupt_construction_id() {
        let store = store_with(1);
        let codec = Codec::new().unwrap();
        let mut envelope = codec
            .encode_to_vec(Construction::Aes256Gcm, 1, &store, b"hello")
            .unwrap();
        envelope[10] ^= 0xFF;

        assert!(matches!(
            codec.decode_slice(&store, &envelope),
            Err(CodecError::Construction(
                ConstructionError::UnknownConstruction(_)
            ))
        ));
    }

    #[test]
    fn test_latest_epoch_is_written_explicitly() {
        let store = store_with(3);
        let codec = Codec::new().unwrap();
        let envelope = codec
            .encode_to_vec(Construction::ChaCha20Poly1305, 0, &store, b"data")
            .unwrap();
        assert_eq!(probe(&envelope[..]), (true, 3));
    }

    #[test]
    fn test_nonce_is_truncated_hmac() {
        let store = store_with(1);
        let codec = Codec::new().unwrap();
        let envelope = codec
            .encode_to_vec(Construction::Aes256Gcm, 1, &store, b"hello")
            .unwrap();

        let expected = derive_nonce(store.key(1).unwrap(), b"hello", 12).unwrap();
        assert_eq!(&envelope[HEADER_SIZE..HEADER_SIZE + 12], expected.as_slice());
    }

    #[test]
    fn test_encode_failures_write_nothing() {
        let store = store_with(1);
        let codec = Codec::new().unwrap();

        let mut out = Vec::new();
        let err = codec.encode(99, 1, &store, b"x", &mut out).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Construction(ConstructionError::UnknownConstruction(99))
        ));
        assert!(out.is_empty());

        let err = codec.encode(1, 5, &store, b"x", &mut out).unwrap_err();
        assert!(matches!(
            err,
            CodecError::KeyStore(KeyStoreError::KeyNotFound(5))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_probe_plaintext() {
        assert_eq!(probe(&b"just some text"[..]), (false, 0));
        assert_eq!(probe(&b""[..]), (false, 0));
        assert_eq!(probe(&ENVELOPE_MAGIC[..]), (false, 0));
    }

    #[test]
    fn test_truncated_envelope() {
        let store = store_with(1);
        let codec = Codec::new().unwrap();
        let envelope = codec
            .encode_to_vec(Construction::Aes256Gcm, 1, &store, b"")
            .unwrap();

        assert!(matches!(
            codec.decode_slice(&store, &envelope[..HEADER_SIZE + 4]),
            Err(CodecError::Truncated("nonce"))
        ));
        assert!(matches!(
            codec.decode_slice(&store, &envelope[..envelope.len() - 1]),
            Err(CodecError::Truncated("authentication tag"))
        ));
    }

    #[test]
    fn test_missing_preamble() {
        let store = store_with(1);
        let codec = Codec::new().unwrap();
        assert!(matches!(
            codec.decode_slice(&store, b"plain old text file"),
            Err(CodecError::InvalidPreamble)
        ));
    }
}
