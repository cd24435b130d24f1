//! Integration tests for the envelope codec

mod common;

use ::common::crypto::{
    probe, Codec, CodecError, Construction, ConstructionError, KeyStoreError, ENVELOPE_MAGIC,
    HEADER_SIZE, NONCE_SIZE, TAG_SIZE,
};

#[test]
fn test_roundtrip_every_construction() {
    let repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();
    let plaintext = b"database_password = hunter2\n";

    for construction in Construction::ALL {
        let envelope = codec
            .encode_to_vec(construction, 0, &repo.store, plaintext)
            .unwrap();
        assert_eq!(probe(&envelope[..]), (true, 1));
        assert_eq!(codec.decode_slice(&repo.store, &envelope).unwrap(), plaintext);
    }
}

#[test]
fn test_encoding_is_deterministic() {
    let repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();

    let a = codec
        .encode_to_vec(Construction::Aes256Gcm, 0, &repo.store, b"same")
        .unwrap();
    let b = codec
        .encode_to_vec(Construction::Aes256Gcm, 0, &repo.store, b"same")
        .unwrap();
    let c = codec
        .encode_to_vec(Construction::Aes256Gcm, 0, &repo.store, b"different")
        .unwrap();
    assert_eq!(a, b);
    assert_ne!(a[HEADER_SIZE..HEADER_SIZE + NONCE_SIZE], c[HEADER_SIZE..HEADER_SIZE + NONCE_SIZE]);
}

#[test]
fn test_empty_plaintext() {
    let repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();

    let envelope = codec
        .encode_to_vec(Construction::ChaCha20Poly1305, 0, &repo.store, b"")
        .unwrap();
    assert_eq!(envelope.len(), HEADER_SIZE + NONCE_SIZE + TAG_SIZE);
    assert!(codec.decode_slice(&repo.store, &envelope).unwrap().is_empty());
}

#[test]
fn test_tampering_is_detected() {
    let repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();
    let envelope = codec
        .encode_to_vec(Construction::Aes256Gcm, 0, &repo.store, b"secret payload")
        .unwrap();

    // Every byte past the header is covered by the tag
    for i in HEADER_SIZE..envelope.len() {
        let mut tampered = envelope.clone();
        tampered[i] ^= 0x01;
        let err = codec.decode_slice(&repo.store, &tampered).unwrap_err();
        assert!(err.is_authentication_failure(), "byte {} not detected", i);
    }
}

#[test]
fn test_old_epochs_stay_decodable() {
    let mut repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();
    let old = codec
        .encode_to_vec(Construction::Aes256Gcm, 0, &repo.store, b"written at epoch 1")
        .unwrap();

    repo.store.generate().unwrap();
    let new = codec
        .encode_to_vec(Construction::Aes256Gcm, 0, &repo.store, b"written at epoch 2")
        .unwrap();

    assert_eq!(probe(&old[..]), (true, 1));
    assert_eq!(probe(&new[..]), (true, 2));
    assert_eq!(
        codec.decode_slice(&repo.store, &old).unwrap(),
        b"written at epoch 1"
    );
}

#[test]
fn test_unknown_epoch() {
    let repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();
    let mut envelope = codec
        .encode_to_vec(Construction::Aes256Gcm, 0, &repo.store, b"x")
        .unwrap();
    // epoch field is the last four header bytes
    envelope[HEADER_SIZE - 1] = 9;

    assert!(matches!(
        codec.decode_slice(&repo.store, &envelope),
        Err(CodecError::KeyStore(KeyStoreError::KeyNotFound(9)))
    ));
}

#[test]
fn test_plaintext_is_not_an_envelope() {
    let repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();

    assert_eq!(probe(&b"plain text file"[..]), (false, 0));
    assert_eq!(probe(&ENVELOPE_MAGIC[..4]), (false, 0));
    assert!(matches!(
        codec.decode_slice(&repo.store, b"plain text file"),
        Err(CodecError::InvalidPreamble)
    ));
}

#[test]
fn test_unregistered_construction() {
    let repo = common::setup_repo(1);
    let codec = Codec::new().unwrap();

    assert!(matches!(
        codec.encode(77, 0, &repo.store, b"x", &mut Vec::<u8>::new()),
        Err(CodecError::Construction(
            ConstructionError::UnknownConstruction(77)
        ))
    ));
}
