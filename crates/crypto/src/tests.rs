use super::*;

// -------------------- Key derivation --------------------

#[test]
fn same_password_and_salt_derive_the_same_key() {
    let salt = [3u8; SALT_SIZE];
    let a = derive_key("hunter2", &salt).unwrap();
    let b = derive_key("hunter2", &salt).unwrap();
    assert_eq!(a, b);
}

#[test]
fn different_salt_derives_a_different_key() {
    let a = derive_key("hunter2", &[1u8; SALT_SIZE]).unwrap();
    let b = derive_key("hunter2", &[2u8; SALT_SIZE]).unwrap();
    assert_ne!(a, b);
}

#[test]
fn different_password_derives_a_different_key() {
    let salt = [9u8; SALT_SIZE];
    let a = derive_key("pw1", &salt).unwrap();
    let b = derive_key("pw2", &salt).unwrap();
    assert_ne!(a, b);
}

// -------------------- Random material --------------------

#[test]
fn generated_material_is_not_degenerate() {
    // Two draws colliding would mean the CSPRNG is broken.
    assert_ne!(generate_salt(), generate_salt());
    assert_ne!(generate_nonce(), generate_nonce());
    assert_ne!(generate_key(), generate_key());
}

// -------------------- Seal / open --------------------

#[test]
fn seal_then_open_round_trips() {
    let sealer = Sealer::new(&generate_key());
    let nonce = generate_nonce();

    let ct = sealer.seal(&nonce, b"plaintext", b"aad").unwrap();
    assert_eq!(ct.len(), b"plaintext".len() + TAG_SIZE);

    let pt = sealer.open(&nonce, &ct, b"aad").unwrap();
    assert_eq!(pt, b"plaintext");
}

#[test]
fn wrong_aad_fails_verification() {
    let sealer = Sealer::new(&generate_key());
    let nonce = generate_nonce();
    let ct = sealer.seal(&nonce, b"plaintext", b"users:alice").unwrap();

    assert!(matches!(
        sealer.open(&nonce, &ct, b"users:bob"),
        Err(CryptoError::Verification)
    ));
}

#[test]
fn wrong_key_fails_verification() {
    let nonce = generate_nonce();
    let ct = Sealer::new(&generate_key())
        .seal(&nonce, b"plaintext", b"")
        .unwrap();

    assert!(matches!(
        Sealer::new(&generate_key()).open(&nonce, &ct, b""),
        Err(CryptoError::Verification)
    ));
}

#[test]
fn tampered_ciphertext_fails_verification() {
    let sealer = Sealer::new(&generate_key());
    let nonce = generate_nonce();
    let mut ct = sealer.seal(&nonce, b"plaintext", b"").unwrap();
    ct[0] ^= 0x01;

    assert!(matches!(
        sealer.open(&nonce, &ct, b""),
        Err(CryptoError::Verification)
    ));
}

#[test]
fn ciphertext_does_not_echo_plaintext() {
    let sealer = Sealer::new(&generate_key());
    let nonce = generate_nonce();
    let plaintext = b"SECRET-SUBSTRING";
    let ct = sealer.seal(&nonce, plaintext, b"").unwrap();

    assert!(!ct
        .windows(plaintext.len())
        .any(|w| w == plaintext.as_slice()));
}
