// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use dali_gateway_rs::crypto::{
    CryptoError, MASTER_KEY, build_discovery_message, decrypt, encrypt, random_key,
};

#[test]
fn round_trip_with_master_key() -> Result<()> {
    let cipher = encrypt("discover", MASTER_KEY)?;
    assert!(cipher.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(cipher.to_lowercase(), cipher);
    assert_eq!(decrypt(&cipher, MASTER_KEY)?, "discover");
    Ok(())
}

#[test]
fn round_trip_arbitrary_utf8() -> Result<()> {
    let key = "0123456789abcdef";
    for plaintext in ["", "admin", "pässwörd", "日本語テキスト", "a\nb\tc"] {
        let cipher = encrypt(plaintext, key)?;
        assert_eq!(decrypt(&cipher, key)?, plaintext);
    }
    Ok(())
}

#[test]
fn different_keys_give_different_ciphertexts() -> Result<()> {
    let a = encrypt("discover", "0123456789abcdef")?;
    let b = encrypt("discover", "fedcba9876543210")?;
    assert_ne!(a, b);
    Ok(())
}

#[test]
fn random_key_shape() {
    let key = random_key();
    assert_eq!(key.len(), 16);
    assert!(
        key.chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_uppercase())
    );
    assert_ne!(random_key(), random_key());
}

#[test]
fn rejects_short_key() {
    assert!(matches!(
        encrypt("x", "short"),
        Err(CryptoError::BadKeyLength(5))
    ));
}

#[test]
fn rejects_bad_hex() {
    assert!(matches!(decrypt("zz", MASTER_KEY), Err(CryptoError::BadHex(_))));
}

#[test]
fn discovery_message_unwraps_with_master_key() -> Result<()> {
    let message = build_discovery_message()?;
    let value: serde_json::Value = serde_json::from_slice(&message)?;
    assert_eq!(value["type"], "HA");

    let cmd = value["cmd"].as_str().expect("cmd field");
    let combined = decrypt(cmd, MASTER_KEY)?;
    // 16-hex-char session key followed by the encrypted marker
    let (key, inner) = combined.split_at(16);
    assert_eq!(decrypt(inner, key)?, "discover");
    Ok(())
}
