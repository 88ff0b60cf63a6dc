// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt::Write;

use aes::Aes128;
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};
use rand::RngExt;
use thiserror::Error;

/// Master key wrapping the credentials inside discovery replies.
pub const MASTER_KEY: &str = "SR-DALI-GW-HASYS";

/// Fixed CTR initialization vector, ASCII on the wire side.
const ENCRYPTION_IV: &[u8; 16] = b"0000000000101111";

type Aes128Ctr = Ctr128BE<Aes128>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key must be exactly 16 bytes, got {0}")]
    BadKeyLength(usize),
    #[error("ciphertext is not valid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
    #[error("decrypted payload is not valid UTF-8")]
    BadPlaintext(#[from] std::string::FromUtf8Error),
}

fn keystream_xor(data: &mut [u8], key: &str) -> Result<(), CryptoError> {
    let key = key.as_bytes();
    let mut cipher = Aes128Ctr::new_from_slices(key, ENCRYPTION_IV)
        .map_err(|_| CryptoError::BadKeyLength(key.len()))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Encrypts a UTF-8 string with AES-128-CTR and returns lowercase hex.
pub fn encrypt(plaintext: &str, key: &str) -> Result<String, CryptoError> {
    let mut buf = plaintext.as_bytes().to_vec();
    keystream_xor(&mut buf, key)?;
    Ok(hex::encode(buf))
}

/// Inverse of [`encrypt`]; fails on malformed hex or non-UTF-8 plaintext.
pub fn decrypt(encrypted_hex: &str, key: &str) -> Result<String, CryptoError> {
    let mut buf = hex::decode(encrypted_hex)?;
    keystream_xor(&mut buf, key)?;
    Ok(String::from_utf8(buf)?)
}

/// Generates a fresh 16-lowercase-hex-char key.
pub fn random_key() -> String {
    let mut raw = [0u8; 8];
    rand::rng().fill(&mut raw);

    let mut hex = String::with_capacity(16);
    for byte in &raw {
        write!(&mut hex, "{byte:02x}").expect("Writing to String cannot fail");
    }
    hex
}

/// Builds the discovery datagram body.
///
/// The payload is `{"cmd": C, "type": "HA"}` where
/// `C = encrypt(K || encrypt("discover", K), MASTER_KEY)` for a fresh
/// random key `K`.
pub fn build_discovery_message() -> Result<Vec<u8>, CryptoError> {
    let key = random_key();
    let inner = encrypt("discover", &key)?;
    let cmd = encrypt(&format!("{key}{inner}"), MASTER_KEY)?;

    let message = serde_json::json!({ "cmd": cmd, "type": "HA" });
    Ok(message.to_string().into_bytes())
}
