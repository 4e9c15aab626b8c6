//! AES-256-GCM sealing of stored values.
//!
//! A sealed value is `base64(nonce || ciphertext)`, with a fresh random 96-bit
//! nonce per call. The master key is 32 bytes, supplied base64-encoded.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Decode a base64 master key and check it is exactly 32 bytes.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))
}

/// Encrypt `plaintext` into a self-contained sealed string.
pub fn seal(plaintext: &str, key: &[u8]) -> Result<String> {
    let cipher = cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(sealed))
}

/// Decrypt a value produced by [`seal`]. Fails on a wrong key or tampering.
pub fn open(sealed: &str, key: &[u8]) -> Result<String> {
    let cipher = cipher(key)?;
    let bytes = BASE64.decode(sealed).context("Failed to decode sealed value")?;

    if bytes.len() <= NONCE_SIZE {
        return Err(anyhow!("Sealed value too short ({} bytes)", bytes.len()));
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
}
