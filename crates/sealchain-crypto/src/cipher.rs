//! Password-based encryption for inline block payloads.
//!
//! The ciphertext and its parameters travel in a single envelope string
//! stored in `Block::encryption_metadata`:
//!
//! ```text
//! <timestamp>|<salt_b64>|<iv_b64>|<ct_b64>|<plain_hash_hex>
//! ```
//!
//! AES-256-GCM with a fresh 12-byte nonce; the key is derived with
//! PBKDF2-HMAC-SHA-512 from a fresh 32-byte salt. `plain_hash` is the
//! SHA3-256 of the plaintext and is re-checked after decryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use sealchain_core::{SealError, Timestamp, GCM_IV_BYTES, KDF_SALT_BYTES};

use crate::hash::sha3_hex;
use crate::kdf::derive_aes_key;

/// Encrypt `plaintext` under `password`, returning the envelope string.
pub fn encrypt_payload(
    plaintext: &str,
    password: &str,
    now: Timestamp,
) -> Result<String, SealError> {
    let mut salt = [0u8; KDF_SALT_BYTES];
    let mut iv = [0u8; GCM_IV_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let key = derive_aes_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| SealError::IntegrityCheckFailed("payload encryption failed".into()))?;

    let plain_hash = sha3_hex(plaintext.as_bytes());
    Ok(format!(
        "{now}|{}|{}|{}|{plain_hash}",
        BASE64.encode(salt),
        BASE64.encode(iv),
        BASE64.encode(&ciphertext),
    ))
}

/// Decrypt an envelope produced by [`encrypt_payload`]. Verifies the GCM tag
/// and the stored plaintext hash.
pub fn decrypt_payload(envelope: &str, password: &str) -> Result<String, SealError> {
    let parts: Vec<&str> = envelope.split('|').collect();
    if parts.len() != 5 {
        return Err(SealError::InvalidInput(
            "encryption envelope must have 5 fields".into(),
        ));
    }
    let salt = BASE64
        .decode(parts[1])
        .map_err(|_| SealError::InvalidInput("malformed envelope salt".into()))?;
    let iv = BASE64
        .decode(parts[2])
        .map_err(|_| SealError::InvalidInput("malformed envelope iv".into()))?;
    let ciphertext = BASE64
        .decode(parts[3])
        .map_err(|_| SealError::InvalidInput("malformed envelope ciphertext".into()))?;
    if iv.len() != GCM_IV_BYTES {
        return Err(SealError::InvalidInput("envelope iv must be 12 bytes".into()));
    }

    let key = derive_aes_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| {
            SealError::IntegrityCheckFailed("payload decryption failed (wrong password or tampered data)".into())
        })?;

    let plaintext = String::from_utf8(plaintext)
        .map_err(|_| SealError::IntegrityCheckFailed("decrypted payload is not UTF-8".into()))?;
    if sha3_hex(plaintext.as_bytes()) != parts[4] {
        return Err(SealError::IntegrityCheckFailed(
            "decrypted payload hash mismatch".into(),
        ));
    }
    Ok(plaintext)
}
