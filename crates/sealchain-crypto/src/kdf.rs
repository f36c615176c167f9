//! Key derivation: PBKDF2-HMAC-SHA-512 for AES keys, and the deterministic
//! off-chain file password.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use sha3::{Digest, Sha3_256};

use sealchain_core::{BlockNumber, PBKDF2_ITERATIONS};

/// Derive a 256-bit AES key from `password` and `salt` using
/// PBKDF2-HMAC-SHA-512 with the canonical iteration count.
pub fn derive_aes_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Deterministic password for a block's off-chain file:
/// first 32 characters of `base64(SHA3-256("OFFCHAIN_<n>_<signer_pk>"))`.
///
/// Reproducible from committed block fields alone; no password is stored
/// anywhere.
pub fn offchain_password(block_number: BlockNumber, signer_public_key: &str) -> String {
    let preimage = format!("OFFCHAIN_{block_number}_{signer_public_key}");
    let digest = Sha3_256::digest(preimage.as_bytes());
    let encoded = BASE64.encode(digest);
    encoded[..32].to_string()
}
