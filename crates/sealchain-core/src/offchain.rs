use serde::{Deserialize, Serialize};

use crate::block::Timestamp;

/// Catalog metadata for one off-chain encrypted file.
///
/// Owned exclusively by the referencing [`Block`](crate::Block); the file's
/// lifetime equals the lifetime of the block record. Everything needed to
/// decrypt (IV, salt, iteration scheme) lives here; the file on disk is
/// opaque ciphertext only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OffChainData {
    /// SHA3-256 hex of the plaintext.
    pub data_hash: String,
    /// Signer's detached signature over the UTF-8 bytes of `data_hash`,
    /// base64.
    pub signature: String,
    /// Base64 public key of the signing block's signer.
    pub signer_public_key: String,
    /// Path of the encrypted file inside the off-chain directory.
    pub file_path: String,
    /// Plaintext length in bytes.
    pub file_size: i64,
    /// Base64 12-byte AES-GCM nonce, unique per file.
    pub encryption_iv: String,
    /// Base64 32-byte PBKDF2 salt.
    pub kdf_salt: String,
    /// MIME type of the plaintext.
    pub content_type: String,
    pub created_at: Timestamp,
}
