//! ML-DSA-87 (Dilithium5) detached signatures with text-serialized keys.
//!
//! Keys and signatures cross the catalog boundary as base64 strings; raw
//! bytes exist only transiently inside this module.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pqcrypto_dilithium::dilithium5;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey, SecretKey};
use zeroize::Zeroizing;

use sealchain_core::SealError;

/// Decode and validate the base64 text form of a Dilithium5 public key.
pub fn decode_public_key(public_key: &str) -> Result<dilithium5::PublicKey, SealError> {
    let bytes = BASE64
        .decode(public_key)
        .map_err(|_| SealError::InvalidInput("public key is not valid base64".into()))?;
    dilithium5::PublicKey::from_bytes(&bytes).map_err(|_| {
        SealError::InvalidInput(format!(
            "public key must be {} bytes, got {}",
            dilithium5::public_key_bytes(),
            bytes.len()
        ))
    })
}

/// Sign `message` with a Dilithium5 secret key. Returns the detached
/// signature in base64.
pub fn sign_detached(secret_key_bytes: &[u8], message: &[u8]) -> Result<String, SealError> {
    let sk = dilithium5::SecretKey::from_bytes(secret_key_bytes)
        .map_err(|_| SealError::InvalidInput("malformed secret key".into()))?;
    let sig = dilithium5::detached_sign(message, &sk);
    Ok(BASE64.encode(sig.as_bytes()))
}

/// Verify a base64 detached Dilithium5 signature.
pub fn verify_signature(
    public_key: &str,
    message: &[u8],
    signature: &str,
) -> Result<(), SealError> {
    let pk = decode_public_key(public_key)?;
    let sig_bytes = BASE64
        .decode(signature)
        .map_err(|_| SealError::IntegrityCheckFailed("signature is not valid base64".into()))?;
    let sig = dilithium5::DetachedSignature::from_bytes(&sig_bytes)
        .map_err(|_| SealError::IntegrityCheckFailed("malformed signature".into()))?;
    dilithium5::verify_detached_signature(&sig, message, &pk)
        .map_err(|_| SealError::IntegrityCheckFailed("signature verification failed".into()))
}

// ── SignerKeyPair ─────────────────────────────────────────────────────────────

/// A signer identity: Dilithium5 keypair with the secret held in zeroizing
/// memory. The public half travels as base64 text.
pub struct SignerKeyPair {
    public_key: String,
    secret_key: Zeroizing<Vec<u8>>,
}

impl SignerKeyPair {
    /// Generate a fresh Dilithium5 keypair.
    pub fn generate() -> Self {
        let (pk, sk) = dilithium5::keypair();
        Self {
            public_key: BASE64.encode(pk.as_bytes()),
            secret_key: Zeroizing::new(sk.as_bytes().to_vec()),
        }
    }

    /// Restore from raw bytes (e.g. loaded from a key file).
    pub fn from_raw(pk_bytes: &[u8], sk_bytes: Vec<u8>) -> Self {
        Self {
            public_key: BASE64.encode(pk_bytes),
            secret_key: Zeroizing::new(sk_bytes),
        }
    }

    /// Base64 text form of the public key, i.e. the registry identity.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn sign(&self, message: &[u8]) -> Result<String, SealError> {
        sign_detached(&self.secret_key, message)
    }
}

impl std::fmt::Debug for SignerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignerKeyPair({}…)", &self.public_key[..16.min(self.public_key.len())])
    }
}
