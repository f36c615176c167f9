pub mod cipher;
pub mod hash;
pub mod kdf;
pub mod mldsa;

pub use cipher::{decrypt_payload, encrypt_payload};
pub use hash::{sha3_hex, Sha3Stream};
pub use kdf::{derive_aes_key, offchain_password};
pub use mldsa::{decode_public_key, sign_detached, verify_signature, SignerKeyPair};
