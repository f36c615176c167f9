//! Encrypted, content-addressed file store for payloads too large to live
//! inline in a block.
//!
//! Files are AES-256-GCM under the AEAD STREAM construction (BE32 counter):
//! 8 KiB plaintext chunks, each carrying its own 16-byte tag, nonce prefix =
//! the first 7 bytes of the per-file 12-byte IV. The SHA3-256 of the
//! plaintext is computed concurrently with encryption and decryption; all
//! decryption metadata lives in the catalog row, never in the file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::stream::{DecryptorBE32, EncryptorBE32};
use aes_gcm::aead::KeyInit;
use aes_gcm::{Aes256Gcm, Key};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use tracing::{debug, warn};

use sealchain_core::{
    OffChainData, SealError, Timestamp, GCM_IV_BYTES, KDF_SALT_BYTES, STREAM_CHUNK_BYTES,
};
use sealchain_crypto::{derive_aes_key, verify_signature, Sha3Stream};

use crate::filename::is_valid_offchain_filename;

/// GCM tag length appended to every stream chunk.
const TAG_BYTES: usize = 16;

/// Result of one encrypted write. The caller (the append engine) combines
/// this with the signer's signature into the catalog's `OffChainData` row.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// SHA3-256 hex of the plaintext.
    pub data_hash: String,
    /// Full path of the created file.
    pub file_path: String,
    /// Plaintext length in bytes.
    pub file_size: i64,
    /// Base64 of the 12-byte IV.
    pub encryption_iv: String,
    /// Base64 of the 32-byte PBKDF2 salt.
    pub kdf_salt: String,
}

/// The off-chain object store: one directory of encrypted files, each owned
/// by exactly one block.
pub struct OffChainStore {
    dir: PathBuf,
}

impl OffChainStore {
    /// Open (creating if necessary) the store directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, SealError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ── Write ────────────────────────────────────────────────────────────────

    /// Encrypt `plaintext` under `password` into a fresh file. Returns the
    /// metadata the catalog row needs; on any failure the partial file is
    /// removed before the error propagates.
    pub fn write(
        &self,
        plaintext: &[u8],
        password: &str,
        now: Timestamp,
    ) -> Result<StoredFile, SealError> {
        let mut iv = [0u8; GCM_IV_BYTES];
        let mut salt = [0u8; KDF_SALT_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let mut entropy = [0u8; 4];
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        let name = format!("offchain_{now}_{}.dat", hex::encode(entropy));
        debug_assert!(is_valid_offchain_filename(&name));
        let path = self.dir.join(&name);

        let result = self.write_inner(&path, plaintext, password, &iv, &salt);
        match result {
            Ok(data_hash) => {
                debug!(file = %name, bytes = plaintext.len(), "off-chain file written");
                Ok(StoredFile {
                    data_hash,
                    file_path: path.to_string_lossy().into_owned(),
                    file_size: plaintext.len() as i64,
                    encryption_iv: BASE64.encode(iv),
                    kdf_salt: BASE64.encode(salt),
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&path);
                Err(e)
            }
        }
    }

    fn write_inner(
        &self,
        path: &Path,
        plaintext: &[u8],
        password: &str,
        iv: &[u8; GCM_IV_BYTES],
        salt: &[u8; KDF_SALT_BYTES],
    ) -> Result<String, SealError> {
        let key = derive_aes_key(password, salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let mut encryptor =
            EncryptorBE32::from_aead(cipher, GenericArray::from_slice(&iv[..GCM_IV_BYTES - 5]));

        let file = create_private_file(path)?;
        let mut writer = BufWriter::new(file);
        let mut hasher = Sha3Stream::new();

        let chunks: Vec<&[u8]> = if plaintext.is_empty() {
            vec![&[]]
        } else {
            plaintext.chunks(STREAM_CHUNK_BYTES).collect()
        };
        let (body, tail) = chunks.split_at(chunks.len() - 1);
        for chunk in body {
            hasher.update(chunk);
            let sealed = encryptor
                .encrypt_next(*chunk)
                .map_err(|_| SealError::IntegrityCheckFailed("stream encryption failed".into()))?;
            writer.write_all(&sealed)?;
        }
        hasher.update(tail[0]);
        let sealed = encryptor
            .encrypt_last(tail[0])
            .map_err(|_| SealError::IntegrityCheckFailed("stream encryption failed".into()))?;
        writer.write_all(&sealed)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(hasher.finalize_hex())
    }

    // ── Read ─────────────────────────────────────────────────────────────────

    /// Decrypt and fully verify one off-chain file: GCM tags per chunk,
    /// SHA3-256 against `meta.data_hash`, and the signer's signature over
    /// the hash. Returns the plaintext.
    pub fn read_verified(
        &self,
        meta: &OffChainData,
        password: &str,
    ) -> Result<Vec<u8>, SealError> {
        let plaintext = self.decrypt(meta, password)?;

        let actual_hash = sealchain_crypto::sha3_hex(&plaintext);
        if actual_hash != meta.data_hash {
            return Err(SealError::IntegrityCheckFailed(format!(
                "off-chain content hash mismatch: expected {}, got {actual_hash}",
                meta.data_hash
            )));
        }
        verify_signature(
            &meta.signer_public_key,
            meta.data_hash.as_bytes(),
            &meta.signature,
        )
        .map_err(|_| {
            SealError::IntegrityCheckFailed("off-chain content signature verification failed".into())
        })?;
        Ok(plaintext)
    }

    /// Verification without surfacing the plaintext (validator use).
    pub fn verify(&self, meta: &OffChainData, password: &str) -> Result<(), SealError> {
        self.read_verified(meta, password).map(|_| ())
    }

    fn decrypt(&self, meta: &OffChainData, password: &str) -> Result<Vec<u8>, SealError> {
        let path = self.resolve(&meta.file_path)?;
        let iv = BASE64
            .decode(&meta.encryption_iv)
            .map_err(|_| SealError::InvalidInput("malformed off-chain iv".into()))?;
        let salt = BASE64
            .decode(&meta.kdf_salt)
            .map_err(|_| SealError::InvalidInput("malformed off-chain salt".into()))?;
        if iv.len() != GCM_IV_BYTES {
            return Err(SealError::InvalidInput("off-chain iv must be 12 bytes".into()));
        }
        if meta.file_size < 0 {
            return Err(SealError::InvalidInput("off-chain size must be non-negative".into()));
        }

        let key = derive_aes_key(password, &salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let mut decryptor =
            DecryptorBE32::from_aead(cipher, GenericArray::from_slice(&iv[..GCM_IV_BYTES - 5]));

        // Chunk framing is fixed by the recorded plaintext size.
        let total = meta.file_size as usize;
        let chunk_sizes: Vec<usize> = if total == 0 {
            vec![0]
        } else {
            let mut sizes = vec![STREAM_CHUNK_BYTES; total / STREAM_CHUNK_BYTES];
            if total % STREAM_CHUNK_BYTES != 0 {
                sizes.push(total % STREAM_CHUNK_BYTES);
            }
            sizes
        };
        let expected_len: u64 = chunk_sizes.iter().map(|s| (s + TAG_BYTES) as u64).sum();
        let mut file = File::open(&path)?;
        if file.metadata()?.len() != expected_len {
            return Err(SealError::IntegrityCheckFailed(format!(
                "off-chain file {} has unexpected length",
                path.display()
            )));
        }

        let tamper_error = || {
            SealError::IntegrityCheckFailed(format!(
                "off-chain file {} failed authentication (tampered or wrong key)",
                path.display()
            ))
        };
        let mut plaintext = Vec::with_capacity(total);
        let mut sealed = vec![0u8; STREAM_CHUNK_BYTES + TAG_BYTES];
        let (body, tail) = chunk_sizes.split_at(chunk_sizes.len() - 1);
        for &size in body {
            let sealed = &mut sealed[..size + TAG_BYTES];
            file.read_exact(sealed)?;
            let opened = decryptor.decrypt_next(&*sealed).map_err(|_| tamper_error())?;
            plaintext.extend_from_slice(&opened);
        }
        let sealed = &mut sealed[..tail[0] + TAG_BYTES];
        file.read_exact(sealed)?;
        let opened = decryptor.decrypt_last(&*sealed).map_err(|_| tamper_error())?;
        plaintext.extend_from_slice(&opened);
        Ok(plaintext)
    }

    // ── Delete ───────────────────────────────────────────────────────────────

    /// Unlink one owned file. Refuses (without error) anything that fails
    /// the filename whitelist or escapes the store directory; an unlink
    /// failure is logged and reported as `false` so the catalog delete can
    /// proceed; the orphan reconciler finishes the job next cycle.
    pub fn delete(&self, file_path: &str) -> Result<bool, SealError> {
        let path = match self.resolve(file_path) {
            Ok(p) => p,
            Err(e) => {
                warn!(file = file_path, error = %e, "refusing off-chain delete");
                return Ok(false);
            }
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = %path.display(), "off-chain file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "off-chain delete failed; orphan cleanup will retry");
                Ok(false)
            }
        }
    }

    /// Copy an externally-held encrypted file (e.g. an export backup) into
    /// this store under a fresh name. The ciphertext is filename-independent,
    /// so adoption is a plain copy. Returns the new full path.
    pub fn adopt_file(&self, source: &Path, now: Timestamp) -> Result<String, SealError> {
        let mut entropy = [0u8; 4];
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        let name = format!("offchain_{now}_{}.dat", hex::encode(entropy));
        let target = self.dir.join(&name);
        fs::copy(source, &target)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(0o600))?;
        }
        debug!(from = %source.display(), to = %name, "off-chain file adopted");
        Ok(target.to_string_lossy().into_owned())
    }

    /// Resolve a catalog-recorded path against this store: whitelist the
    /// filename and require the canonical path to stay inside the canonical
    /// store directory.
    pub fn resolve(&self, file_path: &str) -> Result<PathBuf, SealError> {
        let raw = PathBuf::from(file_path);
        let raw = if raw.is_absolute() {
            raw
        } else {
            self.dir.join(raw)
        };
        let name = raw
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SealError::InvalidInput(format!("unusable off-chain path: {file_path}")))?;
        if !is_valid_offchain_filename(name) {
            return Err(SealError::SecurityViolation(format!(
                "off-chain filename fails the whitelist: {name}"
            )));
        }
        let canonical_dir = self.dir.canonicalize()?;
        let canonical = raw.canonicalize()?;
        if !canonical.starts_with(&canonical_dir) {
            return Err(SealError::SecurityViolation(format!(
                "off-chain path escapes the store directory: {file_path}"
            )));
        }
        Ok(canonical)
    }
}

#[cfg(unix)]
fn create_private_file(path: &Path) -> Result<File, SealError> {
    use std::os::unix::fs::OpenOptionsExt;
    Ok(OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> Result<File, SealError> {
    warn!("filesystem does not support POSIX permissions; off-chain file created with defaults");
    Ok(OpenOptions::new().write(true).create_new(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealchain_crypto::SignerKeyPair;

    fn store() -> (tempfile::TempDir, OffChainStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = OffChainStore::open(dir.path().join("off-chain-data")).unwrap();
        (dir, store)
    }

    fn meta_for(stored: &StoredFile, signer: &SignerKeyPair) -> OffChainData {
        OffChainData {
            data_hash: stored.data_hash.clone(),
            signature: signer.sign(stored.data_hash.as_bytes()).unwrap(),
            signer_public_key: signer.public_key().to_string(),
            file_path: stored.file_path.clone(),
            file_size: stored.file_size,
            encryption_iv: stored.encryption_iv.clone(),
            kdf_salt: stored.kdf_salt.clone(),
            content_type: "text/plain".into(),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn round_trip_multi_chunk() {
        let (_dir, store) = store();
        let signer = SignerKeyPair::generate();
        // Three full chunks plus a partial tail.
        let plaintext = vec![0xabu8; STREAM_CHUNK_BYTES * 3 + 100];
        let stored = store.write(&plaintext, "pw", 1_700_000_000_000).unwrap();
        let meta = meta_for(&stored, &signer);
        assert_eq!(store.read_verified(&meta, "pw").unwrap(), plaintext);
    }

    #[test]
    fn round_trip_empty_and_exact_boundary() {
        let (_dir, store) = store();
        let signer = SignerKeyPair::generate();
        for len in [0, 1, STREAM_CHUNK_BYTES, STREAM_CHUNK_BYTES * 2] {
            let plaintext = vec![7u8; len];
            let stored = store.write(&plaintext, "pw", 1).unwrap();
            let meta = meta_for(&stored, &signer);
            assert_eq!(store.read_verified(&meta, "pw").unwrap(), plaintext, "len {len}");
        }
    }

    #[test]
    fn wrong_password_fails_closed() {
        let (_dir, store) = store();
        let signer = SignerKeyPair::generate();
        let stored = store.write(b"sensitive", "right", 1).unwrap();
        let meta = meta_for(&stored, &signer);
        let err = store.read_verified(&meta, "wrong").unwrap_err();
        assert!(matches!(err, SealError::IntegrityCheckFailed(_)));
    }

    #[test]
    fn flipped_ciphertext_byte_detected() {
        let (_dir, store) = store();
        let signer = SignerKeyPair::generate();
        let stored = store.write(&vec![1u8; 10_000], "pw", 1).unwrap();
        let meta = meta_for(&stored, &signer);

        let mut bytes = fs::read(&stored.file_path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        fs::write(&stored.file_path, &bytes).unwrap();

        let err = store.read_verified(&meta, "pw").unwrap_err();
        assert!(matches!(err, SealError::IntegrityCheckFailed(_)));
    }

    #[test]
    fn tampered_stored_hash_detected() {
        let (_dir, store) = store();
        let signer = SignerKeyPair::generate();
        let stored = store.write(b"payload", "pw", 1).unwrap();
        let mut meta = meta_for(&stored, &signer);
        let mut hash_bytes = hex::decode(&meta.data_hash).unwrap();
        hash_bytes[0] ^= 0x01;
        meta.data_hash = hex::encode(hash_bytes);

        let err = store.read_verified(&meta, "pw").unwrap_err();
        assert!(matches!(err, SealError::IntegrityCheckFailed(_)));
    }

    #[test]
    fn delete_honors_whitelist_and_containment() {
        let (dir, store) = store();
        let stored = store.write(b"x", "pw", 1).unwrap();
        assert!(store.delete(&stored.file_path).unwrap());
        // Second delete is a no-op.
        assert!(!store.delete(&stored.file_path).unwrap());

        // A file outside the store directory is refused even with a valid name.
        let outside = dir.path().join("offchain_1_00000000.dat");
        fs::write(&outside, b"external").unwrap();
        assert!(!store.delete(outside.to_str().unwrap()).unwrap());
        assert!(outside.exists());

        // A non-matching name inside the directory is refused.
        let external = store.dir().join("keepme.txt");
        fs::write(&external, b"external").unwrap();
        assert!(!store.delete(external.to_str().unwrap()).unwrap());
        assert!(external.exists());
    }
}
