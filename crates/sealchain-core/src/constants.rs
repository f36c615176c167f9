//! ─── Sealchain Protocol Constants ───────────────────────────────────────────
//!
//! A private, permissioned, tamper-evident ledger.
//!
//! Hash:       SHA3-256 (64-char lowercase hex text form)
//! Signatures: ML-DSA-87 (Dilithium5), detached, base64 text form
//! Payloads:   inline UTF-8 or AES-256-GCM encrypted off-chain files

// ── Chain sentinels ──────────────────────────────────────────────────────────

/// `previous_hash` of the genesis block: 64 zero characters.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Placeholder signer / signature carried by the genesis block. The genesis
/// block is exempt from signature and authorization checks.
pub const GENESIS_SENTINEL: &str = "GENESIS";

/// Prefix marking a block whose payload lives in the off-chain object store.
/// The remainder of the `data` field is the SHA3-256 hex of the plaintext.
pub const OFF_CHAIN_REF_PREFIX: &str = "OFF_CHAIN_REF:";

/// `data` value for a block whose payload was password-encrypted in place.
/// The ciphertext envelope lives in `encryption_metadata`.
pub const ENCRYPTED_PLACEHOLDER: &str = "[ENCRYPTED]";

// ── Payload sizing ───────────────────────────────────────────────────────────

/// Payloads at or above this many UTF-8 bytes spill off-chain.
pub const OFF_CHAIN_THRESHOLD_BYTES: usize = 524_288;

/// Hard ceiling on any payload. Larger data is rejected outright.
pub const MAX_BLOCK_DATA_BYTES: usize = 100 * 1024 * 1024;

/// Character ceiling for the inline path. Data under the byte threshold but
/// over this many characters still spills off-chain.
pub const MAX_INLINE_CHARS: usize = 10_000;

// ── Field caps (characters; reject on overflow, never truncate) ──────────────

pub const MAX_OWNER_NAME_CHARS: usize = 100;
pub const MAX_KEYWORDS_CHARS: usize = 1_024;
pub const MAX_SEARCHABLE_CONTENT_CHARS: usize = 2_048;
pub const MAX_CONTENT_CATEGORY_CHARS: usize = 50;
pub const MAX_CONTENT_TYPE_CHARS: usize = 100;
pub const MAX_AUDIT_OPERATION_CHARS: usize = 20;
pub const MAX_AUDIT_REASON_CHARS: usize = 500;
pub const MAX_CONFIG_KEY_CHARS: usize = 255;
pub const MAX_CONFIG_TYPE_CHARS: usize = 50;

// ── Cryptography ─────────────────────────────────────────────────────────────

/// PBKDF2-HMAC-SHA-512 iteration count. The project historically shipped
/// 100_000 in one code path; 210_000 is the canonical figure everywhere now.
pub const PBKDF2_ITERATIONS: u32 = 210_000;

/// PBKDF2 salt length in bytes.
pub const KDF_SALT_BYTES: usize = 32;

/// AES-256-GCM nonce length in bytes.
pub const GCM_IV_BYTES: usize = 12;

/// Plaintext chunk size for streaming off-chain encryption.
pub const STREAM_CHUNK_BYTES: usize = 8 * 1024;

// ── Validation and pagination ────────────────────────────────────────────────

/// Blocks fetched per page by the streaming validator and rollback paths.
pub const VALIDATION_BATCH_SIZE: usize = 1_000;

/// Detailed validation logs a warning above this many blocks.
pub const VALIDATION_WARN_BLOCKS: u64 = 100_000;

/// Detailed validation refuses above this many blocks; callers must use the
/// streaming variant instead.
pub const VALIDATION_HARD_LIMIT_BLOCKS: u64 = 500_000;

/// Page size for rollback and clear deletion sweeps.
pub const ROLLBACK_PAGE_SIZE: usize = 1_000;

// ── Off-chain object store ───────────────────────────────────────────────────

/// Default directory for off-chain encrypted files.
pub const OFF_CHAIN_DIR_DEFAULT: &str = "off-chain-data";

/// Subdirectory of an export bundle holding copied encrypted files.
pub const OFF_CHAIN_BACKUP_DIR: &str = "off-chain-backup";

/// Orphan cleanup unlinks at most this many files per cycle.
pub const CLEANUP_MAX_DELETES_PER_CYCLE: usize = 1_000;

/// Orphan cleanup logs a warning when tracking more items than this.
pub const CLEANUP_WARN_TRACKED_ITEMS: usize = 100_000;

/// Orphan cleanup requires at least this much free disk space to proceed.
pub const CLEANUP_MIN_FREE_DISK_BYTES: u64 = 1024 * 1024 * 1024;

// ── Export bundle ────────────────────────────────────────────────────────────

/// Schema version string written into export bundle metadata.
pub const EXPORT_BUNDLE_VERSION: &str = "1.0";

/// Filename of the JSON document inside an export bundle directory.
pub const EXPORT_BUNDLE_FILE: &str = "chain-export.json";
