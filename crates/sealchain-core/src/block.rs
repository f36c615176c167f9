use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::constants::OFF_CHAIN_REF_PREFIX;
use crate::offchain::OffChainData;

/// Chain position. 64-bit signed, manually assigned before insert so the
/// block hash can commit to it. Genesis is 0; the conceptual pre-genesis tip
/// is -1.
pub type BlockNumber = i64;

/// Unix timestamp in milliseconds, UTC. Monotone non-decreasing along the
/// chain.
pub type Timestamp = i64;

// ── Block ────────────────────────────────────────────────────────────────────

/// One record in the linear chain.
///
/// Immutable after creation except for the four search-metadata fields
/// (`manual_keywords`, `auto_keywords`, `searchable_content`,
/// `content_category`). Destroyed only by rollback, import-replace, or clear.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Block {
    /// Primary key; unique across the chain.
    pub block_number: BlockNumber,

    /// SHA3-256 hex of the previous block's `hash`; the zero sentinel for
    /// genesis.
    pub previous_hash: String,

    /// SHA3-256 hex over the canonical body bytes (see [`BlockBody`]).
    pub hash: String,

    /// Creation time (epoch millis UTC).
    pub timestamp: Timestamp,

    /// UTF-8 payload, an `OFF_CHAIN_REF:<hash>` pointer, or the encrypted
    /// placeholder.
    pub data: String,

    /// Signer's detached Dilithium5 signature over the UTF-8 bytes of
    /// `hash`, base64. The genesis sentinel for block 0.
    pub signature: String,

    /// Base64 text form of the signer's Dilithium5 public key. Must be
    /// authorized in the key registry at `timestamp` (genesis exempt).
    pub signer_public_key: String,

    /// Optional recipient scope. Immutable once set.
    pub recipient_public_key: Option<String>,

    // ── Search metadata (the only mutable fields) ────────────────────────────
    pub manual_keywords: Option<String>,
    pub auto_keywords: Option<String>,
    /// Derived: `manual + " " + auto`.
    pub searchable_content: Option<String>,
    pub content_category: Option<String>,

    // ── Payload encryption ───────────────────────────────────────────────────
    pub is_encrypted: bool,
    /// `timestamp|salt_b64|iv_b64|ct_b64|plain_hash` when `is_encrypted`.
    pub encryption_metadata: Option<String>,

    /// Present iff the payload lives in the object store. Owns the encrypted
    /// file: it is unlinked before or together with this record.
    pub off_chain: Option<OffChainData>,
}

// ── Canonical body ───────────────────────────────────────────────────────────

/// The fields covered by `hash` (and therefore by the signature).
///
/// Canonical bytes are the bincode serialization of this struct: fixed-width
/// little-endian integers and length-prefixed UTF-8 strings. The encoding is
/// part of the on-disk format and must never change silently.
#[derive(Serialize)]
pub struct BlockBody<'a> {
    pub block_number: BlockNumber,
    pub previous_hash: &'a str,
    pub timestamp: Timestamp,
    pub data: &'a str,
    pub signer_public_key: &'a str,
    pub recipient_public_key: &'a Option<String>,
}

impl Block {
    /// Extract the canonical body for hashing and signing.
    pub fn body(&self) -> BlockBody<'_> {
        BlockBody {
            block_number: self.block_number,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            data: &self.data,
            signer_public_key: &self.signer_public_key,
            recipient_public_key: &self.recipient_public_key,
        }
    }

    /// Serialize the body to canonical bytes (bincode).
    pub fn body_bytes(&self) -> Vec<u8> {
        bincode::serialize(&self.body()).expect("body serialization is infallible")
    }

    /// Recompute the SHA3-256 hex hash over the canonical body bytes.
    /// Ignores the stored `hash` field.
    pub fn compute_hash(&self) -> String {
        let digest = Sha3_256::digest(self.body_bytes());
        hex::encode(digest)
    }

    pub fn is_genesis(&self) -> bool {
        self.block_number == 0
    }

    pub fn has_off_chain_data(&self) -> bool {
        self.off_chain.is_some()
    }

    /// The `data` value for a block whose payload lives off-chain.
    pub fn off_chain_ref(data_hash: &str) -> String {
        format!("{OFF_CHAIN_REF_PREFIX}{data_hash}")
    }
}
