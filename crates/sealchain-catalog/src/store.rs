use std::path::Path;

use sha3::{Digest, Sha3_256};

use sealchain_core::{AuditRecord, AuthorizedKey, Block, BlockNumber, SealError};

use crate::config::{DatabaseConfig, Dialect};
use crate::tx::CatalogTx;

/// Persistent catalog backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   blocks — block_number u64 BE bytes → bincode(Block)
///   keys   — SHA3(public_key) ++ created_at BE → bincode(AuthorizedKey)
///   audit  — seq u64 BE bytes → bincode(AuditRecord)
///   meta   — utf8 key bytes → raw bytes
///
/// Block numbers are non-negative, so big-endian byte order makes the
/// `blocks` tree iterate in chain order.
pub struct CatalogStore {
    _db: sled::Db,
    pub(crate) blocks: sled::Tree,
    keys: sled::Tree,
    audit: sled::Tree,
    meta: sled::Tree,
}

pub(crate) fn block_key(number: BlockNumber) -> [u8; 8] {
    debug_assert!(number >= 0);
    (number as u64).to_be_bytes()
}

fn key_entry_key(public_key: &str, created_at: i64) -> Vec<u8> {
    let mut key = Sha3_256::digest(public_key.as_bytes()).to_vec();
    key.extend_from_slice(&(created_at as u64).to_be_bytes());
    key
}

pub(crate) fn decode_block(bytes: &[u8]) -> Result<Block, SealError> {
    bincode::deserialize(bytes).map_err(|e| SealError::Serialization(e.to_string()))
}

impl CatalogStore {
    /// Open or create the catalog at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SealError> {
        let db = sled::open(path).map_err(|e| SealError::Storage(e.to_string()))?;
        let blocks = db.open_tree("blocks").map_err(|e| SealError::Storage(e.to_string()))?;
        let keys = db.open_tree("keys").map_err(|e| SealError::Storage(e.to_string()))?;
        let audit = db.open_tree("audit").map_err(|e| SealError::Storage(e.to_string()))?;
        let meta = db.open_tree("meta").map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(Self { _db: db, blocks, keys, audit, meta })
    }

    /// Open from a validated [`DatabaseConfig`]. Only the embedded `Sled`
    /// dialect is wired here; client-server dialects resolve to external
    /// driver collaborators.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, SealError> {
        config.validate()?;
        match config.dialect {
            Dialect::Sled => Self::open(&config.url),
            other => Err(SealError::InvalidInput(format!(
                "dialect {other:?} is served by an external driver; the embedded store opens Sled only"
            ))),
        }
    }

    /// Begin an explicit transaction. All block mutations inside a write
    /// path go through the returned handle; dropping it uncommitted
    /// discards every staged mutation.
    pub fn begin(&self) -> CatalogTx<'_> {
        CatalogTx::new(self)
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    pub fn block_by_number(&self, number: BlockNumber) -> Result<Option<Block>, SealError> {
        if number < 0 {
            return Ok(None);
        }
        match self
            .blocks
            .get(block_key(number))
            .map_err(|e| SealError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The last committed block, as a fresh read. Safe only outside active
    /// transactions; write paths must use [`CatalogTx::last_block`].
    pub fn last_block(&self) -> Result<Option<Block>, SealError> {
        match self.blocks.last().map_err(|e| SealError::Storage(e.to_string()))? {
            Some((_, bytes)) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Highest-numbered committed block with `block_number <= number`.
    pub(crate) fn last_block_at_or_below(
        &self,
        number: BlockNumber,
    ) -> Result<Option<Block>, SealError> {
        if number < 0 {
            return Ok(None);
        }
        match self
            .blocks
            .range(..=block_key(number).to_vec())
            .next_back()
            .transpose()
            .map_err(|e| SealError::Storage(e.to_string()))?
        {
            Some((_, bytes)) => Ok(Some(decode_block(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// One ascending page of blocks starting at the `offset` block-number
    /// watermark. Block numbers are dense, so this is row pagination with
    /// 64-bit offsets end to end.
    pub fn blocks_page(&self, offset: i64, limit: usize) -> Result<Vec<Block>, SealError> {
        if offset < 0 {
            return Err(SealError::InvalidInput("page offset must be non-negative".into()));
        }
        if limit == 0 {
            return Err(SealError::InvalidInput("page limit must be positive".into()));
        }
        let mut page = Vec::with_capacity(limit.min(1024));
        for item in self.blocks.range(block_key(offset).to_vec()..).take(limit) {
            let (_, bytes) = item.map_err(|e| SealError::Storage(e.to_string()))?;
            page.push(decode_block(&bytes)?);
        }
        Ok(page)
    }

    /// Blocks addressed to `recipient`. The recipient index itself belongs
    /// to the external relational back-ends; the embedded store scans.
    pub fn blocks_for_recipient(&self, recipient: &str) -> Result<Vec<Block>, SealError> {
        let mut result = Vec::new();
        for item in self.blocks.iter() {
            let (_, bytes) = item.map_err(|e| SealError::Storage(e.to_string()))?;
            let block = decode_block(&bytes)?;
            if block.recipient_public_key.as_deref() == Some(recipient) {
                result.push(block);
            }
        }
        Ok(result)
    }

    /// Count of non-genesis blocks signed by `public_key`.
    pub fn blocks_signed_by(&self, public_key: &str) -> Result<u64, SealError> {
        let mut count = 0u64;
        for item in self.blocks.iter() {
            let (_, bytes) = item.map_err(|e| SealError::Storage(e.to_string()))?;
            let block = decode_block(&bytes)?;
            if block.signer_public_key == public_key {
                count += 1;
            }
        }
        Ok(count)
    }

    /// The referenced-file set `R` for orphan cleanup: every `file_path`
    /// recorded in off-chain metadata.
    pub fn off_chain_file_paths(&self) -> Result<Vec<String>, SealError> {
        let mut paths = Vec::new();
        for item in self.blocks.iter() {
            let (_, bytes) = item.map_err(|e| SealError::Storage(e.to_string()))?;
            let block = decode_block(&bytes)?;
            if let Some(off_chain) = block.off_chain {
                paths.push(off_chain.file_path);
            }
        }
        Ok(paths)
    }

    /// Direct insert, bypassing the transaction handle. For import/restore
    /// paths that already hold the writer lock.
    pub fn insert_block_direct(&self, block: &Block) -> Result<(), SealError> {
        let bytes = bincode::serialize(block).map_err(|e| SealError::Serialization(e.to_string()))?;
        self.blocks
            .insert(block_key(block.block_number), bytes)
            .map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Overwrite an existing block row (metadata updates).
    pub fn update_block(&self, block: &Block) -> Result<(), SealError> {
        if self.block_by_number(block.block_number)?.is_none() {
            return Err(SealError::BlockNotFound(block.block_number));
        }
        self.insert_block_direct(block)
    }

    /// Remove every block row. Does not touch off-chain files; callers
    /// delete those first through the owning path.
    pub fn clear_blocks(&self) -> Result<(), SealError> {
        self.blocks.clear().map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Key registry ─────────────────────────────────────────────────────────

    /// All registry entries for one public key, oldest first.
    pub fn keys_for_public_key(&self, public_key: &str) -> Result<Vec<AuthorizedKey>, SealError> {
        let prefix = Sha3_256::digest(public_key.as_bytes());
        let mut entries = Vec::new();
        for item in self.keys.scan_prefix(&prefix[..]) {
            let (_, bytes) = item.map_err(|e| SealError::Storage(e.to_string()))?;
            let entry: AuthorizedKey =
                bincode::deserialize(&bytes).map_err(|e| SealError::Serialization(e.to_string()))?;
            // SHA3 prefix collisions aside, confirm the full key.
            if entry.public_key == public_key {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    pub fn all_keys(&self) -> Result<Vec<AuthorizedKey>, SealError> {
        let mut entries = Vec::new();
        for item in self.keys.iter() {
            let (_, bytes) = item.map_err(|e| SealError::Storage(e.to_string()))?;
            entries.push(
                bincode::deserialize(&bytes).map_err(|e| SealError::Serialization(e.to_string()))?,
            );
        }
        Ok(entries)
    }

    /// Insert or overwrite the registry entry keyed by
    /// `(public_key, created_at)`.
    pub fn put_key(&self, entry: &AuthorizedKey) -> Result<(), SealError> {
        let bytes = bincode::serialize(entry).map_err(|e| SealError::Serialization(e.to_string()))?;
        self.keys
            .insert(key_entry_key(&entry.public_key, entry.created_at), bytes)
            .map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Permanently remove one registry entry. Only the authorized-deletion
    /// paths call this.
    pub fn remove_key(&self, public_key: &str, created_at: i64) -> Result<(), SealError> {
        self.keys
            .remove(key_entry_key(public_key, created_at))
            .map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn clear_keys(&self) -> Result<(), SealError> {
        self.keys.clear().map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Audit trail ──────────────────────────────────────────────────────────

    /// Append an audit record, assigning the next sequence number.
    pub fn append_audit(&self, mut record: AuditRecord) -> Result<AuditRecord, SealError> {
        let next_seq = match self.audit.last().map_err(|e| SealError::Storage(e.to_string()))? {
            Some((key, _)) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&key);
                u64::from_be_bytes(arr) + 1
            }
            None => 0,
        };
        record.seq = next_seq;
        let bytes = bincode::serialize(&record).map_err(|e| SealError::Serialization(e.to_string()))?;
        self.audit
            .insert(next_seq.to_be_bytes(), bytes)
            .map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(record)
    }

    pub fn audit_records(&self) -> Result<Vec<AuditRecord>, SealError> {
        let mut records = Vec::new();
        for item in self.audit.iter() {
            let (_, bytes) = item.map_err(|e| SealError::Storage(e.to_string()))?;
            records.push(
                bincode::deserialize(&bytes).map_err(|e| SealError::Serialization(e.to_string()))?,
            );
        }
        Ok(records)
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), SealError> {
        self.meta
            .insert(key.as_bytes(), value)
            .map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, SealError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(|e| SealError::Storage(e.to_string()))
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), SealError> {
        self._db.flush().map_err(|e| SealError::Storage(e.to_string()))?;
        Ok(())
    }
}
