use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use sealchain_archive::{export_chain, import_chain, ExportMetadata, ImportSummary};
use sealchain_catalog::{CatalogStore, CatalogTx};
use sealchain_core::{
    key_fingerprint, require_max_chars, AuditRecord, AuthorizedKey, Block, BlockNumber, KeyRole,
    OffChainData, SealError, Timestamp, ENCRYPTED_PLACEHOLDER, GENESIS_PREVIOUS_HASH,
    GENESIS_SENTINEL, MAX_AUDIT_REASON_CHARS, MAX_BLOCK_DATA_BYTES, MAX_CONTENT_CATEGORY_CHARS,
    MAX_CONTENT_TYPE_CHARS, MAX_INLINE_CHARS, MAX_KEYWORDS_CHARS, MAX_SEARCHABLE_CONTENT_CHARS,
    OFF_CHAIN_DIR_DEFAULT, OFF_CHAIN_THRESHOLD_BYTES, ROLLBACK_PAGE_SIZE,
};
use sealchain_crypto::{decode_public_key, decrypt_payload, encrypt_payload, offchain_password,
    verify_signature, SignerKeyPair};
use sealchain_offchain::{cleanup_orphans, offchain_file_stem, CleanupOptions, CleanupReport,
    OffChainStore};
use sealchain_registry::{KeyDeletionImpact, KeyRegistry};
use sealchain_validate::{ChainValidationResult, ChainValidator, ValidationOptions};

use crate::sizing::{validate_and_determine_storage, StorageDisposition};

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Everything lives under here: `catalog/`, `off-chain-data/`,
    /// `snapshots/`.
    pub base_dir: PathBuf,
    pub off_chain_threshold_bytes: usize,
    pub max_block_data_bytes: usize,
    pub max_inline_chars: usize,
    /// When set, block timestamps are strictly increasing: a stalled or
    /// stepped-back clock bumps to `previous + 1` ms. Off by default:
    /// equal timestamps are allowed.
    pub strict_monotonic_timestamps: bool,
}

impl LedgerConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            off_chain_threshold_bytes: OFF_CHAIN_THRESHOLD_BYTES,
            max_block_data_bytes: MAX_BLOCK_DATA_BYTES,
            max_inline_chars: MAX_INLINE_CHARS,
            strict_monotonic_timestamps: false,
        }
    }

    fn catalog_dir(&self) -> PathBuf {
        self.base_dir.join("catalog")
    }

    fn off_chain_dir(&self) -> PathBuf {
        self.base_dir.join(OFF_CHAIN_DIR_DEFAULT)
    }

    fn snapshot_dir(&self) -> PathBuf {
        self.base_dir.join("snapshots")
    }
}

// ── Append options ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct AppendOptions<'a> {
    /// Recipient scope; immutable once the block is persisted.
    pub recipient_public_key: Option<&'a str>,
    pub manual_keywords: Option<&'a str>,
    pub auto_keywords: Option<&'a str>,
    pub content_category: Option<&'a str>,
    /// Encrypt the inline payload under this password (AES-256-GCM).
    pub password: Option<&'a str>,
    /// MIME type recorded for off-chain payloads.
    pub content_type: Option<&'a str>,
    /// Spill off-chain regardless of size.
    pub force_off_chain: bool,
}

/// Caps-checked search metadata, derived before any write happens.
struct BlockMetadata {
    manual_keywords: Option<String>,
    auto_keywords: Option<String>,
    searchable_content: Option<String>,
    content_category: Option<String>,
}

impl BlockMetadata {
    fn derive(
        manual: Option<&str>,
        auto: Option<&str>,
        category: Option<&str>,
    ) -> Result<Self, SealError> {
        if let Some(manual) = manual {
            require_max_chars("manual_keywords", manual, MAX_KEYWORDS_CHARS)?;
        }
        if let Some(auto) = auto {
            require_max_chars("auto_keywords", auto, MAX_KEYWORDS_CHARS)?;
        }
        if let Some(category) = category {
            require_max_chars("content_category", category, MAX_CONTENT_CATEGORY_CHARS)?;
        }
        let searchable_content = match (manual, auto) {
            (Some(m), Some(a)) => Some(format!("{m} {a}")),
            (Some(m), None) => Some(m.to_string()),
            (None, Some(a)) => Some(a.to_string()),
            (None, None) => None,
        };
        if let Some(searchable) = &searchable_content {
            require_max_chars("searchable_content", searchable, MAX_SEARCHABLE_CONTENT_CHARS)?;
        }
        Ok(Self {
            manual_keywords: manual.map(String::from),
            auto_keywords: auto.map(String::from),
            searchable_content,
            content_category: category.map(String::from),
        })
    }
}

// ── Admin mandate ────────────────────────────────────────────────────────────

/// The cryptographic authorization for a force delete: an admin's signature
/// over [`authorized_deletion_message`].
#[derive(Debug, Clone)]
pub struct AdminMandate<'a> {
    pub admin_public_key: &'a str,
    pub signature: &'a str,
}

/// The exact bytes an admin signs to authorize deleting `target_public_key`.
pub fn authorized_deletion_message(
    target_public_key: &str,
    reason: &str,
    nonce: &str,
) -> Vec<u8> {
    format!("{target_public_key}\x1f{reason}\x1f{nonce}").into_bytes()
}

// ── Ledger ───────────────────────────────────────────────────────────────────

/// The ledger engine. Cheap to share (`Arc<Ledger>`); all methods take
/// `&self`.
pub struct Ledger {
    catalog: Arc<CatalogStore>,
    registry: KeyRegistry,
    offchain: OffChainStore,
    config: LedgerConfig,
    /// The process-wide writer lock. Non-reentrant: internal code paths
    /// that already hold it call the lock-free `*_locked` helpers.
    writer: Mutex<()>,
}

fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

impl Ledger {
    /// Open (or create) a ledger rooted at `config.base_dir`.
    pub fn open(config: LedgerConfig) -> Result<Self, SealError> {
        std::fs::create_dir_all(&config.base_dir)?;
        let catalog = Arc::new(CatalogStore::open(config.catalog_dir())?);
        let registry = KeyRegistry::new(Arc::clone(&catalog));
        let offchain = OffChainStore::open(config.off_chain_dir())?;
        info!(base = %config.base_dir.display(), blocks = catalog.block_count(), "ledger opened");
        Ok(Self {
            catalog,
            registry,
            offchain,
            config,
            writer: Mutex::new(()),
        })
    }

    fn write_lock(&self) -> Result<MutexGuard<'_, ()>, SealError> {
        self.writer
            .lock()
            .map_err(|_| SealError::StateConflict("writer lock poisoned by an earlier panic".into()))
    }

    // ── Append ───────────────────────────────────────────────────────────────

    /// Append one block. Serialized on the writer lock; either the block is
    /// committed durably or no trace remains (including any off-chain file
    /// written along the way).
    pub fn append(
        &self,
        data: Option<&str>,
        signer: &SignerKeyPair,
        options: &AppendOptions<'_>,
    ) -> Result<Block, SealError> {
        let _guard = self.write_lock()?;
        let now = now_millis();

        // Authorization first: unregistered or revoked signers never get to
        // stage anything.
        if !self.signer_authorized(signer.public_key(), now)? {
            self.catalog.append_audit(AuditRecord {
                seq: 0,
                actor: key_fingerprint(signer.public_key()),
                target_fingerprint: key_fingerprint(signer.public_key()),
                operation: "DENY_APPEND".into(),
                reason: None,
                timestamp: now,
            })?;
            return Err(SealError::AuthorizationDenied(format!(
                "signer {} is not an active authorized key",
                key_fingerprint(signer.public_key())
            )));
        }

        // All input validation happens before any write.
        let disposition = match validate_and_determine_storage(data, &self.config)? {
            StorageDisposition::OnChain if options.force_off_chain => StorageDisposition::OffChain,
            disposition => disposition,
        };
        let payload = data.unwrap_or_default();
        let metadata = BlockMetadata::derive(
            options.manual_keywords,
            options.auto_keywords,
            options.content_category,
        )?;
        if let Some(recipient) = options.recipient_public_key {
            decode_public_key(recipient)?;
        }
        if let Some(content_type) = options.content_type {
            require_max_chars("content_type", content_type, MAX_CONTENT_TYPE_CHARS)?;
        }
        if options.password.is_some() && disposition == StorageDisposition::OffChain {
            return Err(SealError::InvalidInput(
                "password encryption applies to inline payloads; off-chain files are always encrypted"
                    .into(),
            ));
        }

        let mut tx = self.catalog.begin();
        let mut created_file: Option<String> = None;
        let result = self.append_in_tx(
            &mut tx,
            payload,
            disposition,
            signer,
            options,
            metadata,
            now,
            &mut created_file,
        );
        let block = match result {
            Ok(block) => block,
            Err(e) => {
                self.discard_file(&created_file);
                return Err(e);
            }
        };
        if let Err(e) = tx.commit() {
            self.discard_file(&created_file);
            return Err(e);
        }

        info!(
            block = block.block_number,
            off_chain = block.has_off_chain_data(),
            encrypted = block.is_encrypted,
            "block appended"
        );
        Ok(block)
    }

    #[allow(clippy::too_many_arguments)]
    fn append_in_tx(
        &self,
        tx: &mut CatalogTx<'_>,
        payload: &str,
        disposition: StorageDisposition,
        signer: &SignerKeyPair,
        options: &AppendOptions<'_>,
        metadata: BlockMetadata,
        now: Timestamp,
        created_file: &mut Option<String>,
    ) -> Result<Block, SealError> {
        self.ensure_genesis(tx, now)?;
        let tip = tx
            .last_block()?
            .ok_or_else(|| SealError::Storage("tip missing after genesis creation".into()))?;
        if tip.block_number == i64::MAX {
            return Err(SealError::BlockNumberOverflow);
        }
        let number = tip.block_number + 1;
        let timestamp = self.next_timestamp(now, tip.timestamp);

        // Payload encryption (inline path only).
        let (data, is_encrypted, encryption_metadata) = match options.password {
            Some(password) => {
                let envelope = encrypt_payload(payload, password, timestamp)?;
                (ENCRYPTED_PLACEHOLDER.to_string(), true, Some(envelope))
            }
            None => (payload.to_string(), false, None),
        };

        // Off-chain branch: the encrypted file is written before the block
        // row; any later failure unlinks it.
        let (data, off_chain) = match disposition {
            StorageDisposition::OnChain => (data, None),
            StorageDisposition::OffChain => {
                let password = offchain_password(number, signer.public_key());
                let stored = self.offchain.write(payload.as_bytes(), &password, timestamp)?;
                *created_file = Some(stored.file_path.clone());
                let signature = signer.sign(stored.data_hash.as_bytes())?;
                let meta = OffChainData {
                    data_hash: stored.data_hash.clone(),
                    signature,
                    signer_public_key: signer.public_key().to_string(),
                    file_path: stored.file_path,
                    file_size: stored.file_size,
                    encryption_iv: stored.encryption_iv,
                    kdf_salt: stored.kdf_salt,
                    content_type: options.content_type.unwrap_or("text/plain").to_string(),
                    created_at: timestamp,
                };
                (Block::off_chain_ref(&meta.data_hash), Some(meta))
            }
        };

        let mut block = Block {
            block_number: number,
            previous_hash: tip.hash.clone(),
            hash: String::new(),
            timestamp,
            data,
            signature: String::new(),
            signer_public_key: signer.public_key().to_string(),
            recipient_public_key: options.recipient_public_key.map(String::from),
            manual_keywords: metadata.manual_keywords,
            auto_keywords: metadata.auto_keywords,
            searchable_content: metadata.searchable_content,
            content_category: metadata.content_category,
            is_encrypted,
            encryption_metadata,
            off_chain,
        };
        block.hash = block.compute_hash();
        block.signature = signer.sign(block.hash.as_bytes())?;

        tx.insert_block(block.clone())?;
        Ok(block)
    }

    /// Create the genesis block inside `tx` when the chain is empty.
    fn ensure_genesis(&self, tx: &mut CatalogTx<'_>, now: Timestamp) -> Result<(), SealError> {
        if tx.last_block()?.is_some() {
            return Ok(());
        }
        let mut genesis = Block {
            block_number: 0,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash: String::new(),
            timestamp: now,
            data: String::new(),
            signature: GENESIS_SENTINEL.to_string(),
            signer_public_key: GENESIS_SENTINEL.to_string(),
            recipient_public_key: None,
            manual_keywords: None,
            auto_keywords: None,
            searchable_content: None,
            content_category: None,
            is_encrypted: false,
            encryption_metadata: None,
            off_chain: None,
        };
        genesis.hash = genesis.compute_hash();
        tx.insert_block(genesis)?;
        info!("genesis block created");
        Ok(())
    }

    fn next_timestamp(&self, now: Timestamp, previous: Timestamp) -> Timestamp {
        if self.config.strict_monotonic_timestamps && now <= previous {
            previous + 1
        } else {
            now.max(previous)
        }
    }

    fn signer_authorized(&self, public_key: &str, now: Timestamp) -> Result<bool, SealError> {
        Ok(match self.registry.active_entry(public_key)? {
            Some(entry) => entry.was_authorized_at(now),
            None => false,
        })
    }

    fn discard_file(&self, created_file: &Option<String>) {
        if let Some(path) = created_file {
            match self.offchain.delete(path) {
                Ok(_) => {}
                Err(e) => warn!(file = %path, error = %e, "failed to unlink abandoned off-chain file"),
            }
        }
    }

    // ── Reads (no writer lock) ───────────────────────────────────────────────

    pub fn get_block(&self, number: BlockNumber) -> Result<Option<Block>, SealError> {
        self.catalog.block_by_number(number)
    }

    /// The committed tip. Fresh read: never use this to derive the next
    /// block number; the append path reads its tip through the transaction.
    pub fn get_last_block(&self) -> Result<Option<Block>, SealError> {
        self.catalog.last_block()
    }

    pub fn block_count(&self) -> u64 {
        self.catalog.block_count()
    }

    pub fn blocks_page(&self, offset: i64, limit: usize) -> Result<Vec<Block>, SealError> {
        self.catalog.blocks_page(offset, limit)
    }

    pub fn blocks_for_recipient(&self, recipient: &str) -> Result<Vec<Block>, SealError> {
        self.catalog.blocks_for_recipient(recipient)
    }

    pub fn audit_records(&self) -> Result<Vec<AuditRecord>, SealError> {
        self.catalog.audit_records()
    }

    /// Decrypt a password-encrypted inline payload.
    pub fn decrypt_block_payload(
        &self,
        number: BlockNumber,
        password: &str,
    ) -> Result<String, SealError> {
        let block = self
            .get_block(number)?
            .ok_or(SealError::BlockNotFound(number))?;
        let envelope = block
            .encryption_metadata
            .as_deref()
            .filter(|_| block.is_encrypted)
            .ok_or_else(|| {
                SealError::InvalidInput(format!("block {number} is not password-encrypted"))
            })?;
        decrypt_payload(envelope, password)
    }

    /// Decrypt and verify an off-chain payload through its owning block.
    pub fn read_off_chain_payload(&self, number: BlockNumber) -> Result<Vec<u8>, SealError> {
        let block = self
            .get_block(number)?
            .ok_or(SealError::BlockNotFound(number))?;
        let meta = block
            .off_chain
            .as_ref()
            .ok_or_else(|| SealError::InvalidInput(format!("block {number} has no off-chain data")))?;
        let password = offchain_password(number, &block.signer_public_key);
        self.offchain.read_verified(meta, &password)
    }

    // ── Validation (no writer lock) ──────────────────────────────────────────

    pub fn validate_chain(&self, options: &ValidationOptions) -> Result<ChainValidationResult, SealError> {
        ChainValidator::new(&self.catalog, &self.registry, &self.offchain).validate_detailed(options)
    }

    pub fn validate_chain_streaming(
        &self,
        options: &ValidationOptions,
    ) -> Result<ChainValidationResult, SealError> {
        ChainValidator::new(&self.catalog, &self.registry, &self.offchain).validate_streaming(options)
    }

    // ── Metadata update ──────────────────────────────────────────────────────

    /// Update the four search-metadata fields of one block. Everything else
    /// on a persisted block, including the recipient, is immutable.
    pub fn update_block_metadata(
        &self,
        number: BlockNumber,
        manual_keywords: Option<&str>,
        auto_keywords: Option<&str>,
        content_category: Option<&str>,
    ) -> Result<Block, SealError> {
        let _guard = self.write_lock()?;
        let metadata = BlockMetadata::derive(manual_keywords, auto_keywords, content_category)?;
        let mut block = self
            .catalog
            .block_by_number(number)?
            .ok_or(SealError::BlockNotFound(number))?;
        block.manual_keywords = metadata.manual_keywords;
        block.auto_keywords = metadata.auto_keywords;
        block.searchable_content = metadata.searchable_content;
        block.content_category = metadata.content_category;
        self.catalog.update_block(&block)?;
        self.catalog.flush()?;
        Ok(block)
    }

    // ── Key registry ─────────────────────────────────────────────────────────

    pub fn register_key(
        &self,
        public_key: &str,
        owner_name: &str,
        role: KeyRole,
        created_by: &str,
    ) -> Result<AuthorizedKey, SealError> {
        let _guard = self.write_lock()?;
        self.registry
            .register_key(public_key, owner_name, role, created_by, now_millis())
    }

    pub fn revoke_key(
        &self,
        public_key: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<AuthorizedKey, SealError> {
        let _guard = self.write_lock()?;
        self.registry.revoke_key(public_key, actor, reason, now_millis())
    }

    pub fn was_key_authorized_at(&self, public_key: &str, t: Timestamp) -> Result<bool, SealError> {
        self.registry.was_key_authorized_at(public_key, t)
    }

    pub fn authorized_keys(&self) -> Result<Vec<AuthorizedKey>, SealError> {
        self.registry.all_keys()
    }

    /// Level 1 of the deletion API: read-only impact analysis.
    pub fn key_deletion_impact(&self, public_key: &str) -> Result<KeyDeletionImpact, SealError> {
        self.registry.deletion_impact(public_key)
    }

    /// Level 2: refuses when any block references the key.
    pub fn delete_key_safe(&self, public_key: &str, actor: &str) -> Result<u64, SealError> {
        let _guard = self.write_lock()?;
        self.registry.delete_key_safe(public_key, actor, now_millis())
    }

    /// Level 3: authorized force delete.
    ///
    /// Requires a registered, currently-authorized Admin key's signature
    /// over [`authorized_deletion_message`]. An invalid mandate is a
    /// security violation and mutates nothing. Before the key is unlinked,
    /// an emergency snapshot of the whole chain is exported. With `force`,
    /// the deletion proceeds even when blocks reference the key; those
    /// blocks will be reported as revoked by the validator thereafter.
    pub fn delete_key_authorized(
        &self,
        target_public_key: &str,
        reason: &str,
        nonce: &str,
        mandate: &AdminMandate<'_>,
        force: bool,
    ) -> Result<u64, SealError> {
        let _guard = self.write_lock()?;
        let now = now_millis();
        require_max_chars("change_reason", reason, MAX_AUDIT_REASON_CHARS)?;

        let deny = |why: &str| -> Result<u64, SealError> {
            self.catalog.append_audit(AuditRecord {
                seq: 0,
                actor: key_fingerprint(mandate.admin_public_key),
                target_fingerprint: key_fingerprint(target_public_key),
                operation: "DENY_FORCE_DELETE".into(),
                reason: Some(why.to_string()),
                timestamp: now,
            })?;
            Err(SealError::SecurityViolation(why.to_string()))
        };

        let admin = match self.registry.active_entry(mandate.admin_public_key)? {
            Some(entry) if entry.was_authorized_at(now) => entry,
            _ => return deny("mandate signer is not an active authorized key"),
        };
        if admin.role != KeyRole::Admin {
            return deny("mandate signer does not hold the admin role");
        }
        let message = authorized_deletion_message(target_public_key, reason, nonce);
        if verify_signature(mandate.admin_public_key, &message, mandate.signature).is_err() {
            return deny("admin mandate signature verification failed");
        }

        let impact = self.registry.deletion_impact(target_public_key)?;
        if impact.blocks_signed > 0 && !force {
            return Err(SealError::StateConflict(format!(
                "key {} signed {} block(s); pass force=true to orphan them",
                key_fingerprint(target_public_key),
                impact.blocks_signed
            )));
        }

        let snapshot = self.config.snapshot_dir().join(format!("emergency-{now}"));
        export_chain(&self.catalog, &self.registry, &self.offchain, &snapshot, now)?;
        info!(snapshot = %snapshot.display(), "emergency snapshot written before force delete");

        self.registry
            .delete_key_unchecked(target_public_key, &admin.owner_name, reason, now)
    }

    // ── Rollback / clear ─────────────────────────────────────────────────────

    /// Remove every block with `block_number > target`, deleting their
    /// off-chain files first. The tail is re-validated afterwards; on a
    /// structural failure the pre-rollback snapshot is restored.
    pub fn rollback_to_block(&self, target: BlockNumber) -> Result<u64, SealError> {
        let _guard = self.write_lock()?;
        self.rollback_locked(target)
    }

    /// Remove the newest `count` blocks.
    pub fn rollback_blocks(&self, count: u64) -> Result<u64, SealError> {
        let _guard = self.write_lock()?;
        let tip = self
            .catalog
            .last_block()?
            .ok_or_else(|| SealError::StateConflict("cannot roll back an empty chain".into()))?;
        if count == 0 {
            return Ok(0);
        }
        let target = tip
            .block_number
            .checked_sub(count as i64)
            .filter(|t| *t >= 0)
            .ok_or_else(|| {
                SealError::InvalidInput(format!(
                    "cannot roll back {count} block(s) from tip {}",
                    tip.block_number
                ))
            })?;
        self.rollback_locked(target)
    }

    fn rollback_locked(&self, target: BlockNumber) -> Result<u64, SealError> {
        let now = now_millis();
        if target < 0 {
            return Err(SealError::InvalidInput(
                "rollback target must be non-negative; use clear_chain to drop everything".into(),
            ));
        }
        let tip = self
            .catalog
            .last_block()?
            .ok_or_else(|| SealError::StateConflict("cannot roll back an empty chain".into()))?;
        if target >= tip.block_number {
            return Ok(0);
        }

        let snapshot = self.config.snapshot_dir().join(format!("pre-rollback-{now}"));
        export_chain(&self.catalog, &self.registry, &self.offchain, &snapshot, now)?;

        // Files first, pages of the tail in chain order.
        let mut offset = target + 1;
        loop {
            let page = self.catalog.blocks_page(offset, ROLLBACK_PAGE_SIZE)?;
            if page.is_empty() {
                break;
            }
            let short_page = page.len() < ROLLBACK_PAGE_SIZE;
            offset = page.last().map(|b| b.block_number + 1).unwrap_or(offset);
            for block in &page {
                if let Some(meta) = &block.off_chain {
                    let _ = self.offchain.delete(&meta.file_path)?;
                }
            }
            if short_page {
                break;
            }
        }

        let removed = (tip.block_number - target) as u64;
        let mut tx = self.catalog.begin();
        tx.delete_above(target);
        tx.commit()?;

        let verdict = ChainValidator::new(&self.catalog, &self.registry, &self.offchain)
            .validate_streaming(&ValidationOptions::structural_only())?;
        if !verdict.structurally_intact {
            warn!("post-rollback validation failed; restoring pre-rollback snapshot");
            import_chain(&self.catalog, &self.offchain, &snapshot, now)?;
            return Err(SealError::IntegrityCheckFailed(
                "rollback produced a structurally invalid chain; snapshot restored".into(),
            ));
        }

        info!(target, removed, "chain rolled back");
        Ok(removed)
    }

    /// Drop every block and its off-chain file, then sweep for orphans.
    /// The key registry and audit trail survive.
    pub fn clear_chain(&self) -> Result<(), SealError> {
        let _guard = self.write_lock()?;
        let mut offset: i64 = 0;
        loop {
            let page = self.catalog.blocks_page(offset, ROLLBACK_PAGE_SIZE)?;
            if page.is_empty() {
                break;
            }
            let short_page = page.len() < ROLLBACK_PAGE_SIZE;
            offset = page.last().map(|b| b.block_number + 1).unwrap_or(offset);
            for block in &page {
                if let Some(meta) = &block.off_chain {
                    let _ = self.offchain.delete(&meta.file_path)?;
                }
            }
            if short_page {
                break;
            }
        }
        self.catalog.clear_blocks()?;
        self.catalog.flush()?;
        let report = self.cleanup_orphans_locked(&CleanupOptions::default())?;
        info!(orphans_removed = report.deleted, "chain cleared");
        Ok(())
    }

    // ── Export / import / cleanup ────────────────────────────────────────────

    /// Snapshot the chain into `bundle_dir`. Takes the writer lock so the
    /// bundle is a consistent cut.
    pub fn export_chain(&self, bundle_dir: &Path) -> Result<ExportMetadata, SealError> {
        let _guard = self.write_lock()?;
        export_chain(&self.catalog, &self.registry, &self.offchain, bundle_dir, now_millis())
    }

    /// Replace the whole ledger state with a bundle's contents.
    pub fn import_chain(&self, bundle_dir: &Path) -> Result<ImportSummary, SealError> {
        let _guard = self.write_lock()?;
        import_chain(&self.catalog, &self.offchain, bundle_dir, now_millis())
    }

    /// Remove store-produced off-chain files no block references.
    pub fn cleanup_orphans(&self, options: &CleanupOptions) -> Result<CleanupReport, SealError> {
        let _guard = self.write_lock()?;
        self.cleanup_orphans_locked(options)
    }

    fn cleanup_orphans_locked(&self, options: &CleanupOptions) -> Result<CleanupReport, SealError> {
        let referenced = self
            .catalog
            .off_chain_file_paths()?
            .iter()
            .filter_map(|p| offchain_file_stem(p))
            .map(String::from)
            .collect();
        cleanup_orphans(&self.offchain, &referenced, options)
    }
}
