//! Chain export and import.
//!
//! An export bundle is a directory:
//!
//! ```text
//! <bundle>/chain-export.json     — {metadata, authorized_keys, blocks}
//! <bundle>/off-chain-backup/     — copied encrypted files
//! ```
//!
//! Exported `file_path`s are rewritten to their backup-relative form; import
//! restores the files into the live store under fresh names and rewrites the
//! paths back. Import validates the whole bundle before touching any state.
//!
//! Callers (the engine) hold the writer lock across both operations.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sealchain_catalog::CatalogStore;
use sealchain_core::{
    AuthorizedKey, Block, SealError, Timestamp, EXPORT_BUNDLE_FILE, EXPORT_BUNDLE_VERSION,
    GENESIS_PREVIOUS_HASH, GENESIS_SENTINEL, OFF_CHAIN_BACKUP_DIR, VALIDATION_BATCH_SIZE,
};
use sealchain_crypto::verify_signature;
use sealchain_offchain::OffChainStore;
use sealchain_registry::KeyRegistry;
use sealchain_validate::{ChainValidator, ValidationOptions};

// ── Bundle schema ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Bundle schema version.
    pub version: String,
    pub exported_at: Timestamp,
    pub genesis_hash: Option<String>,
    pub total_blocks: u64,
    /// Structural verdict of the chain at export time.
    pub chain_valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportBundle {
    pub metadata: ExportMetadata,
    pub authorized_keys: Vec<AuthorizedKey>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub blocks_imported: u64,
    pub keys_imported: u64,
    pub off_chain_files_restored: u64,
}

// ── Export ───────────────────────────────────────────────────────────────────

/// Write a full snapshot of the catalog and off-chain files into
/// `bundle_dir`. Returns the bundle metadata.
pub fn export_chain(
    store: &CatalogStore,
    registry: &KeyRegistry,
    offchain: &OffChainStore,
    bundle_dir: &Path,
    now: Timestamp,
) -> Result<ExportMetadata, SealError> {
    fs::create_dir_all(bundle_dir)?;
    let backup_dir = bundle_dir.join(OFF_CHAIN_BACKUP_DIR);
    fs::create_dir_all(&backup_dir)?;

    let chain_valid = ChainValidator::new(store, registry, offchain)
        .validate_streaming(&ValidationOptions::structural_only())?
        .structurally_intact;
    if !chain_valid {
        warn!("exporting a chain that fails structural validation");
    }

    let mut blocks = Vec::new();
    let mut offset: i64 = 0;
    loop {
        let page = store.blocks_page(offset, VALIDATION_BATCH_SIZE)?;
        if page.is_empty() {
            break;
        }
        let short_page = page.len() < VALIDATION_BATCH_SIZE;
        offset = page.last().map(|b| b.block_number + 1).unwrap_or(offset);
        for mut block in page {
            if let Some(meta) = block.off_chain.as_mut() {
                let source = offchain.resolve(&meta.file_path)?;
                let name = source
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| {
                        SealError::InvalidInput(format!("unusable off-chain path: {}", meta.file_path))
                    })?
                    .to_string();
                fs::copy(&source, backup_dir.join(&name))?;
                meta.file_path = format!("{OFF_CHAIN_BACKUP_DIR}/{name}");
            }
            blocks.push(block);
        }
        if short_page {
            break;
        }
    }

    let metadata = ExportMetadata {
        version: EXPORT_BUNDLE_VERSION.to_string(),
        exported_at: now,
        genesis_hash: blocks.first().map(|b| b.hash.clone()),
        total_blocks: blocks.len() as u64,
        chain_valid,
    };
    let bundle = ExportBundle {
        metadata: metadata.clone(),
        authorized_keys: registry.all_keys()?,
        blocks,
    };
    let json = serde_json::to_string_pretty(&bundle)
        .map_err(|e| SealError::Serialization(e.to_string()))?;
    fs::write(bundle_dir.join(EXPORT_BUNDLE_FILE), json)?;

    info!(
        bundle = %bundle_dir.display(),
        blocks = metadata.total_blocks,
        keys = bundle.authorized_keys.len(),
        chain_valid,
        "chain exported"
    );
    Ok(metadata)
}

// ── Import ───────────────────────────────────────────────────────────────────

/// Replace the catalog and off-chain store with the contents of a bundle.
///
/// The bundle is fully validated first; the current state is only touched
/// once the bundle is known good.
pub fn import_chain(
    store: &CatalogStore,
    offchain: &OffChainStore,
    bundle_dir: &Path,
    now: Timestamp,
) -> Result<ImportSummary, SealError> {
    let json = fs::read_to_string(bundle_dir.join(EXPORT_BUNDLE_FILE))?;
    let bundle: ExportBundle =
        serde_json::from_str(&json).map_err(|e| SealError::Serialization(e.to_string()))?;

    validate_bundle(&bundle, bundle_dir)?;

    // Drop the current chain's off-chain files through the owning path.
    for path in store.off_chain_file_paths()? {
        let _ = offchain.delete(&path)?;
    }
    store.clear_blocks()?;
    store.clear_keys()?;

    for key in &bundle.authorized_keys {
        store.put_key(key)?;
    }

    let mut restored = 0u64;
    for mut block in bundle.blocks {
        if let Some(meta) = block.off_chain.as_mut() {
            let backup = bundle_dir.join(&meta.file_path);
            meta.file_path = offchain.adopt_file(&backup, now)?;
            restored += 1;
        }
        store.insert_block_direct(&block)?;
    }
    store.flush()?;

    let summary = ImportSummary {
        blocks_imported: bundle.metadata.total_blocks,
        keys_imported: bundle.authorized_keys.len() as u64,
        off_chain_files_restored: restored,
    };
    info!(
        blocks = summary.blocks_imported,
        keys = summary.keys_imported,
        restored,
        "chain imported"
    );
    Ok(summary)
}

/// Check every bundle block against the chain invariants (recomputed hash,
/// link, dense numbering, monotone timestamps, signature, off-chain
/// consistency and backup presence) before any state is mutated.
fn validate_bundle(bundle: &ExportBundle, bundle_dir: &Path) -> Result<(), SealError> {
    let mut prev: Option<&Block> = None;
    let mut seen = HashSet::new();
    for block in &bundle.blocks {
        let n = block.block_number;
        if !seen.insert(n) {
            return Err(SealError::DuplicateBlockNumber(n));
        }
        if block.compute_hash() != block.hash {
            return Err(SealError::IntegrityCheckFailed(format!(
                "bundle block {n}: hash does not match content"
            )));
        }
        match prev {
            None => {
                if n != 0 || block.previous_hash != GENESIS_PREVIOUS_HASH {
                    return Err(SealError::IntegrityCheckFailed(format!(
                        "bundle block {n}: not a well-formed genesis"
                    )));
                }
            }
            Some(prev) => {
                if n != prev.block_number + 1 {
                    return Err(SealError::IntegrityCheckFailed(format!(
                        "bundle block {n}: non-contiguous block number"
                    )));
                }
                if block.previous_hash != prev.hash {
                    return Err(SealError::IntegrityCheckFailed(format!(
                        "bundle block {n}: broken hash link"
                    )));
                }
                if block.timestamp < prev.timestamp {
                    return Err(SealError::IntegrityCheckFailed(format!(
                        "bundle block {n}: timestamp regression"
                    )));
                }
            }
        }
        let is_genesis = n == 0 && block.signer_public_key == GENESIS_SENTINEL;
        if !is_genesis {
            verify_signature(&block.signer_public_key, block.hash.as_bytes(), &block.signature)
                .map_err(|_| {
                    SealError::IntegrityCheckFailed(format!(
                        "bundle block {n}: signature verification failed"
                    ))
                })?;
        }
        if let Some(meta) = &block.off_chain {
            if block.data != Block::off_chain_ref(&meta.data_hash) {
                return Err(SealError::IntegrityCheckFailed(format!(
                    "bundle block {n}: off-chain reference mismatch"
                )));
            }
            let backup = bundle_dir.join(&meta.file_path);
            if !backup.is_file() {
                return Err(SealError::IntegrityCheckFailed(format!(
                    "bundle block {n}: missing off-chain backup {}",
                    meta.file_path
                )));
            }
        }
        prev = Some(block);
    }
    Ok(())
}
