//! Chain validation: structural integrity (hash links, recomputed hashes,
//! signatures, off-chain consistency, timestamp order) and authorization
//! compliance (signer authorized at the block's timestamp).
//!
//! Validation never stops at the first failure; it classifies every block
//! and reports the full picture. Blocks failing a structural invariant land
//! in `invalid_blocks`; blocks failing only temporal authorization land in
//! `revoked_blocks` (the expected aftermath of an authorized force delete).

use tracing::{info, warn};

use sealchain_catalog::CatalogStore;
use sealchain_core::{
    Block, BlockNumber, SealError, Timestamp, GENESIS_PREVIOUS_HASH, GENESIS_SENTINEL,
    OFF_CHAIN_REF_PREFIX, VALIDATION_BATCH_SIZE, VALIDATION_HARD_LIMIT_BLOCKS,
    VALIDATION_WARN_BLOCKS,
};
use sealchain_crypto::{offchain_password, verify_signature};
use sealchain_offchain::OffChainStore;
use sealchain_registry::KeyRegistry;

// ── Options and result ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Decrypt-and-verify every off-chain file. On for full validation; off
    /// for structural-only runs where file I/O is too expensive.
    pub verify_off_chain: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self { verify_off_chain: true }
    }
}

impl ValidationOptions {
    pub fn structural_only() -> Self {
        Self { verify_off_chain: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChainValidationResult {
    /// Hash links, recomputed hashes, signatures, off-chain references
    /// and timestamp order hold for every block.
    pub structurally_intact: bool,
    /// Every signer was authorized at its block's timestamp.
    pub fully_compliant: bool,
    pub blocks_checked: u64,
    pub invalid_blocks: Vec<BlockNumber>,
    pub revoked_blocks: Vec<BlockNumber>,
    /// Human-readable findings, one line per problem.
    pub report: String,
}

impl ChainValidationResult {
    pub fn is_fully_valid(&self) -> bool {
        self.structurally_intact && self.fully_compliant
    }
}

// ── Validator ────────────────────────────────────────────────────────────────

/// Carried forward from block to block while scanning.
struct PrevLink {
    number: BlockNumber,
    hash: String,
    timestamp: Timestamp,
}

pub struct ChainValidator<'a> {
    store: &'a CatalogStore,
    registry: &'a KeyRegistry,
    offchain: &'a OffChainStore,
}

impl<'a> ChainValidator<'a> {
    pub fn new(
        store: &'a CatalogStore,
        registry: &'a KeyRegistry,
        offchain: &'a OffChainStore,
    ) -> Self {
        Self { store, registry, offchain }
    }

    /// Whole-chain validation with everything in memory. Refuses above the
    /// hard block-count limit; use [`validate_streaming`](Self::validate_streaming)
    /// for chains of that size.
    pub fn validate_detailed(
        &self,
        options: &ValidationOptions,
    ) -> Result<ChainValidationResult, SealError> {
        let count = self.store.block_count();
        if count > VALIDATION_HARD_LIMIT_BLOCKS {
            return Err(SealError::ChainTooLarge { count });
        }
        if count > VALIDATION_WARN_BLOCKS {
            warn!(blocks = count, "detailed validation on a large chain; consider streaming");
        }

        let blocks = self.store.blocks_page(0, count.max(1) as usize)?;
        let mut state = ScanState::default();
        for block in &blocks {
            self.check_block(block, &mut state, options)?;
        }
        Ok(state.finish("detailed"))
    }

    /// Same verdict as [`validate_detailed`](Self::validate_detailed), but
    /// paging through the catalog with bounded memory.
    pub fn validate_streaming(
        &self,
        options: &ValidationOptions,
    ) -> Result<ChainValidationResult, SealError> {
        let mut state = ScanState::default();
        let mut offset: i64 = 0;
        loop {
            let page = self.store.blocks_page(offset, VALIDATION_BATCH_SIZE)?;
            if page.is_empty() {
                break;
            }
            for block in &page {
                self.check_block(block, &mut state, options)?;
            }
            let last_number = page.last().map(|b| b.block_number).unwrap_or(offset);
            offset = last_number
                .checked_add(1)
                .ok_or(SealError::BlockNumberOverflow)?;
            if page.len() < VALIDATION_BATCH_SIZE {
                break;
            }
        }
        Ok(state.finish("streaming"))
    }

    // ── Per-block checks ─────────────────────────────────────────────────────

    fn check_block(
        &self,
        block: &Block,
        state: &mut ScanState,
        options: &ValidationOptions,
    ) -> Result<(), SealError> {
        let n = block.block_number;
        let mut faults: Vec<String> = Vec::new();

        // Recomputed hash.
        let recomputed = block.compute_hash();
        if recomputed != block.hash {
            faults.push(format!("block {n}: stored hash does not match canonical content"));
        }

        // Link to predecessor, plus dense numbering.
        match &state.prev {
            None => {
                if n != 0 {
                    faults.push(format!("block {n}: chain does not start at genesis"));
                }
                if block.previous_hash != GENESIS_PREVIOUS_HASH {
                    faults.push(format!("block {n}: genesis previous-hash sentinel missing"));
                }
            }
            Some(prev) => {
                if n != prev.number + 1 {
                    faults.push(format!(
                        "block {n}: expected block number {}",
                        prev.number + 1
                    ));
                }
                if block.previous_hash != prev.hash {
                    faults.push(format!("block {n}: broken hash link to block {}", prev.number));
                }
                // Timestamps are monotone non-decreasing.
                if block.timestamp < prev.timestamp {
                    faults.push(format!("block {n}: timestamp earlier than block {}", prev.number));
                }
            }
        }

        let is_genesis = n == 0 && block.signer_public_key == GENESIS_SENTINEL;

        // Signature over the stored hash.
        if !is_genesis
            && verify_signature(
                &block.signer_public_key,
                block.hash.as_bytes(),
                &block.signature,
            )
            .is_err()
        {
            faults.push(format!("block {n}: signature verification failed"));
        }

        // Off-chain reference consistency.
        match &block.off_chain {
            Some(meta) => {
                if block.data != Block::off_chain_ref(&meta.data_hash) {
                    faults.push(format!("block {n}: off-chain reference mismatch"));
                } else if options.verify_off_chain {
                    let password = offchain_password(n, &block.signer_public_key);
                    if let Err(e) = self.offchain.verify(meta, &password) {
                        faults.push(format!("block {n}: off-chain integrity failure: {e}"));
                    }
                }
            }
            None => {
                if block.data.starts_with(OFF_CHAIN_REF_PREFIX) {
                    faults.push(format!("block {n}: dangling off-chain reference"));
                }
            }
        }

        // Signer authorized at the block's timestamp. Registry lookup
        // failures are fatal, not per-block findings.
        let authorized = is_genesis
            || self
                .registry
                .was_key_authorized_at(&block.signer_public_key, block.timestamp)?;

        state.blocks_checked += 1;
        if !faults.is_empty() {
            state.invalid.push(n);
            state.findings.extend(faults);
        } else if !authorized {
            state.revoked.push(n);
            state
                .findings
                .push(format!("block {n}: signer not authorized at block timestamp"));
        }

        state.prev = Some(PrevLink {
            number: n,
            hash: block.hash.clone(),
            timestamp: block.timestamp,
        });
        Ok(())
    }
}

// ── Scan state ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct ScanState {
    prev: Option<PrevLink>,
    blocks_checked: u64,
    invalid: Vec<BlockNumber>,
    revoked: Vec<BlockNumber>,
    findings: Vec<String>,
}

impl ScanState {
    fn finish(self, mode: &str) -> ChainValidationResult {
        let structurally_intact = self.invalid.is_empty();
        let fully_compliant = self.revoked.is_empty();
        let mut report = format!(
            "{mode} validation: {} block(s) checked, {} invalid, {} revoked",
            self.blocks_checked,
            self.invalid.len(),
            self.revoked.len()
        );
        for line in &self.findings {
            report.push('\n');
            report.push_str(line);
        }
        info!(
            blocks = self.blocks_checked,
            invalid = self.invalid.len(),
            revoked = self.revoked.len(),
            structurally_intact,
            fully_compliant,
            "chain validation complete"
        );
        ChainValidationResult {
            structurally_intact,
            fully_compliant,
            blocks_checked: self.blocks_checked,
            invalid_blocks: self.invalid,
            revoked_blocks: self.revoked,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealchain_core::KeyRole;
    use sealchain_crypto::SignerKeyPair;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<CatalogStore>,
        registry: KeyRegistry,
        offchain: OffChainStore,
        signer: SignerKeyPair,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CatalogStore::open(dir.path().join("catalog")).unwrap());
        let registry = KeyRegistry::new(Arc::clone(&store));
        let offchain = OffChainStore::open(dir.path().join("off-chain-data")).unwrap();
        let signer = SignerKeyPair::generate();
        registry
            .register_key(signer.public_key(), "validator-tests", KeyRole::User, "tests", 1_000)
            .unwrap();
        Fixture { _dir: dir, store, registry, offchain, signer }
    }

    fn raw_block(number: BlockNumber, previous_hash: &str, timestamp: Timestamp) -> Block {
        Block {
            block_number: number,
            previous_hash: previous_hash.to_string(),
            hash: String::new(),
            timestamp,
            data: format!("entry {number}"),
            signature: String::new(),
            signer_public_key: String::new(),
            recipient_public_key: None,
            manual_keywords: None,
            auto_keywords: None,
            searchable_content: None,
            content_category: None,
            is_encrypted: false,
            encryption_metadata: None,
            off_chain: None,
        }
    }

    /// Genesis plus `user_blocks` signed blocks at 1s intervals from t=2000.
    fn build_chain(fx: &Fixture, user_blocks: usize) -> Vec<Block> {
        let mut chain = Vec::new();
        let mut genesis = raw_block(0, GENESIS_PREVIOUS_HASH, 1_000);
        genesis.data = String::new();
        genesis.signer_public_key = GENESIS_SENTINEL.to_string();
        genesis.hash = genesis.compute_hash();
        genesis.signature = GENESIS_SENTINEL.to_string();
        chain.push(genesis);

        for i in 0..user_blocks {
            let prev = chain.last().unwrap();
            let mut block = raw_block(prev.block_number + 1, &prev.hash, 2_000 + i as i64 * 1_000);
            block.signer_public_key = fx.signer.public_key().to_string();
            block.hash = block.compute_hash();
            block.signature = fx.signer.sign(block.hash.as_bytes()).unwrap();
            chain.push(block);
        }
        for block in &chain {
            fx.store.insert_block_direct(block).unwrap();
        }
        chain
    }

    fn validator(fx: &Fixture) -> ChainValidator<'_> {
        ChainValidator::new(&fx.store, &fx.registry, &fx.offchain)
    }

    #[test]
    fn clean_chain_passes_both_modes() {
        let fx = fixture();
        build_chain(&fx, 5);
        let detailed = validator(&fx).validate_detailed(&ValidationOptions::default()).unwrap();
        let streaming = validator(&fx).validate_streaming(&ValidationOptions::default()).unwrap();
        for result in [&detailed, &streaming] {
            assert!(result.is_fully_valid(), "{}", result.report);
            assert_eq!(result.blocks_checked, 6);
        }
    }

    #[test]
    fn empty_chain_is_valid() {
        let fx = fixture();
        let result = validator(&fx).validate_detailed(&ValidationOptions::default()).unwrap();
        assert!(result.is_fully_valid());
        assert_eq!(result.blocks_checked, 0);
    }

    #[test]
    fn tampered_data_is_structural_failure() {
        let fx = fixture();
        let chain = build_chain(&fx, 3);
        let mut tampered = chain[2].clone();
        tampered.data = "rewritten".to_string();
        fx.store.insert_block_direct(&tampered).unwrap();

        let result = validator(&fx).validate_detailed(&ValidationOptions::default()).unwrap();
        assert!(!result.structurally_intact);
        assert_eq!(result.invalid_blocks, vec![2]);
    }

    #[test]
    fn broken_link_is_structural_failure() {
        let fx = fixture();
        let chain = build_chain(&fx, 3);
        let mut relinked = chain[2].clone();
        relinked.previous_hash = "f".repeat(64);
        relinked.hash = relinked.compute_hash();
        relinked.signature = fx.signer.sign(relinked.hash.as_bytes()).unwrap();
        fx.store.insert_block_direct(&relinked).unwrap();

        let result = validator(&fx).validate_detailed(&ValidationOptions::default()).unwrap();
        assert!(!result.structurally_intact);
        // Block 2 lost its link; block 3 still points at the original hash,
        // which no longer matches what the scan carried forward.
        assert!(result.invalid_blocks.contains(&2));
    }

    #[test]
    fn unauthorized_signer_is_revoked_not_invalid() {
        let fx = fixture();
        build_chain(&fx, 2);

        // A block signed by a key that was never registered.
        let rogue = SignerKeyPair::generate();
        let prev = fx.store.last_block().unwrap().unwrap();
        let mut block = raw_block(prev.block_number + 1, &prev.hash, prev.timestamp + 1_000);
        block.signer_public_key = rogue.public_key().to_string();
        block.hash = block.compute_hash();
        block.signature = rogue.sign(block.hash.as_bytes()).unwrap();
        fx.store.insert_block_direct(&block).unwrap();

        let result = validator(&fx).validate_detailed(&ValidationOptions::default()).unwrap();
        assert!(result.structurally_intact, "{}", result.report);
        assert!(!result.fully_compliant);
        assert_eq!(result.revoked_blocks, vec![block.block_number]);
    }

    #[test]
    fn streaming_and_detailed_agree_on_mixed_chain() {
        let fx = fixture();
        let chain = build_chain(&fx, 10);
        let mut tampered = chain[4].clone();
        tampered.timestamp -= 5_000;
        fx.store.insert_block_direct(&tampered).unwrap();

        let detailed = validator(&fx).validate_detailed(&ValidationOptions::default()).unwrap();
        let streaming = validator(&fx).validate_streaming(&ValidationOptions::default()).unwrap();
        assert_eq!(detailed.structurally_intact, streaming.structurally_intact);
        assert_eq!(detailed.invalid_blocks, streaming.invalid_blocks);
        assert_eq!(detailed.revoked_blocks, streaming.revoked_blocks);
        assert_eq!(detailed.blocks_checked, streaming.blocks_checked);
    }

    #[test]
    fn dangling_off_chain_reference_is_invalid() {
        let fx = fixture();
        build_chain(&fx, 1);
        let prev = fx.store.last_block().unwrap().unwrap();
        let mut block = raw_block(prev.block_number + 1, &prev.hash, prev.timestamp + 1);
        block.data = format!("{OFF_CHAIN_REF_PREFIX}{}", "a".repeat(64));
        block.signer_public_key = fx.signer.public_key().to_string();
        block.hash = block.compute_hash();
        block.signature = fx.signer.sign(block.hash.as_bytes()).unwrap();
        fx.store.insert_block_direct(&block).unwrap();

        let result = validator(&fx).validate_detailed(&ValidationOptions::default()).unwrap();
        assert!(result.invalid_blocks.contains(&block.block_number));
    }
}
