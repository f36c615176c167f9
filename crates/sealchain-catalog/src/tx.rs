//! Explicit catalog transaction handle.
//!
//! Mutating operations stage block inserts and a deletion watermark against
//! this handle; `commit` applies everything to the `blocks` tree in one
//! atomic batch. Dropping the handle uncommitted discards all staged work;
//! there is no partial-commit state.
//!
//! The handle also answers the tip question correctly *inside* the write:
//! [`CatalogTx::last_block`] sees staged, not-yet-committed inserts, which
//! the fresh-read [`CatalogStore::last_block`] cannot. Any write path that
//! computes `block_number = tip + 1` must use this handle's variant, or a
//! multi-block write will assign the same number twice.

use tracing::debug;

use sealchain_core::{Block, BlockNumber, SealError};

use crate::store::{block_key, CatalogStore};

pub struct CatalogTx<'a> {
    store: &'a CatalogStore,
    staged: Vec<Block>,
    delete_above: Option<BlockNumber>,
}

impl<'a> CatalogTx<'a> {
    pub(crate) fn new(store: &'a CatalogStore) -> Self {
        Self {
            store,
            staged: Vec::new(),
            delete_above: None,
        }
    }

    /// The tip visible to this transaction: the newest staged insert, or,
    /// when nothing is staged, the committed tip below any staged deletion
    /// watermark.
    pub fn last_block(&self) -> Result<Option<Block>, SealError> {
        if let Some(block) = self.staged.last() {
            return Ok(Some(block.clone()));
        }
        match self.delete_above {
            Some(watermark) => self.store.last_block_at_or_below(watermark),
            None => self.store.last_block(),
        }
    }

    /// Stage a block insert. A duplicate `block_number` against either the
    /// staged set or the committed catalog is a constraint violation: the
    /// signature of a write path that read its tip with the fresh-read
    /// variant.
    pub fn insert_block(&mut self, block: Block) -> Result<(), SealError> {
        let number = block.block_number;
        if number < 0 {
            return Err(SealError::InvalidInput(format!(
                "block number must be non-negative, got {number}"
            )));
        }
        if self.staged.iter().any(|b| b.block_number == number) {
            return Err(SealError::DuplicateBlockNumber(number));
        }
        let deleted = self.delete_above.map_or(false, |watermark| number > watermark);
        if !deleted && self.store.block_by_number(number)?.is_some() {
            return Err(SealError::DuplicateBlockNumber(number));
        }
        self.staged.push(block);
        Ok(())
    }

    /// Stage removal of every block with `block_number > watermark`.
    pub fn delete_above(&mut self, watermark: BlockNumber) {
        self.delete_above = Some(match self.delete_above {
            Some(existing) => existing.min(watermark),
            None => watermark,
        });
    }

    /// Apply all staged mutations atomically and flush to disk.
    pub fn commit(self) -> Result<(), SealError> {
        let mut batch = sled::Batch::default();

        if let Some(watermark) = self.delete_above {
            let start = watermark
                .checked_add(1)
                .ok_or(SealError::BlockNumberOverflow)?;
            for item in self.store.blocks.range(block_key(start).to_vec()..) {
                let (key, _) = item.map_err(|e| SealError::Storage(e.to_string()))?;
                batch.remove(key);
            }
        }

        let staged_count = self.staged.len();
        for block in &self.staged {
            let bytes =
                bincode::serialize(block).map_err(|e| SealError::Serialization(e.to_string()))?;
            batch.insert(block_key(block.block_number).to_vec(), bytes);
        }

        self.store
            .blocks
            .apply_batch(batch)
            .map_err(|e| SealError::Storage(e.to_string()))?;
        self.store.flush()?;
        debug!(
            inserted = staged_count,
            delete_above = ?self.delete_above,
            "catalog transaction committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, CatalogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path().join("catalog")).unwrap();
        (dir, store)
    }

    fn block(number: BlockNumber) -> Block {
        Block {
            block_number: number,
            previous_hash: "0".repeat(64),
            hash: format!("{number:064x}"),
            timestamp: 1_000 + number,
            data: String::new(),
            signature: "sig".into(),
            signer_public_key: "pk".into(),
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

    #[test]
    fn tx_sees_its_own_pending_tip() {
        let (_dir, store) = temp_store();
        store.insert_block_direct(&block(0)).unwrap();

        let mut tx = store.begin();
        for _ in 0..3 {
            let tip = tx.last_block().unwrap().unwrap().block_number;
            tx.insert_block(block(tip + 1)).unwrap();
        }
        tx.commit().unwrap();

        let numbers: Vec<i64> = store
            .blocks_page(0, 10)
            .unwrap()
            .iter()
            .map(|b| b.block_number)
            .collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
    }

    #[test]
    fn fresh_read_tip_inside_tx_reproduces_duplicate() {
        let (_dir, store) = temp_store();
        store.insert_block_direct(&block(0)).unwrap();

        // The bug this handle exists to prevent: reading the committed tip
        // for each of two inserts in the same transaction.
        let mut tx = store.begin();
        let tip = store.last_block().unwrap().unwrap().block_number;
        tx.insert_block(block(tip + 1)).unwrap();
        let stale_tip = store.last_block().unwrap().unwrap().block_number;
        let err = tx.insert_block(block(stale_tip + 1)).unwrap_err();
        assert!(matches!(err, SealError::DuplicateBlockNumber(1)));
    }

    #[test]
    fn uncommitted_tx_leaves_no_trace() {
        let (_dir, store) = temp_store();
        {
            let mut tx = store.begin();
            tx.insert_block(block(0)).unwrap();
            // Dropped without commit.
        }
        assert_eq!(store.block_count(), 0);
    }

    #[test]
    fn delete_above_removes_tail_and_moves_tip() {
        let (_dir, store) = temp_store();
        for n in 0..8 {
            store.insert_block_direct(&block(n)).unwrap();
        }

        let mut tx = store.begin();
        tx.delete_above(4);
        assert_eq!(tx.last_block().unwrap().unwrap().block_number, 4);
        // A number covered by the watermark is insertable again.
        tx.insert_block(block(5)).unwrap();
        tx.commit().unwrap();

        let numbers: Vec<i64> = store
            .blocks_page(0, 10)
            .unwrap()
            .iter()
            .map(|b| b.block_number)
            .collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn duplicate_against_committed_state_is_rejected() {
        let (_dir, store) = temp_store();
        store.insert_block_direct(&block(3)).unwrap();
        let mut tx = store.begin();
        let err = tx.insert_block(block(3)).unwrap_err();
        assert!(matches!(err, SealError::DuplicateBlockNumber(3)));
    }
}
