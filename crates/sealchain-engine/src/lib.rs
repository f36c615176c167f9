//! sealchain-engine: the public facade of the ledger.
//!
//! One [`Ledger`] value owns the catalog, the off-chain store, the key
//! registry, and the process-wide writer lock. Every mutating operation
//! (append, metadata update, registry mutation, rollback, import, clear)
//! serializes on that lock; reads and validation never take it.

pub mod engine;
pub mod sizing;

pub use engine::{authorized_deletion_message, AdminMandate, AppendOptions, Ledger, LedgerConfig};
pub use sizing::{validate_and_determine_storage, StorageDisposition};

pub use sealchain_archive::{ExportMetadata, ImportSummary};
pub use sealchain_catalog::{DatabaseConfig, Dialect, SchemaMode};
pub use sealchain_core::{
    AuditRecord, AuthorizedKey, Block, BlockNumber, KeyRole, OffChainData, SealError, Timestamp,
};
pub use sealchain_crypto::SignerKeyPair;
pub use sealchain_offchain::{CleanupOptions, CleanupReport};
pub use sealchain_registry::KeyDeletionImpact;
pub use sealchain_validate::{ChainValidationResult, ValidationOptions};
