pub mod cleanup;
pub mod filename;
pub mod store;

pub use cleanup::{cleanup_orphans, CleanupOptions, CleanupReport};
pub use filename::offchain_file_stem;
pub use store::{OffChainStore, StoredFile};
