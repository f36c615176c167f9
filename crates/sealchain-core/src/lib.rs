pub mod audit;
pub mod block;
pub mod constants;
pub mod error;
pub mod fields;
pub mod keys;
pub mod offchain;

pub use audit::AuditRecord;
pub use block::{Block, BlockBody, BlockNumber, Timestamp};
pub use constants::*;
pub use error::SealError;
pub use fields::require_max_chars;
pub use keys::{key_fingerprint, AuthorizedKey, KeyRole};
pub use offchain::OffChainData;
