pub mod config;
pub mod store;
pub mod tx;

pub use config::{DatabaseConfig, Dialect, SchemaMode};
pub use store::CatalogStore;
pub use tx::CatalogTx;
