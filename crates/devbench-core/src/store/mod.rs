pub mod document_store;
pub mod legacy;
pub mod migration;

pub use document_store::{DocumentStore, StoreError, StoreStats};
pub use legacy::{FlatShape, LegacyApp, LEGACY_APPS};
pub use migration::MigrationReport;
