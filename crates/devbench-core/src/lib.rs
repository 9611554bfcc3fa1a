pub mod config;
pub mod constants;
pub mod models;
pub mod session;
pub mod store;
pub mod substrate;
pub mod tracing_setup;

pub use config::{CoreConfig, StorageBackend};
pub use models::{DocUpdate, Document, NewDoc};
pub use session::{DocumentSession, SessionOptions};
pub use store::{DocumentStore, MigrationReport, StoreError, StoreStats};
pub use substrate::{KeyValueStore, StorageMedium};
