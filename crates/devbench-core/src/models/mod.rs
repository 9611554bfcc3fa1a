pub mod document;
pub mod store_state;

pub use document::{generate_doc_id, DocUpdate, Document, NewDoc};
pub use store_state::{AppIndex, StoreState};
