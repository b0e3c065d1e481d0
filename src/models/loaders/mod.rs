pub mod json_loader;

pub use json_loader::{latest_document, load_all_documents, load_document};
