pub mod loaders;
pub mod position;
pub mod question;
pub mod selectors;

pub use loaders::{latest_document, load_all_documents, load_document};
pub use position::PagePosition;
pub use question::{MultiPartQuestion, QuestionDocument, QuestionRecord, SingleQuestion, SubPart};
pub use selectors::Selectors;
