pub mod overlay;
pub mod page_classifier;
pub mod position_locator;
pub mod question_extractor;
pub mod record_writer;
pub mod recovery;
pub mod skip_writer;
pub mod validator;
pub mod viewport;

pub use overlay::OverlayService;
pub use page_classifier::{PageClassifier, PageKind};
pub use position_locator::PositionLocator;
pub use question_extractor::{FieldParser, QuestionExtractor};
pub use record_writer::{JsonRecordWriter, RecordSink};
pub use recovery::RecoveryController;
pub use skip_writer::SkipWriter;
pub use viewport::{Scope, ViewportResolver};
