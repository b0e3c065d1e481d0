pub mod crawl_ctx;
pub mod crawl_flow;

pub use crawl_ctx::{CrawlState, SavedRecord};
pub use crawl_flow::{CrawlFlow, CrawlSummary, FinishReason, NavState};
