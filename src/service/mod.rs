pub mod cache;
pub mod extraction;
pub mod matcher;

pub use cache::{CacheStats, ExtractionCache};
pub use extraction::{ExtractionParams, ExtractionService};
pub use matcher::Matcher;
