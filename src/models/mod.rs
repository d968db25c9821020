pub mod comparison;
pub mod item;

pub use comparison::{
    ComparisonResult, ComparisonStatus, ComparisonSummary, NameMismatchDetail, TableKind,
};
pub use item::{ExtractionBundle, HasItemKey, ItemSource, LineItem, SubtableItem};
