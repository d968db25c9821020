pub mod columns;
pub mod excel_main;
pub mod excel_subtable;
pub mod grid;
pub(crate) mod merge;
pub mod pdf;
pub mod reference;

pub use columns::{ColumnMap, Field};
pub use excel_main::ExcelMainTableExtractor;
pub use excel_subtable::ExcelSubtableExtractor;
pub use grid::{
    BlankRunSegmenter, BorderSegmenter, BorderStyle, Cell, GridDocument, GridPage, GridTable,
    LogicalRow, RowSegmenter, Workbook, Worksheet,
};
pub use pdf::PdfTableExtractor;
pub use reference::{canonical_reference_key, ReferenceToken, ReferenceVocabulary};
