use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::extract::{
    ExcelMainTableExtractor, ExcelSubtableExtractor, GridDocument, PdfTableExtractor, Workbook,
};
use crate::models::ExtractionBundle;

/// 抽出のページ範囲・シート指定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub main_page_start: u32,
    pub main_page_end: u32,
    pub subtable_page_start: u32,
    pub subtable_page_end: u32,
    pub main_sheet: String,
}

/// 4系統の抽出をまとめて実行するサービス
pub struct ExtractionService {
    pdf: PdfTableExtractor,
    excel_main: ExcelMainTableExtractor,
    excel_subtable: ExcelSubtableExtractor,
}

impl Default for ExtractionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionService {
    pub fn new() -> Self {
        Self {
            pdf: PdfTableExtractor::new(),
            excel_main: ExcelMainTableExtractor::new(),
            excel_subtable: ExcelSubtableExtractor::new(),
        }
    }

    /// PDF本表・PDF副表・Excel本表・Excel副表を一括抽出する
    ///
    /// 参照語彙の発見を先に行い、PDF側の副表走査にも同じ語彙を渡す。
    pub fn extract_all(
        &self,
        document: &GridDocument,
        workbook: &Workbook,
        params: &ExtractionParams,
    ) -> Result<ExtractionBundle> {
        let vocab = self
            .excel_subtable
            .discover_vocabulary(workbook, &params.main_sheet)?;

        let pdf_items =
            self.pdf
                .extract_main_table(document, params.main_page_start, params.main_page_end)?;
        let pdf_subtables = self.pdf.extract_subtables(
            document,
            params.subtable_page_start,
            params.subtable_page_end,
            if vocab.is_empty() { None } else { Some(&vocab) },
        )?;

        let excel_items = self.excel_main.extract(workbook, &params.main_sheet)?;
        let excel_subtables =
            self.excel_subtable
                .extract(workbook, &params.main_sheet, &vocab)?;

        info!(
            "抽出一式完了: PDF {}件+副表{}件 / Excel {}件+副表{}件",
            pdf_items.len(),
            pdf_subtables.len(),
            excel_items.len(),
            excel_subtables.len()
        );
        Ok(ExtractionBundle {
            pdf_items,
            excel_items,
            pdf_subtables,
            excel_subtables,
        })
    }
}
