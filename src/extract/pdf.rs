use tracing::{debug, info, warn};

use crate::config::{COMPLETION_LOOKAHEAD, HEADER_SCAN_ROWS, SUBTABLE_HEADER_LOOKAHEAD};
use crate::error::{ReconError, Result};
use crate::extract::columns::{find_header_row, row_has_summary, ColumnMap, Field};
use crate::extract::grid::GridDocument;
use crate::extract::merge::{PendingMerger, RowFields};
use crate::extract::reference::{
    find_references, is_malformed_reference, is_reference_only, ReferenceToken,
    ReferenceVocabulary,
};
use crate::models::{ItemSource, LineItem, SubtableItem};
use crate::normalize::parse_quantity;

/// PDF側 (発注者内訳書) の表グリッドから項目を抽出する
pub struct PdfTableExtractor;

impl Default for PdfTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfTableExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 本表の抽出。ページ範囲内の全表を走査し、単一ペンディング枠で行またぎを結合する
    pub fn extract_main_table(
        &self,
        doc: &GridDocument,
        start_page: u32,
        end_page: u32,
    ) -> Result<Vec<LineItem>> {
        validate_range(start_page, end_page)?;
        if doc.pages.is_empty() {
            return Err(ReconError::DocumentUnreadable(
                "ページが1件もありません".to_string(),
            ));
        }

        let mut items = Vec::new();
        for page in doc.pages_in_range(start_page, end_page) {
            for (t_idx, table) in page.tables.iter().enumerate() {
                let Some(h) = find_header_row(&table.rows, HEADER_SCAN_ROWS) else {
                    warn!(
                        "ページ{} 表{}: ヘッダー行が見つからないため表を読み飛ばします",
                        page.page_number,
                        t_idx + 1
                    );
                    continue;
                };
                let cols = ColumnMap::from_header(&table.rows[h]);
                let mut template = LineItem::new("", ItemSource::Pdf);
                template.page_number = Some(page.page_number);

                let mut merger = PendingMerger::new(false, None);
                for row in &table.rows[h + 1..] {
                    if let Some(remarks) = cols.index_of(Field::Remarks).and_then(|i| row.get(i)) {
                        if is_malformed_reference(remarks, None) {
                            warn!(
                                "ページ{}: 数字の欠けた参照コード '{}' を含む行を読み飛ばします",
                                page.page_number, remarks
                            );
                            continue;
                        }
                    }
                    merger.push(extract_row_fields(row, &cols), &template);
                }
                items.extend(merger.finish());
            }
        }

        if items.is_empty() {
            return Err(ReconError::NoExtractableItems(format!(
                "PDF本表 (ページ{}〜{})",
                start_page, end_page
            )));
        }
        info!(
            "PDF本表抽出完了: {}件 (ページ{}〜{})",
            items.len(),
            start_page,
            end_page
        );
        Ok(items)
    }

    /// 副表の抽出。参照コードを起点に窓を切り、窓内の行を結合する
    ///
    /// 既知の参照語彙が渡された場合、語彙にない接頭文字の出現は窓の起点にしない。
    pub fn extract_subtables(
        &self,
        doc: &GridDocument,
        start_page: u32,
        end_page: u32,
        vocab: Option<&ReferenceVocabulary>,
    ) -> Result<Vec<SubtableItem>> {
        validate_range(start_page, end_page)?;
        if doc.pages.is_empty() {
            return Err(ReconError::DocumentUnreadable(
                "ページが1件もありません".to_string(),
            ));
        }

        let mut items = Vec::new();
        for page in doc.pages_in_range(start_page, end_page) {
            for table in &page.tables {
                self.scan_subtable_grid(&table.rows, page.page_number, vocab, &mut items);
            }
        }

        if items.is_empty() {
            warn!("PDF副表: ページ{}〜{} から項目を抽出できませんでした", start_page, end_page);
        } else {
            info!(
                "PDF副表抽出完了: {}件 (ページ{}〜{})",
                items.len(),
                start_page,
                end_page
            );
        }
        Ok(items)
    }

    fn scan_subtable_grid(
        &self,
        rows: &[Vec<String>],
        page_number: u32,
        vocab: Option<&ReferenceVocabulary>,
        out: &mut Vec<SubtableItem>,
    ) {
        let mut window: Option<SubtableWindow> = None;
        let mut i = 0;

        while i < rows.len() {
            let row = &rows[i];
            let joined = row.join(" ");

            if let Some(cell) = row.iter().find(|c| !c.trim().is_empty()) {
                if is_malformed_reference(cell, vocab) {
                    warn!(
                        "ページ{}: 数字の欠けた参照コード '{}' を含む行を読み飛ばします",
                        page_number, cell
                    );
                    i += 1;
                    continue;
                }
            }

            // 次の参照コード = 現在の窓の終端 + 新しい窓の起点
            let next_ref = find_references(&joined)
                .into_iter()
                .find(|t| vocab.map_or(true, |v| v.contains(t.prefix)));
            if let Some(token) = next_ref {
                close_window(window.take(), out);

                match self.find_subtable_header(rows, i) {
                    Some((header_row, cols)) => {
                        debug!(
                            "ページ{}: 参照 {} の副表を行{}から読み取ります",
                            page_number, token.display, header_row + 1
                        );
                        window = Some(SubtableWindow::new(token, cols, page_number));
                        i = header_row + 1;
                        continue;
                    }
                    None => {
                        warn!(
                            "ページ{}: 参照 {} の直後にヘッダーが見つかりません",
                            page_number, token.display
                        );
                        i += 1;
                        continue;
                    }
                }
            }

            if let Some(w) = window.as_mut() {
                if row_has_summary(row) {
                    // 合計/小計/総計 = 窓の明示的な終端
                    close_window(window.take(), out);
                } else {
                    let fields = extract_row_fields(row, &w.cols);
                    w.merger.push(fields, &w.template);
                }
            }
            i += 1;
        }

        close_window(window.take(), out);
    }

    /// 参照コード行の直後、限られた先読み範囲からヘッダー行を探す
    fn find_subtable_header(
        &self,
        rows: &[Vec<String>],
        ref_row: usize,
    ) -> Option<(usize, ColumnMap)> {
        let end = (ref_row + SUBTABLE_HEADER_LOOKAHEAD).min(rows.len().saturating_sub(1));
        for j in ref_row + 1..=end {
            let cols = ColumnMap::from_header(&rows[j]);
            if subtable_header_ok(&cols) {
                return Some((j, cols));
            }
        }
        None
    }
}

/// 副表ヘッダーの成立条件: {名称/規格, 単位, 数量} のうち2種類以上
fn subtable_header_ok(cols: &ColumnMap) -> bool {
    let mut hits = 0;
    if cols.contains(Field::Name) || cols.contains(Field::Spec) {
        hits += 1;
    }
    if cols.contains(Field::Unit) {
        hits += 1;
    }
    if cols.contains(Field::Quantity) {
        hits += 1;
    }
    hits >= 2
}

/// 進行中の参照窓 (参照コード + 列対応 + 結合器)
struct SubtableWindow {
    token: ReferenceToken,
    cols: ColumnMap,
    merger: PendingMerger,
    template: LineItem,
}

impl SubtableWindow {
    fn new(token: ReferenceToken, cols: ColumnMap, page_number: u32) -> Self {
        let mut template = LineItem::new("", ItemSource::Pdf);
        template.page_number = Some(page_number);
        Self {
            token,
            cols,
            merger: PendingMerger::new(true, Some(COMPLETION_LOOKAHEAD)),
            template,
        }
    }
}

fn close_window(window: Option<SubtableWindow>, out: &mut Vec<SubtableItem>) {
    let Some(w) = window else {
        return;
    };
    let reference = w.token.display.clone();
    for item in w.merger.finish() {
        if item.item_key.trim().is_empty() {
            continue;
        }
        // 内容が参照コードだけの行は項目ではない
        if is_reference_only(&item.item_key) {
            continue;
        }
        out.push(SubtableItem {
            item,
            reference_number: reference.clone(),
            sheet_name: None,
        });
    }
}

/// 列対応に従って1行からフィールドを取り出す
fn extract_row_fields(row: &[String], cols: &ColumnMap) -> RowFields {
    let cell = |f: Field| -> &str {
        cols.index_of(f)
            .and_then(|i| row.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    };

    let mut name_parts: Vec<&str> = Vec::new();
    for f in [Field::Name, Field::Spec] {
        let v = cell(f);
        if !v.is_empty() {
            name_parts.push(v);
        }
    }
    // 名称・規格が空なら費目/工種、それも空なら摘要を識別情報として使う
    if name_parts.is_empty() {
        for f in [Field::Classification, Field::Remarks] {
            let v = cell(f);
            if !v.is_empty() {
                name_parts.push(v);
                break;
            }
        }
    }

    let mut fields = RowFields {
        name: name_parts.join(" "),
        quantity: parse_quantity(cell(Field::Quantity)),
        unit: match cell(Field::Unit) {
            "" => None,
            u => Some(u.to_string()),
        },
        ..RowFields::default()
    };
    for (_, colref) in cols.iter() {
        if let Some(v) = row.get(colref.index) {
            if !v.trim().is_empty() {
                fields
                    .raw_fields
                    .insert(colref.header.clone(), v.trim().to_string());
            }
        }
    }
    fields
}

fn validate_range(start: u32, end: u32) -> Result<()> {
    if start == 0 || start > end {
        return Err(ReconError::InvalidPageRange { start, end });
    }
    Ok(())
}
