use tracing::{info, warn};

use crate::config::{EXPECTED_LOGICAL_ROWS, HEADER_SCAN_ROWS};
use crate::error::{ReconError, Result};
use crate::extract::columns::{find_header_row, ColumnMap, Field};
use crate::extract::grid::{
    has_dotted_signal, BlankRunSegmenter, BorderSegmenter, LogicalRow, RowSegmenter, Workbook,
    Worksheet,
};
use crate::extract::merge::{PendingMerger, RowFields};
use crate::models::{ItemSource, LineItem};
use crate::normalize::parse_quantity;

/// Excel側 (受注者見積書) の本工事内訳書シートから項目を抽出する
///
/// 論理行の境界は点線罫線で引かれるのが標準様式。罫線シグナルの無いシートは
/// 空白行主導のフォールバックに切り替える。
pub struct ExcelMainTableExtractor;

impl Default for ExcelMainTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelMainTableExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, workbook: &Workbook, sheet_name: &str) -> Result<Vec<LineItem>> {
        let sheet = workbook
            .sheet(sheet_name)
            .ok_or_else(|| ReconError::SheetNotFound {
                requested: sheet_name.to_string(),
                available: workbook.sheet_names(),
            })?;

        let all_values: Vec<Vec<String>> = (0..sheet.num_rows())
            .map(|r| sheet.row_values(r))
            .collect();
        let Some(header_idx) = find_header_row(&all_values, HEADER_SCAN_ROWS) else {
            warn!("シート '{}': ヘッダー行が見つかりません", sheet_name);
            return Err(ReconError::NoExtractableItems(format!(
                "Excel本表 (シート '{}')",
                sheet_name
            )));
        };

        let header = &all_values[header_idx];
        let cols = ColumnMap::from_header(header);
        // 列1〜5のヘッダー空白セルは無銘の階層名称サブ列として扱う
        let hierarchy: Vec<usize> = (0..5.min(header.len()))
            .filter(|&i| header[i].is_empty())
            .collect();

        let data_start = header_idx + 1;
        let Some(data_end) = last_content_row(sheet, data_start) else {
            return Err(ReconError::NoExtractableItems(format!(
                "Excel本表 (シート '{}')",
                sheet_name
            )));
        };

        let mut logical = if has_dotted_signal(sheet, data_start, data_end) {
            info!("シート '{}': 罫線主導で論理行を分割します", sheet_name);
            BorderSegmenter.segment(sheet, data_start, data_end)
        } else {
            info!(
                "シート '{}': 罫線シグナルが無いため空白行主導に切り替えます",
                sheet_name
            );
            BlankRunSegmenter.segment(sheet, data_start, data_end)
        };

        // 標準様式は15論理行。14行しか取れない場合は最終行に2項目が埋まっていないか調べる
        if logical.len() == EXPECTED_LOGICAL_ROWS - 1 {
            if let Some(last) = logical.last().copied() {
                if let Some((first, second)) = self.try_split_last(sheet, &cols, last) {
                    info!(
                        "シート '{}': 最終論理行を2項目に分割します (行{}〜{} / {}〜{})",
                        sheet_name,
                        first.start + 1,
                        first.end + 1,
                        second.start + 1,
                        second.end + 1
                    );
                    logical.pop();
                    logical.push(first);
                    logical.push(second);
                }
            }
        }

        let template = LineItem::new("", ItemSource::Excel);
        let mut merger = PendingMerger::new(true, Some(1));
        for span in &logical {
            merger.push(assemble_row_fields(sheet, *span, &cols, &hierarchy), &template);
        }

        let mut items = merger.finish();
        for (idx, item) in items.iter_mut().enumerate() {
            item.logical_line_number = Some(idx as u32 + 1);
            item.table_number = Some(1);
        }

        if items.is_empty() {
            return Err(ReconError::NoExtractableItems(format!(
                "Excel本表 (シート '{}')",
                sheet_name
            )));
        }
        info!(
            "Excel本表抽出完了: {}件 (シート '{}', 論理行{})",
            items.len(),
            sheet_name,
            logical.len()
        );
        Ok(items)
    }

    /// 最終論理行に埋まった2項目目を探す
    ///
    /// 分割点の根拠: 区間2行目以降に数量データが現れる、または「消費税額」系の
    /// 見出しが現れる。
    fn try_split_last(
        &self,
        sheet: &Worksheet,
        cols: &ColumnMap,
        last: LogicalRow,
    ) -> Option<(LogicalRow, LogicalRow)> {
        if last.end <= last.start {
            return None;
        }
        for r in last.start + 1..=last.end {
            let qty_here = cols
                .index_of(Field::Quantity)
                .map(|c| parse_quantity(sheet.value(r, c)).is_some())
                .unwrap_or(false);
            let tax_marker = sheet.row_values(r).iter().any(|v| v.contains("消費税"));
            if qty_here || tax_marker {
                return Some((
                    LogicalRow {
                        start: last.start,
                        end: r - 1,
                    },
                    LogicalRow { start: r, end: last.end },
                ));
            }
        }
        None
    }
}

/// 論理行の区間から列ごとに内容を空白連結してフィールドを組み立てる
fn assemble_row_fields(
    sheet: &Worksheet,
    span: LogicalRow,
    cols: &ColumnMap,
    hierarchy: &[usize],
) -> RowFields {
    let join_col = |c: usize| -> String {
        let mut parts = Vec::new();
        for r in span.start..=span.end {
            let v = sheet.value(r, c).trim();
            if !v.is_empty() {
                parts.push(v.to_string());
            }
        }
        parts.join(" ")
    };

    // 名称 = 階層サブ列 + 名称列 + 規格列
    let mut name_parts = Vec::new();
    for &c in hierarchy {
        let v = join_col(c);
        if !v.is_empty() {
            name_parts.push(v);
        }
    }
    for f in [Field::Name, Field::Spec] {
        if let Some(c) = cols.index_of(f) {
            let v = join_col(c);
            if !v.is_empty() {
                name_parts.push(v);
            }
        }
    }
    if name_parts.is_empty() {
        if let Some(c) = cols.index_of(Field::Classification) {
            let v = join_col(c);
            if !v.is_empty() {
                name_parts.push(v);
            }
        }
    }

    let quantity = cols.index_of(Field::Quantity).and_then(|c| {
        (span.start..=span.end).find_map(|r| parse_quantity(sheet.value(r, c)))
    });
    let unit = cols.index_of(Field::Unit).and_then(|c| {
        (span.start..=span.end).find_map(|r| {
            let v = sheet.value(r, c).trim();
            if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            }
        })
    });

    let mut fields = RowFields {
        name: name_parts.join(" "),
        quantity,
        unit,
        ..RowFields::default()
    };
    for (_, colref) in cols.iter() {
        let v = join_col(colref.index);
        if !v.is_empty() {
            fields.raw_fields.insert(colref.header.clone(), v);
        }
    }
    fields
}

fn last_content_row(sheet: &Worksheet, from: usize) -> Option<usize> {
    (from..sheet.num_rows()).rev().find(|&r| !sheet.row_is_blank(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::grid::{BorderStyle, Cell};

    fn cell(v: &str) -> Cell {
        Cell::text(v)
    }

    fn cell_b(v: &str, bottom: BorderStyle) -> Cell {
        Cell {
            value: v.to_string(),
            border_top: BorderStyle::None,
            border_bottom: bottom,
        }
    }

    fn workbook(rows: Vec<Vec<Cell>>) -> Workbook {
        Workbook {
            sheets: vec![Worksheet {
                name: "本工事内訳書".to_string(),
                rows,
            }],
        }
    }

    fn header_row() -> Vec<Cell> {
        vec![cell("費目"), cell(""), cell("名称"), cell("数量"), cell("単位")]
    }

    #[test]
    fn missing_sheet_reports_available_names() {
        let wb = workbook(vec![header_row()]);
        let err = ExcelMainTableExtractor::new()
            .extract(&wb, "存在しないシート")
            .unwrap_err();
        match err {
            ReconError::SheetNotFound { requested, available } => {
                assert_eq!(requested, "存在しないシート");
                assert_eq!(available, vec!["本工事内訳書".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn border_driven_logical_rows_join_physical_rows() {
        let wb = workbook(vec![
            header_row(),
            vec![cell("直接工事費"), cell(""), cell("アスファルト"), cell(""), cell("")],
            vec![
                cell_b("", BorderStyle::Hair),
                cell_b("", BorderStyle::Hair),
                cell_b("舗装工", BorderStyle::Hair),
                cell_b("100", BorderStyle::Hair),
                cell_b("m2", BorderStyle::Hair),
            ],
            vec![
                cell_b("", BorderStyle::Thin),
                cell_b("", BorderStyle::Thin),
                cell_b("路盤工", BorderStyle::Thin),
                cell_b("50", BorderStyle::Thin),
                cell_b("m2", BorderStyle::Thin),
            ],
        ]);
        let items = ExcelMainTableExtractor::new()
            .extract(&wb, "本工事内訳書")
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_key, "アスファルト 舗装工");
        assert_eq!(items[0].quantity, 100.0);
        assert_eq!(items[0].logical_line_number, Some(1));
        assert_eq!(items[1].item_key, "路盤工");
        assert_eq!(items[1].quantity, 50.0);
    }

    #[test]
    fn blank_header_subcolumn_feeds_hierarchical_name() {
        let wb = workbook(vec![
            header_row(),
            vec![
                cell_b("土木工事", BorderStyle::Hair),
                cell_b("基礎工", BorderStyle::Hair),
                cell_b("均しコンクリート", BorderStyle::Hair),
                cell_b("3", BorderStyle::Hair),
                cell_b("m3", BorderStyle::Hair),
            ],
        ]);
        let items = ExcelMainTableExtractor::new()
            .extract(&wb, "本工事内訳書")
            .unwrap();
        assert_eq!(items.len(), 1);
        // 階層サブ列 (ヘッダー空白の列1) の内容が名称の先頭に入る
        assert_eq!(items[0].item_key, "基礎工 均しコンクリート");
    }

    #[test]
    fn fourteen_rows_split_into_fifteen_on_tax_marker() {
        let mut rows = vec![header_row()];
        for i in 0..13 {
            rows.push(vec![
                cell_b("", BorderStyle::Hair),
                cell_b("", BorderStyle::Hair),
                cell_b(&format!("工種{}", i + 1), BorderStyle::Hair),
                cell_b("1", BorderStyle::Hair),
                cell_b("式", BorderStyle::Hair),
            ]);
        }
        // 14番目の論理行に「工事価格」と「消費税額」の2項目が埋まっている
        rows.push(vec![cell(""), cell(""), cell("工事価格"), cell("1"), cell("式")]);
        rows.push(vec![
            cell_b("", BorderStyle::Thin),
            cell_b("", BorderStyle::Thin),
            cell_b("消費税額及び地方消費税額", BorderStyle::Thin),
            cell_b("1", BorderStyle::Thin),
            cell_b("式", BorderStyle::Thin),
        ]);
        let wb = workbook(rows);
        let items = ExcelMainTableExtractor::new()
            .extract(&wb, "本工事内訳書")
            .unwrap();
        assert_eq!(items.len(), EXPECTED_LOGICAL_ROWS);
        assert_eq!(items[13].item_key, "工事価格");
        assert_eq!(items[14].item_key, "消費税額及び地方消費税額");
    }

    #[test]
    fn borderless_sheet_falls_back_to_blank_runs() {
        let wb = workbook(vec![
            header_row(),
            vec![cell(""), cell(""), cell("土工"), cell("10"), cell("m3")],
            vec![cell(""), cell(""), cell(""), cell(""), cell("")],
            vec![cell(""), cell(""), cell(""), cell(""), cell("")],
            vec![cell(""), cell(""), cell("基礎工"), cell("5"), cell("m3")],
        ]);
        let items = ExcelMainTableExtractor::new()
            .extract(&wb, "本工事内訳書")
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_key, "土工");
        assert_eq!(items[1].item_key, "基礎工");
    }
}
