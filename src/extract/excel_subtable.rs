use tracing::{debug, info, warn};

use crate::config::{
    ADJACENT_COLUMN_SPAN, BLANK_ROW_RUN, COMPLETION_LOOKAHEAD, REFERENCE_SCAN_MAX_COLS,
    REFERENCE_SCAN_MAX_ROWS, SUBTABLE_HEADER_LOOKAHEAD,
};
use crate::error::{ReconError, Result};
use crate::extract::columns::{row_has_summary, ColumnMap, Field};
use crate::extract::grid::{Workbook, Worksheet};
use crate::extract::merge::{PendingMerger, RowFields};
use crate::extract::reference::{
    find_references, find_standard_references, is_reference_only, ReferenceVocabulary,
};
use crate::models::{ItemSource, LineItem, SubtableItem};
use crate::normalize::parse_quantity;

/// Excel側の副表 (明細書・単価表シート) から項目を抽出する
///
/// 2パス構成: まず本表シートから参照接頭文字の語彙を発見し、
/// 次に副シートを語彙に従って走査する。発見と抽出を1パスに
/// 融合しない (発見はドキュメント全体の視界を必要とする)。
pub struct ExcelSubtableExtractor;

impl Default for ExcelSubtableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelSubtableExtractor {
    pub fn new() -> Self {
        Self
    }

    /// パス1: 参照接頭文字の語彙発見
    ///
    /// 本表シートを走査し、見つからなければ副シート候補にフォールバックする。
    /// 走査は行・列とも上限付き (不正なドキュメントで際限なく伸びないように)。
    pub fn discover_vocabulary(
        &self,
        workbook: &Workbook,
        main_sheet: &str,
    ) -> Result<ReferenceVocabulary> {
        let sheet = workbook
            .sheet(main_sheet)
            .ok_or_else(|| ReconError::SheetNotFound {
                requested: main_sheet.to_string(),
                available: workbook.sheet_names(),
            })?;

        let mut vocab = ReferenceVocabulary::default();
        scan_prefixes(sheet, &mut vocab);

        if vocab.is_empty() {
            debug!("本表シートに参照コードが無いため副シートから語彙を探します");
            for s in workbook.sheets.iter().filter(|s| s.name != main_sheet) {
                scan_prefixes(s, &mut vocab);
            }
        }

        info!(
            "参照語彙発見: {}種 ({})",
            vocab.len(),
            vocab.iter().map(String::from).collect::<Vec<_>>().join(",")
        );
        Ok(vocab)
    }

    /// パス2: 副シートごとの抽出
    pub fn extract(
        &self,
        workbook: &Workbook,
        main_sheet: &str,
        vocab: &ReferenceVocabulary,
    ) -> Result<Vec<SubtableItem>> {
        if workbook.sheet(main_sheet).is_none() {
            return Err(ReconError::SheetNotFound {
                requested: main_sheet.to_string(),
                available: workbook.sheet_names(),
            });
        }

        let mut items = Vec::new();
        for sheet in workbook.sheets.iter().filter(|s| s.name != main_sheet) {
            let before = items.len();
            self.scan_sheet(sheet, vocab, &mut items);
            debug!("シート '{}': 副表項目 {}件", sheet.name, items.len() - before);
        }

        if items.is_empty() {
            warn!("Excel副表: 項目を抽出できませんでした");
        } else {
            info!("Excel副表抽出完了: {}件", items.len());
        }
        Ok(items)
    }

    fn scan_sheet(&self, sheet: &Worksheet, vocab: &ReferenceVocabulary, out: &mut Vec<SubtableItem>) {
        let nrows = sheet.num_rows();
        let mut r = 0;

        while r < nrows {
            let joined = sheet.row_values(r).join(" ");
            let Some(token) = find_references(&joined)
                .into_iter()
                .find(|t| vocab.is_empty() || vocab.contains(t.prefix))
            else {
                r += 1;
                continue;
            };

            // 参照の直後からヘッダーを探す
            let Some((header_row, cols)) = find_subtable_header(sheet, r) else {
                warn!(
                    "シート '{}' 行{}: 参照 {} の直後にヘッダーが見つかりません",
                    sheet.name,
                    r + 1,
                    token.display
                );
                r += 1;
                continue;
            };

            // データ行の消費: 連続空白{BLANK_ROW_RUN}行、次の参照、シート末尾で終了
            let template = LineItem::new("", ItemSource::Excel);
            let mut merger = PendingMerger::new(true, Some(COMPLETION_LOOKAHEAD));
            let mut blanks = 0usize;
            let mut rr = header_row + 1;
            while rr < nrows {
                if sheet.row_is_blank(rr) {
                    blanks += 1;
                    if blanks >= BLANK_ROW_RUN {
                        break;
                    }
                    rr += 1;
                    continue;
                }
                blanks = 0;

                let vals = sheet.row_values(rr);
                let hits_next_ref = find_references(&vals.join(" "))
                    .into_iter()
                    .any(|t| vocab.is_empty() || vocab.contains(t.prefix));
                if hits_next_ref {
                    break;
                }
                if row_has_summary(&vals) {
                    rr += 1;
                    continue;
                }
                // 行の内容が参照コードだけなら項目ではない (語彙外の参照への言及など)
                let non_blank: String = vals
                    .iter()
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("");
                if is_reference_only(&non_blank) {
                    debug!("シート '{}' 行{}: 参照コードのみの行を捨てます", sheet.name, rr + 1);
                    rr += 1;
                    continue;
                }
                merger.push(row_fields_with_shift(sheet, rr, &cols), &template);
                rr += 1;
            }

            for item in merger.finish() {
                if item.item_key.trim().is_empty() {
                    continue;
                }
                // 内容が参照コードだけの行は項目ではない
                if is_reference_only(&item.item_key) {
                    continue;
                }
                out.push(SubtableItem {
                    item,
                    reference_number: token.display.clone(),
                    sheet_name: Some(sheet.name.clone()),
                });
            }
            r = rr.max(r + 1);
        }
    }
}

fn scan_prefixes(sheet: &Worksheet, vocab: &mut ReferenceVocabulary) {
    let row_limit = sheet.num_rows().min(REFERENCE_SCAN_MAX_ROWS);
    for r in 0..row_limit {
        let Some(cells) = sheet.rows.get(r) else { continue };
        for cell in cells.iter().take(REFERENCE_SCAN_MAX_COLS) {
            // 語彙発見は標準形のみ (第付き形は本文の定型句と紛れやすい)
            for token in find_standard_references(&cell.value) {
                vocab.insert(token.prefix);
            }
        }
    }
}

/// 副表ヘッダーの成立条件: {名称/規格, 単位, 数量, 摘要} のうち2種類以上
fn subtable_header_ok(cols: &ColumnMap) -> bool {
    let mut hits = 0;
    if cols.contains(Field::Name) || cols.contains(Field::Spec) {
        hits += 1;
    }
    for f in [Field::Unit, Field::Quantity, Field::Remarks] {
        if cols.contains(f) {
            hits += 1;
        }
    }
    hits >= 2
}

fn find_subtable_header(sheet: &Worksheet, ref_row: usize) -> Option<(usize, ColumnMap)> {
    let nrows = sheet.num_rows();
    if nrows == 0 {
        return None;
    }
    let end = (ref_row + SUBTABLE_HEADER_LOOKAHEAD).min(nrows - 1);
    for j in ref_row + 1..=end {
        let cols = ColumnMap::from_header(&sheet.row_values(j));
        if subtable_header_ok(&cols) {
            return Some((j, cols));
        }
    }
    None
}

/// セル結合による列ずれを許容して1行からフィールドを取り出す
///
/// 対応列が空のときだけ、右隣1〜{ADJACENT_COLUMN_SPAN}列を探す。
/// 他のフィールドに割り当て済みの列は探索から除外する。
fn row_fields_with_shift(sheet: &Worksheet, row: usize, cols: &ColumnMap) -> RowFields {
    let mapped: Vec<usize> = cols.iter().map(|(_, r)| r.index).collect();
    let shifted = |field: Field, accept: &dyn Fn(&str) -> bool| -> Option<String> {
        let base = cols.index_of(field)?;
        let primary = sheet.value(row, base).trim();
        if accept(primary) {
            return Some(primary.to_string());
        }
        for c in base + 1..=base + ADJACENT_COLUMN_SPAN {
            if mapped.contains(&c) && cols.index_of(field) != Some(c) {
                continue;
            }
            let v = sheet.value(row, c).trim();
            if accept(v) {
                return Some(v.to_string());
            }
        }
        None
    };

    let name = shifted(Field::Name, &|v: &str| !v.is_empty() && parse_quantity(v).is_none())
        .or_else(|| shifted(Field::Spec, &|v: &str| !v.is_empty() && parse_quantity(v).is_none()))
        .unwrap_or_default();
    let quantity = shifted(Field::Quantity, &|v: &str| parse_quantity(v).is_some())
        .and_then(|v| parse_quantity(&v));
    let unit = shifted(Field::Unit, &|v: &str| {
        !v.is_empty() && parse_quantity(v).is_none()
    });

    let mut fields = RowFields {
        name,
        quantity,
        unit,
        ..RowFields::default()
    };
    for (_, colref) in cols.iter() {
        let v = sheet.value(row, colref.index).trim();
        if !v.is_empty() {
            fields.raw_fields.insert(colref.header.clone(), v.to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::grid::Cell;

    fn cell(v: &str) -> Cell {
        Cell::text(v)
    }

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|s| cell(s)).collect()
    }

    fn main_sheet() -> Worksheet {
        Worksheet {
            name: "本工事内訳書".to_string(),
            rows: vec![
                row(&["名称", "数量", "単位", "摘要"]),
                row(&["掘削工", "10", "m3", "単1号"]),
                row(&["embankment", "5", "m3", "明2号"]),
            ],
        }
    }

    fn workbook(sub_sheets: Vec<Worksheet>) -> Workbook {
        let mut sheets = vec![main_sheet()];
        sheets.extend(sub_sheets);
        Workbook { sheets }
    }

    #[test]
    fn vocabulary_discovery_collects_used_prefixes() {
        let wb = workbook(vec![]);
        let vocab = ExcelSubtableExtractor::new()
            .discover_vocabulary(&wb, "本工事内訳書")
            .unwrap();
        assert!(vocab.contains('単'));
        assert!(vocab.contains('明'));
        assert!(!vocab.contains('内'));
    }

    #[test]
    fn vocabulary_ignores_form_labels() {
        let wb = Workbook {
            sheets: vec![
                Worksheet {
                    name: "本工事内訳書".to_string(),
                    rows: vec![
                        row(&["第1号様式", "", "", ""]),
                        row(&["名称", "数量", "単位", "摘要"]),
                        row(&["土工", "1", "m3", ""]),
                    ],
                },
                Worksheet {
                    name: "明細書".to_string(),
                    rows: vec![row(&["単3号"])],
                },
            ],
        };
        let vocab = ExcelSubtableExtractor::new()
            .discover_vocabulary(&wb, "本工事内訳書")
            .unwrap();
        assert!(!vocab.contains('様'));
        assert!(vocab.contains('単'));
    }

    #[test]
    fn vocabulary_falls_back_to_secondary_sheets() {
        let wb = Workbook {
            sheets: vec![
                Worksheet {
                    name: "本工事内訳書".to_string(),
                    rows: vec![row(&["名称", "数量"]), row(&["土工", "1"])],
                },
                Worksheet {
                    name: "明細書".to_string(),
                    rows: vec![row(&["単3号"])],
                },
            ],
        };
        let vocab = ExcelSubtableExtractor::new()
            .discover_vocabulary(&wb, "本工事内訳書")
            .unwrap();
        assert!(vocab.contains('単'));
    }

    #[test]
    fn extracts_per_reference_items() {
        let sub = Worksheet {
            name: "単価表".to_string(),
            rows: vec![
                row(&["単1号", "", "", ""]),
                row(&["名称", "数量", "単位", "摘要"]),
                row(&["砕石", "5", "m3", ""]),
                row(&["敷均し", "", "", ""]),
                row(&["", "100", "m2", ""]),
                row(&["", "", "", ""]),
                row(&["", "", "", ""]),
                row(&["", "", "", ""]),
                row(&["この行は3連続空白の後なので読まれない", "9", "m", ""]),
            ],
        };
        let wb = workbook(vec![sub]);
        let extractor = ExcelSubtableExtractor::new();
        let vocab = extractor.discover_vocabulary(&wb, "本工事内訳書").unwrap();
        let items = extractor.extract(&wb, "本工事内訳書", &vocab).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|s| s.reference_number == "単1号"));
        assert!(items.iter().all(|s| s.sheet_name.as_deref() == Some("単価表")));
        assert_eq!(items[1].item.item_key, "敷均し");
        assert_eq!(items[1].item.quantity, 100.0);
    }

    #[test]
    fn adjacent_column_shift_is_tolerated() {
        // セル結合の影響で数量が対応列の1つ右にずれているケース
        let sub = Worksheet {
            name: "明細書".to_string(),
            rows: vec![
                row(&["明2号", "", "", "", ""]),
                row(&["名称", "数量", "", "単位", ""]),
                row(&["基面整正", "", "250", "", "m2"]),
            ],
        };
        let wb = workbook(vec![sub]);
        let extractor = ExcelSubtableExtractor::new();
        let vocab = extractor.discover_vocabulary(&wb, "本工事内訳書").unwrap();
        let items = extractor.extract(&wb, "本工事内訳書", &vocab).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.quantity, 250.0);
        assert_eq!(items[0].item.unit.as_deref(), Some("m2"));
    }

    #[test]
    fn reference_only_rows_are_discarded() {
        let sub = Worksheet {
            name: "単価表".to_string(),
            rows: vec![
                row(&["単1号", "", ""]),
                row(&["名称", "数量", "単位"]),
                row(&["内9号", "", ""]),
                row(&["生コン", "2", "m3"]),
            ],
        };
        let wb = workbook(vec![sub]);
        let extractor = ExcelSubtableExtractor::new();
        let vocab = extractor.discover_vocabulary(&wb, "本工事内訳書").unwrap();
        let items = extractor.extract(&wb, "本工事内訳書", &vocab).unwrap();
        // 語彙外の参照コードだけの行は項目にならない
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.item_key, "生コン");
    }

    #[test]
    fn missing_main_sheet_is_an_error() {
        let wb = workbook(vec![]);
        let err = ExcelSubtableExtractor::new()
            .discover_vocabulary(&wb, "無いシート")
            .unwrap_err();
        assert!(matches!(err, ReconError::SheetNotFound { .. }));
    }
}
