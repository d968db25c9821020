use serde::{Deserialize, Serialize};

use crate::config::BLANK_CONFIRM_LOOKAHEAD;
use crate::extract::columns::{header_score, row_has_summary, HEADER_MIN_HITS};

/// 外部のPDFデジタイザが生成する、ページ単位の罫線表グリッド
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDocument {
    pub pages: Vec<GridPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPage {
    pub page_number: u32,
    pub tables: Vec<GridTable>,
}

/// 1つの罫線表 = セル文字列の2次元グリッド
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridTable {
    pub rows: Vec<Vec<String>>,
}

impl GridDocument {
    /// ページ範囲 [start, end] に含まれるページ (両端含む)
    pub fn pages_in_range(&self, start: u32, end: u32) -> impl Iterator<Item = &GridPage> {
        self.pages
            .iter()
            .filter(move |p| p.page_number >= start && p.page_number <= end)
    }
}

/// セル罫線のスタイル (xlsxのborder style名に対応)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Double,
    Hair,
    Dotted,
    Dashed,
    DashDot,
    DashDotDot,
}

impl BorderStyle {
    /// 実線系 = 表の外枠・終端
    pub fn is_solid(self) -> bool {
        matches!(
            self,
            BorderStyle::Thin | BorderStyle::Medium | BorderStyle::Thick | BorderStyle::Double
        )
    }

    /// 点線系 = 論理行の区切り
    pub fn is_dotted(self) -> bool {
        matches!(
            self,
            BorderStyle::Hair
                | BorderStyle::Dotted
                | BorderStyle::Dashed
                | BorderStyle::DashDot
                | BorderStyle::DashDotDot
        )
    }
}

/// ワークシートの1セル (値 + 上下罫線)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub border_top: BorderStyle,
    #[serde(default)]
    pub border_bottom: BorderStyle,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell {
            value: value.into(),
            ..Cell::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }
}

impl Worksheet {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// セル値 (範囲外は空文字)
    pub fn value(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|c| c.value.as_str())
            .unwrap_or("")
    }

    /// 行のセル値列 (trim済み文字列)
    pub fn row_values(&self, row: usize) -> Vec<String> {
        self.rows
            .get(row)
            .map(|r| r.iter().map(|c| c.value.trim().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn row_is_blank(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map(|r| r.iter().all(|c| c.value.trim().is_empty()))
            .unwrap_or(true)
    }
}

/// 1論理行 = 物理行 [start, end] の連続区間 (両端含む)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalRow {
    pub start: usize,
    pub end: usize,
}

/// 論理行境界の推定戦略
///
/// Excel側は罫線主導、罫線シグナルの薄いシートは空白行主導と、
/// 同じ問題への2つの実装を差し替えられるようにしておく。
pub trait RowSegmenter {
    /// データ領域 [data_start, data_end] を論理行の列に分割する
    fn segment(&self, sheet: &Worksheet, data_start: usize, data_end: usize) -> Vec<LogicalRow>;
}

/// 罫線主導の分割: 点線下罫線=論理行境界、実線下罫線=表の終端
pub struct BorderSegmenter;

impl BorderSegmenter {
    fn row_bottom(&self, sheet: &Worksheet, row: usize) -> (bool, bool) {
        let mut dotted = false;
        let mut solid = false;
        if let Some(cells) = sheet.rows.get(row) {
            for c in cells {
                if c.border_bottom.is_dotted() {
                    dotted = true;
                }
                if c.border_bottom.is_solid() {
                    solid = true;
                }
            }
        }
        (dotted, solid)
    }
}

impl RowSegmenter for BorderSegmenter {
    fn segment(&self, sheet: &Worksheet, data_start: usize, data_end: usize) -> Vec<LogicalRow> {
        let mut rows = Vec::new();
        let mut cur = data_start;
        for r in data_start..=data_end {
            let (dotted, solid) = self.row_bottom(sheet, r);
            if dotted || solid || r == data_end {
                if span_has_content(sheet, cur, r) {
                    rows.push(LogicalRow { start: cur, end: r });
                }
                cur = r + 1;
                // 閉じ実線 = 表の終端。以降のデータは見ない
                if solid {
                    break;
                }
            }
        }
        rows
    }
}

/// データ領域に点線罫線シグナルが存在するか (分割戦略の選択に使う)
pub fn has_dotted_signal(sheet: &Worksheet, data_start: usize, data_end: usize) -> bool {
    (data_start..=data_end).any(|r| {
        sheet
            .rows
            .get(r)
            .map(|cells| cells.iter().any(|c| c.border_bottom.is_dotted()))
            .unwrap_or(false)
    })
}

/// 空白行主導の分割 (罫線シグナルが使えないシート向けのフォールバック)
///
/// 空白行は暫定境界にすぎない。先読み範囲内に別の空白行・ヘッダー行・集計行が
/// 現れた場合のみ真の境界と確定する。確定できなければ行またぎ項目の一部として
/// 温存する (過分割よりも複数行項目の保全を優先する保守的判定)。
pub struct BlankRunSegmenter;

impl BlankRunSegmenter {
    fn boundary_confirmed(&self, sheet: &Worksheet, blank_row: usize, data_end: usize) -> bool {
        if blank_row >= data_end {
            return true;
        }
        let look_end = (blank_row + BLANK_CONFIRM_LOOKAHEAD).min(data_end);
        for r in blank_row + 1..=look_end {
            if sheet.row_is_blank(r) {
                return true;
            }
            let values = sheet.row_values(r);
            if header_score(&values) >= HEADER_MIN_HITS || row_has_summary(&values) {
                return true;
            }
        }
        false
    }
}

impl RowSegmenter for BlankRunSegmenter {
    fn segment(&self, sheet: &Worksheet, data_start: usize, data_end: usize) -> Vec<LogicalRow> {
        let mut rows = Vec::new();
        let mut cur = data_start;
        for r in data_start..=data_end {
            let close = (sheet.row_is_blank(r) && self.boundary_confirmed(sheet, r, data_end))
                || r == data_end;
            if close {
                push_trimmed(&mut rows, sheet, cur, r);
                cur = r + 1;
            }
        }
        rows
    }
}

fn span_has_content(sheet: &Worksheet, start: usize, end: usize) -> bool {
    (start..=end).any(|r| !sheet.row_is_blank(r))
}

/// 区間の前後の空白物理行を落としてから論理行として積む
fn push_trimmed(rows: &mut Vec<LogicalRow>, sheet: &Worksheet, start: usize, end: usize) {
    let mut s = start;
    let mut e = end;
    while s <= e && sheet.row_is_blank(s) {
        s += 1;
    }
    while e > s && sheet.row_is_blank(e) {
        e -= 1;
    }
    if s <= e && !sheet.row_is_blank(s) {
        rows.push(LogicalRow { start: s, end: e });
    }
}
