use indexmap::IndexMap;

use crate::normalize::fold_width;

/// 項目行を構成するフィールド種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// 費目・工種・種別
    Classification,
    /// 名称
    Name,
    /// 規格・仕様
    Spec,
    /// 数量
    Quantity,
    /// 単位
    Unit,
    /// 単価
    UnitPrice,
    /// 金額
    Amount,
    /// 摘要・備考 (参照コードが入る)
    Remarks,
}

/// フィールドごとのヘッダー照合パターン (部分一致、幅・空白は無視)
const FIELD_PATTERNS: &[(Field, &[&str])] = &[
    (Field::Classification, &["費目", "工種", "種別"]),
    (Field::Name, &["名称"]),
    (Field::Spec, &["規格", "仕様"]),
    (Field::Quantity, &["数量"]),
    (Field::Unit, &["単位"]),
    (Field::UnitPrice, &["単価"]),
    (Field::Amount, &["金額"]),
    (Field::Remarks, &["摘要", "備考"]),
];

/// ヘッダー行と認定する最小キーワードヒット数
pub const HEADER_MIN_HITS: usize = 2;

/// 集計行キーワード (表・副表の終端判定)
const SUMMARY_KEYWORDS: &[&str] = &["合計", "小計", "総計", "計"];

/// ヘッダーセル照合用の正規化 (幅折り畳み + 空白除去のみ、定型句は剥がさない)
fn canon_header(s: &str) -> String {
    fold_width(s)
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// 1セルがどのフィールドのヘッダーかを判定
fn match_field(cell: &str) -> Option<Field> {
    let canon = canon_header(cell);
    if canon.is_empty() {
        return None;
    }
    for (field, patterns) in FIELD_PATTERNS {
        if patterns.iter().any(|p| canon.contains(p)) {
            return Some(*field);
        }
    }
    None
}

/// 行のヘッダーキーワードヒット数
pub fn header_score(row: &[String]) -> usize {
    row.iter().filter(|c| match_field(c).is_some()).count()
}

/// 先頭 `scan_limit` 行からヘッダー行を探す (ヒット数が閾値以上の最初の行)
pub fn find_header_row(rows: &[Vec<String>], scan_limit: usize) -> Option<usize> {
    rows.iter()
        .take(scan_limit)
        .position(|row| header_score(row) >= HEADER_MIN_HITS)
}

/// 集計行 (合計/小計/総計/計) かどうか
pub fn looks_like_summary(text: &str) -> bool {
    let canon = canon_header(text);
    SUMMARY_KEYWORDS.iter().any(|k| canon.starts_with(k))
}

/// 行全体に集計キーワードが現れるか
pub fn row_has_summary(row: &[String]) -> bool {
    row.iter().any(|c| looks_like_summary(c))
}

/// ヘッダー列の割り当て結果
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub index: usize,
    /// 実際のヘッダーセル文字列 (raw_fields のキーに使う)
    pub header: String,
}

/// フィールド → 列index の対応表。1つのヘッダー行から一度だけ構築する
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    entries: IndexMap<Field, ColumnRef>,
}

impl ColumnMap {
    /// ヘッダー行から列対応を構築。各フィールドは最初に合致した列を採用
    pub fn from_header(header: &[String]) -> Self {
        let mut entries: IndexMap<Field, ColumnRef> = IndexMap::new();
        for (idx, cell) in header.iter().enumerate() {
            if let Some(field) = match_field(cell) {
                entries.entry(field).or_insert(ColumnRef {
                    index: idx,
                    header: cell.trim().to_string(),
                });
            }
        }
        Self { entries }
    }

    pub fn get(&self, field: Field) -> Option<&ColumnRef> {
        self.entries.get(&field)
    }

    pub fn index_of(&self, field: Field) -> Option<usize> {
        self.entries.get(&field).map(|r| r.index)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.entries.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &ColumnRef)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_detection_requires_two_hits() {
        let rows = vec![
            row(&["本工事内訳書", "", ""]),
            row(&["数量", "", ""]),
            row(&["名称・規格", "数量", "単位", "摘要"]),
            row(&["土工", "10", "m3", ""]),
        ];
        assert_eq!(find_header_row(&rows, 10), Some(2));
    }

    #[test]
    fn header_matching_ignores_width_and_spacing() {
        let header = row(&["名 称", "数　量", "単位", "摘　要"]);
        let map = ColumnMap::from_header(&header);
        assert_eq!(map.index_of(Field::Name), Some(0));
        assert_eq!(map.index_of(Field::Quantity), Some(1));
        assert_eq!(map.index_of(Field::Unit), Some(2));
        assert_eq!(map.index_of(Field::Remarks), Some(3));
    }

    #[test]
    fn first_matching_column_wins() {
        let header = row(&["名称", "名称2", "数量"]);
        let map = ColumnMap::from_header(&header);
        assert_eq!(map.index_of(Field::Name), Some(0));
    }

    #[test]
    fn summary_rows() {
        assert!(looks_like_summary("合　計"));
        assert!(looks_like_summary("小計"));
        assert!(looks_like_summary("計"));
        assert!(!looks_like_summary("設計変更"));
        assert!(row_has_summary(&row(&["", "合計", "100"])));
    }
}
