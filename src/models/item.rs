use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 項目の出所 (PDF=発注者側内訳書 / Excel=受注者側見積書)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemSource {
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "Excel")]
    Excel,
}

/// 内訳書の1論理行
///
/// `quantity == 0.0` かつ数量欄が原文で空白の項目は「補完待ち」を意味し、
/// 抽出1パス中に同時に存在できる補完待ち項目は高々1件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// 表示用の正準名称。排出後は非空・非空白を保証する
    pub item_key: String,
    /// 認識済みヘッダー列名 → 原文テキスト (ヘッダーに無い列名は入らない)
    #[serde(default)]
    pub raw_fields: IndexMap<String, String>,
    /// 数量。0.0 は「未確定または0」
    #[serde(default)]
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub source: ItemSource,
    /// PDF側のみ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Excel本表のみ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_number: Option<u32>,
}

impl LineItem {
    pub fn new(item_key: impl Into<String>, source: ItemSource) -> Self {
        Self {
            item_key: item_key.into(),
            raw_fields: IndexMap::new(),
            quantity: 0.0,
            unit: None,
            source,
            page_number: None,
            logical_line_number: None,
            table_number: None,
        }
    }

    /// 数量欄が原文で空白だったか
    ///
    /// キーはヘッダーセルの原文なので、「数　量」のような間延びした表記を
    /// 幅折り畳み + 空白除去してから照合する。
    pub fn quantity_is_blank(&self) -> bool {
        self.quantity == 0.0
            && !self.raw_fields.iter().any(|(k, v)| {
                let key: String = crate::normalize::fold_width(k)
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                key.contains("数量") && !v.trim().is_empty()
            })
    }
}

/// 参照番号で本表の行に紐づく副表 (明細書) の1行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtableItem {
    #[serde(flatten)]
    pub item: LineItem,
    /// 「単3号」「第3号明」のような参照コード。必須
    pub reference_number: String,
    /// Excel側のみ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

/// 1回の抽出セッションの成果物一式 (キャッシュに格納する単位)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionBundle {
    pub pdf_items: Vec<LineItem>,
    pub excel_items: Vec<LineItem>,
    pub pdf_subtables: Vec<SubtableItem>,
    pub excel_subtables: Vec<SubtableItem>,
}

/// 照合で名称を参照するための共通アクセサ
pub trait HasItemKey {
    fn item_key(&self) -> &str;
}

impl HasItemKey for LineItem {
    fn item_key(&self) -> &str {
        &self.item_key
    }
}

impl HasItemKey for SubtableItem {
    fn item_key(&self) -> &str {
        &self.item.item_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaced_quantity_header_marks_quantity_present() {
        // 「数　量」ヘッダー下の明示的な0は空白扱いにしない
        let mut item = LineItem::new("残土処分", ItemSource::Pdf);
        item.raw_fields.insert("数　量".to_string(), "0".to_string());
        assert!(!item.quantity_is_blank());
    }

    #[test]
    fn empty_quantity_cell_is_blank() {
        let item = LineItem::new("残土処分", ItemSource::Pdf);
        assert!(item.quantity_is_blank());

        let mut with_remarks = LineItem::new("残土処分", ItemSource::Pdf);
        with_remarks
            .raw_fields
            .insert("摘要".to_string(), "単1号".to_string());
        assert!(with_remarks.quantity_is_blank());
    }
}
