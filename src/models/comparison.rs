use serde::{Deserialize, Serialize};

use super::LineItem;

/// 照合結果の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonStatus {
    Ok,
    QuantityMismatch,
    UnitMismatch,
    NameMismatch,
    Missing,
    Extra,
}

/// 結果が本表由来か副表由来か
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    #[serde(rename = "Main Table")]
    Main,
    #[serde(rename = "Sub Table")]
    Sub,
}

/// 1ペアの照合結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult<T> {
    pub status: ComparisonStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_item: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excel_item: Option<T>,
    /// 0.0〜1.0。完全一致=1.0、重複なし=0.0
    pub match_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_difference: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_mismatch: Option<bool>,
    #[serde(rename = "type")]
    pub table_kind: TableKind,
}

/// 本表照合のサマリー (結果列 + 集計)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub results: Vec<ComparisonResult<LineItem>>,
    pub total_pdf_items: usize,
    pub total_excel_items: usize,
    pub matched: usize,
    pub quantity_mismatches: usize,
    pub unit_mismatches: usize,
    pub name_mismatches: usize,
    pub missing: usize,
    pub extra: usize,
}

impl ComparisonSummary {
    /// 結果列から集計を組み立てる
    pub fn from_results(
        results: Vec<ComparisonResult<LineItem>>,
        total_pdf_items: usize,
        total_excel_items: usize,
    ) -> Self {
        let count = |s: ComparisonStatus| results.iter().filter(|r| r.status == s).count();
        Self {
            matched: count(ComparisonStatus::Ok),
            quantity_mismatches: count(ComparisonStatus::QuantityMismatch),
            unit_mismatches: count(ComparisonStatus::UnitMismatch),
            name_mismatches: count(ComparisonStatus::NameMismatch),
            missing: count(ComparisonStatus::Missing),
            extra: count(ComparisonStatus::Extra),
            total_pdf_items,
            total_excel_items,
            results,
        }
    }
}

/// NAME_MISMATCH の部分一致分類
///
/// カテゴリ2 = PDF側全トークンがExcel名称に含まれる / カテゴリ3 = 一部のみ含まれる
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameMismatchDetail {
    pub pdf_item_name: String,
    pub excel_item_name: String,
    pub category: u8,
    #[serde(rename = "type")]
    pub table_kind: TableKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemSource, LineItem};

    #[test]
    fn summary_roundtrips_through_json() {
        let result = ComparisonResult {
            status: ComparisonStatus::Missing,
            pdf_item: Some(LineItem::new("土工", ItemSource::Pdf)),
            excel_item: None,
            match_confidence: 0.0,
            quantity_difference: None,
            unit_mismatch: None,
            table_kind: TableKind::Main,
        };
        let summary = ComparisonSummary::from_results(vec![result], 1, 0);
        let json = serde_json::to_string(&summary).unwrap();
        let back: ComparisonSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.results.len(), 1);
        assert_eq!(back.results[0].status, ComparisonStatus::Missing);
        assert!(back.results[0].excel_item.is_none());
        assert_eq!(back.missing, 1);
    }

    #[test]
    fn absent_item_fields_deserialize_as_none() {
        let json = r#"{"status":"EXTRA","match_confidence":0.0,"type":"Main Table"}"#;
        let r: ComparisonResult<LineItem> = serde_json::from_str(json).unwrap();
        assert_eq!(r.status, ComparisonStatus::Extra);
        assert!(r.pdf_item.is_none());
        assert!(r.excel_item.is_none());
        assert_eq!(r.quantity_difference, None);
    }
}
