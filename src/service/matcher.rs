use indexmap::IndexMap;
use strsim::normalized_levenshtein;
use tracing::{debug, info};

use crate::config::{MIN_FUZZY_CONFIDENCE, QUANTITY_EPSILON};
use crate::extract::canonical_reference_key;
use crate::models::{
    ComparisonResult, ComparisonStatus, ComparisonSummary, HasItemKey, LineItem,
    NameMismatchDetail, SubtableItem, TableKind,
};
use crate::normalize::{
    are_items_significantly_different, normalize_item, normalize_unit, tokenize_item_name,
};

/// 照合エンジン
///
/// 本表は位置整列 (両ドキュメントが同じ正準順で項目を並べる前提)、
/// 副表は参照コードでグループ化してから名前照合する。
pub struct Matcher;

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

/// 1ペアの評価結果
struct PairEval {
    exact: bool,
    overlap: bool,
    qty_mismatch: bool,
    qty_diff: Option<f64>,
    unit_mismatch: bool,
    confidence: f64,
}

impl Matcher {
    pub fn new() -> Self {
        Self
    }

    /// 本表の照合: index i 同士を比較する位置整列方式
    pub fn compare_main_tables(&self, pdf: &[LineItem], excel: &[LineItem]) -> ComparisonSummary {
        let mut results = Vec::with_capacity(pdf.len().max(excel.len()));

        for (p, e) in pdf.iter().zip(excel.iter()) {
            let eval = evaluate_pair(p, e);
            let status = if !eval.overlap {
                ComparisonStatus::Missing
            } else if eval.qty_mismatch {
                ComparisonStatus::QuantityMismatch
            } else if eval.unit_mismatch {
                ComparisonStatus::UnitMismatch
            } else if !eval.exact {
                ComparisonStatus::NameMismatch
            } else {
                ComparisonStatus::Ok
            };
            results.push(ComparisonResult {
                status,
                pdf_item: Some(p.clone()),
                excel_item: Some(e.clone()),
                match_confidence: eval.confidence,
                quantity_difference: eval.qty_diff,
                unit_mismatch: Some(eval.unit_mismatch),
                table_kind: TableKind::Main,
            });
        }

        // 長さの差: PDF側の余り = MISSING、Excel側の余り = EXTRA
        for p in pdf.iter().skip(excel.len()) {
            results.push(missing_result(Some(p.clone()), None, TableKind::Main));
        }
        for e in excel.iter().skip(pdf.len()) {
            results.push(extra_result(Some(e.clone()), TableKind::Main, 0.0));
        }

        let summary = ComparisonSummary::from_results(results, pdf.len(), excel.len());
        info!(
            "本表照合完了: 一致{} 数量差{} 単位差{} 名称差{} 欠落{} 余剰{}",
            summary.matched,
            summary.quantity_mismatches,
            summary.unit_mismatches,
            summary.name_mismatches,
            summary.missing,
            summary.extra
        );
        summary
    }

    /// 副表の照合: 正準参照キーでグループ化し、グループ内を
    /// 完全一致 → 全トークン包含 → 一部重複 の優先順位で突き合わせる
    pub fn compare_subtables(
        &self,
        pdf: &[SubtableItem],
        excel: &[SubtableItem],
    ) -> Vec<ComparisonResult<SubtableItem>> {
        // 挿入順を保ったグループ表 (PDF側 → Excel側のみのグループの順)
        let mut groups: IndexMap<String, (Vec<&SubtableItem>, Vec<&SubtableItem>)> =
            IndexMap::new();
        for p in pdf {
            groups
                .entry(canonical_reference_key(&p.reference_number))
                .or_default()
                .0
                .push(p);
        }
        for e in excel {
            groups
                .entry(canonical_reference_key(&e.reference_number))
                .or_default()
                .1
                .push(e);
        }

        let mut results = Vec::new();
        for (key, (ps, es)) in &groups {
            debug!("参照グループ {}: PDF {}件 / Excel {}件", key, ps.len(), es.len());
            let mut used = vec![false; es.len()];

            for p in ps {
                match find_in_group(&p.item.item_key, es, &used) {
                    Some(j) => {
                        used[j] = true;
                        let e = es[j];
                        let eval = evaluate_pair(&p.item, &e.item);
                        let status = if eval.qty_mismatch {
                            ComparisonStatus::QuantityMismatch
                        } else if eval.unit_mismatch {
                            ComparisonStatus::UnitMismatch
                        } else if !eval.exact {
                            ComparisonStatus::NameMismatch
                        } else {
                            ComparisonStatus::Ok
                        };
                        results.push(ComparisonResult {
                            status,
                            pdf_item: Some((*p).clone()),
                            excel_item: Some(e.clone()),
                            match_confidence: eval.confidence,
                            quantity_difference: eval.qty_diff,
                            unit_mismatch: Some(eval.unit_mismatch),
                            table_kind: TableKind::Sub,
                        });
                    }
                    None => {
                        // 表示用に同グループの未使用Excel項目を添える (消費はしない)
                        let context = es
                            .iter()
                            .enumerate()
                            .find(|(j, _)| !used[*j])
                            .map(|(_, e)| (*e).clone());
                        results.push(missing_result(
                            Some((*p).clone()),
                            context,
                            TableKind::Sub,
                        ));
                    }
                }
            }

            for (j, e) in es.iter().enumerate() {
                if !used[j] {
                    results.push(extra_result(Some((*e).clone()), TableKind::Sub, 0.0));
                }
            }
        }

        info!(
            "副表照合完了: {}グループ {}件",
            groups.len(),
            results.len()
        );
        results
    }

    /// 簡易余剰項目クエリ: 名前照合だけでPDF側に対応の無いExcel項目を列挙する
    ///
    /// あいまい照合 (Levenshtein 比率) は候補を出すだけで、正規化名が完全一致
    /// しない限り採用しない。寸法値だけが違う高類似名を同一視しないための拒否権。
    pub fn extra_items_simplified(
        &self,
        pdf: &[LineItem],
        excel: &[LineItem],
    ) -> Vec<ComparisonResult<LineItem>> {
        let mut used = vec![false; pdf.len()];
        let mut extras = Vec::new();

        for e in excel {
            let en = normalize_item(&e.item_key);

            if let Some(i) = pdf
                .iter()
                .enumerate()
                .position(|(i, p)| !used[i] && normalize_item(&p.item_key) == en)
            {
                used[i] = true;
                continue;
            }

            // あいまい候補 (原文キー同士の比率)
            let mut best: Option<(usize, f64)> = None;
            for (i, p) in pdf.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let ratio = normalized_levenshtein(&p.item_key, &e.item_key);
                if ratio >= MIN_FUZZY_CONFIDENCE
                    && best.map_or(true, |(_, b)| ratio > b)
                {
                    best = Some((i, ratio));
                }
            }

            if let Some((i, ratio)) = best {
                if !are_items_significantly_different(&pdf[i].item_key, &e.item_key) {
                    used[i] = true;
                    continue;
                }
                debug!(
                    "あいまい候補を棄却: '{}' / '{}' (比率 {:.2})",
                    pdf[i].item_key, e.item_key, ratio
                );
            }

            extras.push(extra_result(
                Some(e.clone()),
                TableKind::Main,
                best.map(|(_, r)| r).unwrap_or(0.0),
            ));
        }

        extras
    }

    /// NAME_MISMATCH の部分一致分類 (カテゴリ2 = 全トークン包含 / 3 = 一部重複)
    pub fn name_mismatch_details<T: HasItemKey>(
        &self,
        results: &[ComparisonResult<T>],
    ) -> Vec<NameMismatchDetail> {
        results
            .iter()
            .filter(|r| r.status == ComparisonStatus::NameMismatch)
            .filter_map(|r| {
                let p = r.pdf_item.as_ref()?;
                let e = r.excel_item.as_ref()?;
                let tokens = tokenize_item_name(p.item_key());
                let en = normalize_item(e.item_key());
                let cat2 =
                    !tokens.is_empty() && tokens.iter().all(|t| en.contains(t.as_str()));
                let cat3 = !cat2 && tokens.iter().any(|t| en.contains(t.as_str()));
                let category = if cat2 {
                    2
                } else if cat3 {
                    3
                } else {
                    return None;
                };
                Some(NameMismatchDetail {
                    pdf_item_name: p.item_key().to_string(),
                    excel_item_name: e.item_key().to_string(),
                    category,
                    table_kind: r.table_kind,
                })
            })
            .collect()
    }
}

/// グループ内照合の優先順位: 完全一致 → 全トークン包含 → 一部重複
fn find_in_group(pdf_key: &str, es: &[&SubtableItem], used: &[bool]) -> Option<usize> {
    let pn = normalize_item(pdf_key);
    let tokens = tokenize_item_name(pdf_key);

    let candidates = |pred: &dyn Fn(&str) -> bool| -> Option<usize> {
        es.iter()
            .enumerate()
            .find(|(j, e)| !used[*j] && pred(&e.item.item_key))
            .map(|(j, _)| j)
    };

    candidates(&|k| normalize_item(k) == pn)
        .or_else(|| {
            if tokens.is_empty() {
                return None;
            }
            candidates(&|k| {
                let en = normalize_item(k);
                tokens.iter().all(|t| en.contains(t.as_str()))
            })
        })
        .or_else(|| {
            candidates(&|k| {
                let en = normalize_item(k);
                tokens.iter().any(|t| en.contains(t.as_str()))
            })
        })
}

fn evaluate_pair(p: &LineItem, e: &LineItem) -> PairEval {
    let pn = normalize_item(&p.item_key);
    let en = normalize_item(&e.item_key);
    let tokens = tokenize_item_name(&p.item_key);

    let exact = pn == en;
    let subset = !tokens.is_empty() && tokens.iter().all(|t| en.contains(t.as_str()));
    let overlap = exact || tokens.iter().any(|t| en.contains(t.as_str()));

    // 空白感応の数量比較: 両側空白=強制ミスマッチ / PDFのみ空白=許容
    let p_blank = p.quantity_is_blank();
    let e_blank = e.quantity_is_blank();
    let (qty_mismatch, qty_diff) = if p_blank && e_blank {
        (true, None)
    } else if p_blank {
        (false, None)
    } else {
        let diff = (p.quantity - e.quantity).abs();
        (diff >= QUANTITY_EPSILON, Some(diff))
    };

    let unit_mismatch = normalize_unit(p.unit.as_deref().unwrap_or(""))
        != normalize_unit(e.unit.as_deref().unwrap_or(""));

    let confidence = if exact {
        1.0
    } else if subset {
        0.9
    } else if overlap {
        0.7
    } else {
        0.0
    };

    PairEval {
        exact,
        overlap,
        qty_mismatch,
        qty_diff: if qty_mismatch { qty_diff } else { None },
        unit_mismatch,
        confidence,
    }
}

fn missing_result<T>(
    pdf_item: Option<T>,
    excel_item: Option<T>,
    table_kind: TableKind,
) -> ComparisonResult<T> {
    ComparisonResult {
        status: ComparisonStatus::Missing,
        pdf_item,
        excel_item,
        match_confidence: 0.0,
        quantity_difference: None,
        unit_mismatch: None,
        table_kind,
    }
}

fn extra_result<T>(
    excel_item: Option<T>,
    table_kind: TableKind,
    confidence: f64,
) -> ComparisonResult<T> {
    ComparisonResult {
        status: ComparisonStatus::Extra,
        pdf_item: None,
        excel_item,
        match_confidence: confidence,
        quantity_difference: None,
        unit_mismatch: None,
        table_kind,
    }
}
