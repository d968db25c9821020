use indexmap::IndexMap;

use crate::models::LineItem;

/// 1行ぶんの抽出済みフィールド (抽出器が列対応を解決した後の形)
#[derive(Debug, Default, Clone)]
pub(crate) struct RowFields {
    /// 識別情報 (名称・規格等を結合済み)。空なら識別情報なしの行
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub raw_fields: IndexMap<String, String>,
}

impl RowFields {
    pub fn has_identity(&self) -> bool {
        !self.name.trim().is_empty() || !self.raw_fields.is_empty()
    }

    pub fn has_measure(&self) -> bool {
        self.quantity.is_some() || self.unit.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_identity() && !self.has_measure()
    }
}

/// 単一ペンディング枠の行結合ステートマシン
///
/// 「最後に排出した項目を後から書き換える」のではなく、補完待ち項目を
/// `Option<LineItem>` として明示的に持ち回り、確定時に排出する。
/// これにより補完待ちが同時に2件存在しないことが構造的に保証される。
pub(crate) struct PendingMerger {
    items: Vec<LineItem>,
    pending: Option<LineItem>,
    /// 補完行が名称断片を伴う場合に空白連結するか (副表の2〜3行またぎ用)
    name_continuation: bool,
    /// 補完を許す最大行間隔。None なら無制限 (本表用)
    lookahead: Option<usize>,
    rows_since_pending: usize,
}

impl PendingMerger {
    pub fn new(name_continuation: bool, lookahead: Option<usize>) -> Self {
        Self {
            items: Vec::new(),
            pending: None,
            name_continuation,
            lookahead,
            rows_since_pending: 0,
        }
    }

    /// 1行を投入する。`template` は出所・ページ番号等を埋めた雛形
    pub fn push(&mut self, row: RowFields, template: &LineItem) {
        if row.is_empty() {
            self.bump_distance();
            return;
        }

        let identity = !row.name.trim().is_empty();
        let has_qty = row.quantity.is_some();

        if identity && has_qty {
            if self.name_continuation && self.pending.is_some() {
                // 名称断片つきの補完行: 補完待ちの名称に空白連結して確定
                self.complete_pending(row);
            } else {
                // 完結行: 補完待ちはそのまま確定し、独立した項目を排出
                self.flush_pending();
                self.items.push(build_item(row, template));
            }
            return;
        }

        if identity {
            // 識別情報のみ → 新しい補完待ち (数量0)
            self.flush_pending();
            self.pending = Some(build_item(row, template));
            self.rows_since_pending = 0;
            return;
        }

        if row.has_measure() && self.pending.is_some() {
            // 数量/単位のみ → 直近の補完待ちだけが補完対象
            self.complete_pending(row);
            return;
        }

        self.bump_distance();
    }

    /// 補完待ちを確定する (数量・単位を設定し、未知の原文フィールドを併合)
    fn complete_pending(&mut self, row: RowFields) {
        let Some(mut item) = self.pending.take() else {
            return;
        };
        if let Some(q) = row.quantity {
            item.quantity = q;
        }
        if item.unit.is_none() {
            item.unit = row.unit;
        }
        if self.name_continuation && !row.name.trim().is_empty() {
            item.item_key = format!("{} {}", item.item_key, row.name.trim());
        }
        for (k, v) in row.raw_fields {
            item.raw_fields
                .entry(k)
                .and_modify(|cur| {
                    if !v.trim().is_empty() {
                        cur.push(' ');
                        cur.push_str(v.trim());
                    }
                })
                .or_insert(v);
        }
        self.items.push(item);
        self.rows_since_pending = 0;
    }

    /// 補完されないまま終わった補完待ちを数量0のまま排出
    fn flush_pending(&mut self) {
        if let Some(item) = self.pending.take() {
            self.items.push(item);
        }
        self.rows_since_pending = 0;
    }

    fn bump_distance(&mut self) {
        if self.pending.is_some() {
            self.rows_since_pending += 1;
            if let Some(limit) = self.lookahead {
                if self.rows_since_pending > limit {
                    self.flush_pending();
                }
            }
        }
    }

    /// 走査終了。残った補完待ちを確定して項目列を返す
    pub fn finish(mut self) -> Vec<LineItem> {
        self.flush_pending();
        self.items
    }
}

fn build_item(row: RowFields, template: &LineItem) -> LineItem {
    let mut item = template.clone();
    item.item_key = row.name.trim().to_string();
    item.quantity = row.quantity.unwrap_or(0.0);
    item.unit = row.unit;
    item.raw_fields = row.raw_fields;
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemSource, LineItem};

    fn template() -> LineItem {
        LineItem::new("", ItemSource::Pdf)
    }

    fn name_row(name: &str) -> RowFields {
        RowFields {
            name: name.to_string(),
            ..RowFields::default()
        }
    }

    fn qty_row(q: f64, unit: &str) -> RowFields {
        RowFields {
            quantity: Some(q),
            unit: Some(unit.to_string()),
            ..RowFields::default()
        }
    }

    #[test]
    fn name_then_quantity_merges_into_one_item() {
        let mut m = PendingMerger::new(false, None);
        m.push(name_row("土工"), &template());
        m.push(qty_row(10.0, "m3"), &template());
        let items = m.finish();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_key, "土工");
        assert_eq!(items[0].quantity, 10.0);
        assert_eq!(items[0].unit.as_deref(), Some("m3"));
    }

    #[test]
    fn only_most_recent_pending_is_completed() {
        let mut m = PendingMerger::new(false, None);
        m.push(name_row("A工"), &template());
        m.push(name_row("B工"), &template());
        m.push(name_row("C工"), &template());
        m.push(qty_row(5.0, "m"), &template());
        let items = m.finish();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].quantity, 0.0);
        assert_eq!(items[1].quantity, 0.0);
        assert_eq!(items[2].item_key, "C工");
        assert_eq!(items[2].quantity, 5.0);
    }

    #[test]
    fn complete_row_does_not_touch_pending() {
        let mut m = PendingMerger::new(false, None);
        m.push(name_row("A工"), &template());
        m.push(
            RowFields {
                name: "B工".to_string(),
                quantity: Some(3.0),
                unit: Some("式".to_string()),
                ..RowFields::default()
            },
            &template(),
        );
        let items = m.finish();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_key, "A工");
        assert_eq!(items[0].quantity, 0.0);
        assert_eq!(items[1].quantity, 3.0);
    }

    #[test]
    fn subtable_mode_joins_name_continuation() {
        let mut m = PendingMerger::new(true, Some(3));
        m.push(name_row("アスファルト"), &template());
        m.push(
            RowFields {
                name: "舗装".to_string(),
                quantity: Some(100.0),
                unit: Some("m2".to_string()),
                ..RowFields::default()
            },
            &template(),
        );
        let items = m.finish();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_key, "アスファルト 舗装");
        assert_eq!(items[0].quantity, 100.0);
    }

    #[test]
    fn lookahead_limit_flushes_stale_pending() {
        let mut m = PendingMerger::new(true, Some(1));
        m.push(name_row("A工"), &template());
        m.push(RowFields::default(), &template());
        m.push(RowFields::default(), &template());
        m.push(qty_row(9.0, "m"), &template());
        let items = m.finish();
        // 2行空いた時点でペンディングは確定済み。数量行は補完先を持たない
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 0.0);
    }
}
