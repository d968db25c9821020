use once_cell::sync::Lazy;
use regex::Regex;

/// 先頭の定型句「第N号」
static LEADING_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^第\d+号").unwrap());
/// 末尾の定型句「当り」「当たり」
static TRAILING_ATARI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(当り|当たり)$").unwrap());

/// 全角英数字・記号を半角へ折り畳む (全角空白は半角空白へ)
///
/// ×・φ・＊(→*)・読点・波ダッシュ等の寸法表記はそのまま残す。
pub fn fold_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// 項目名の正規化: 幅折り畳み → 小文字化 → 空白/結合記号「+」除去 → 定型句除去
///
/// 冪等: normalize_item(normalize_item(x)) == normalize_item(x)
pub fn normalize_item(key: &str) -> String {
    let folded = fold_width(key).to_lowercase();
    let compact: String = folded
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '+')
        .collect();
    strip_boilerplate(&compact)
}

/// 定型句を固定点まで剥がす (「第3号第4号…」のような多重定型句にも冪等)
fn strip_boilerplate(s: &str) -> String {
    let mut cur = s.to_string();
    loop {
        let without_lead = LEADING_REF.replace(&cur, "");
        let next = TRAILING_ATARI.replace(without_lead.as_ref(), "").into_owned();
        if next == cur {
            return cur;
        }
        cur = next;
    }
}

/// 項目名をトークン列に分割する (包含・重複判定用、表示用ではない)
///
/// 空白・中点・括弧を区切りとし、読点や×等の寸法記号はトークン内に残す。
pub fn tokenize_item_name(key: &str) -> Vec<String> {
    let folded = fold_width(key).to_lowercase().replace('+', " ");
    let stripped = strip_boilerplate(folded.trim());
    stripped
        .split(|c: char| c.is_whitespace() || matches!(c, '・' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 正規化後に完全一致しない限り「有意に異なる」とみなす
///
/// あいまい照合スコアがどれだけ高くても、この判定が真なら照合を棄却する。
pub fn are_items_significantly_different(a: &str, b: &str) -> bool {
    normalize_item(a) != normalize_item(b)
}

/// 単位の正規化: 幅折り畳み → 小文字化 → 同義語表で引き当て
///
/// 未知の単位は折り畳み済みの形でそのまま通す。
pub fn normalize_unit(u: &str) -> String {
    let folded = fold_width(u).to_lowercase();
    let compact: String = folded.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.as_str() {
        "m2" | "m^2" | "m²" | "㎡" | "平方メートル" | "平米" => "㎡".to_string(),
        "m3" | "m^3" | "m³" | "㎥" | "立方メートル" | "立米" => "㎥".to_string(),
        "ℓ" | "リットル" => "l".to_string(),
        "㎏" | "キログラム" => "kg".to_string(),
        "トン" => "t".to_string(),
        _ => compact,
    }
}

/// 数量セルの解析: 幅折り畳み後、桁区切りカンマと空白を除いて f64 へ
pub fn parse_quantity(s: &str) -> Option<f64> {
    let folded = fold_width(s);
    let cleaned: String = folded
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}
