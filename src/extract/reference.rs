use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::fold_width;

/// 標準形「単3号」: 接頭1文字 + 数字 + 号
static REF_STANDARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\p{Han}々])\s*(\d+)\s*号").unwrap());
/// 第付き形「第3号明」: 第 + 数字 + 号 + 末尾タグ1文字 (PDF側の地域様式)。
/// セル全体がこの形のときだけ認める (「第1号様式」のような定型句は参照ではない)
static REF_TAGGED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:第)?(\d+)号([\p{Han}々])$").unwrap());
/// 数字の欠けた参照コード片 (「単号」「第号」など) — 行単位で読み飛ばす
static REF_MALFORMED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:第[\p{Han}々]?|[\p{Han}々])号$").unwrap());

/// 認識された参照コード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    /// 原文どおりの表示形 (幅折り畳み・空白除去後)。例: 単3号 / 第3号明
    pub display: String,
    /// 接頭 (タグ) 文字。第付き形では末尾タグがこれに当たる
    pub prefix: char,
    pub number: u32,
}

impl ReferenceToken {
    /// グループ化用の正準キー。第N号X と XN号 は同じキーに落ちる
    pub fn canonical_key(&self) -> String {
        format!("{}{}号", self.prefix, self.number)
    }
}

/// このドキュメントで実際に使われている参照接頭文字の集合
///
/// 接頭文字の慣習はドキュメントごとに異なるため、固定リストではなく
/// 本表の走査で発見した語彙を使う。
#[derive(Debug, Clone, Default)]
pub struct ReferenceVocabulary {
    prefixes: BTreeSet<char>,
}

impl ReferenceVocabulary {
    pub fn insert(&mut self, prefix: char) {
        self.prefixes.insert(prefix);
    }

    pub fn contains(&self, prefix: char) -> bool {
        self.prefixes.contains(&prefix)
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.prefixes.iter().copied()
    }
}

/// テキスト中の参照コードをすべて拾う (標準形 + 全文一致のみの第付き形)
pub fn find_references(text: &str) -> Vec<ReferenceToken> {
    let folded: String = fold_width(text).chars().filter(|c| !c.is_whitespace()).collect();
    let mut found = standard_references(&folded);

    if let Some(cap) = REF_TAGGED.captures(&folded) {
        if let (Ok(number), Some(tag)) = (cap[1].parse::<u32>(), cap[2].chars().next()) {
            let token = ReferenceToken {
                display: format!("第{}号{}", number, tag),
                prefix: tag,
                number,
            };
            // 標準形と同じ参照を二重に数えない
            if !found
                .iter()
                .any(|t| t.canonical_key() == token.canonical_key())
            {
                found.push(token);
            }
        }
    }

    found
}

/// 標準形「X+数字+号」だけを拾う (語彙発見パス用。第付き形の別名は扱わない)
pub fn find_standard_references(text: &str) -> Vec<ReferenceToken> {
    let folded: String = fold_width(text).chars().filter(|c| !c.is_whitespace()).collect();
    standard_references(&folded)
}

fn standard_references(folded: &str) -> Vec<ReferenceToken> {
    let mut found = Vec::new();
    for cap in REF_STANDARD.captures_iter(folded) {
        let prefix = match cap[1].chars().next() {
            Some(c) if c != '第' => c,
            _ => continue,
        };
        let number = match cap[2].parse::<u32>() {
            Ok(n) => n,
            Err(_) => continue,
        };
        found.push(ReferenceToken {
            display: format!("{}{}号", prefix, number),
            prefix,
            number,
        });
    }
    found
}

/// 数字の欠けた参照コード片か (MalformedReference: 該当行は読み飛ばす)
pub fn is_malformed_reference(cell: &str, vocab: Option<&ReferenceVocabulary>) -> bool {
    let folded: String = fold_width(cell).chars().filter(|c| !c.is_whitespace()).collect();
    if !REF_MALFORMED.is_match(&folded) {
        return false;
    }
    // 「第号」「第単号」は常に不正。単独の「X号」は語彙にある接頭文字のみ不正扱い
    if folded.starts_with('第') {
        return true;
    }
    match (folded.chars().next(), vocab) {
        (Some(c), Some(v)) => v.contains(c),
        _ => false,
    }
}

/// 内容が参照コードそのものだけか (副表側でこのような項目は捨てる)
pub fn is_reference_only(text: &str) -> bool {
    static REF_ONLY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:第)?[\p{Han}々]?\d+号[\p{Han}々]?$").unwrap());
    let folded: String = fold_width(text).chars().filter(|c| !c.is_whitespace()).collect();
    !folded.is_empty() && REF_ONLY.is_match(&folded)
}

/// 参照コードのグループ化キー。地域様式の別名規則を1つだけ持つ:
/// 「第N号X」(第は省略可、Xはタグ1文字) は「XN号」と同一視する。
/// それ以外の形はそのまま (接頭文字が違えば別グループ)。
pub fn canonical_reference_key(raw: &str) -> String {
    let folded: String = fold_width(raw).chars().filter(|c| !c.is_whitespace()).collect();

    static FULL_TAGGED: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:第)?(\d+)号([\p{Han}々])$").unwrap());
    static FULL_STANDARD: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([\p{Han}々])(\d+)号$").unwrap());

    if let Some(cap) = FULL_TAGGED.captures(&folded) {
        if let Ok(n) = cap[1].parse::<u32>() {
            return format!("{}{}号", &cap[2], n);
        }
    }
    if let Some(cap) = FULL_STANDARD.captures(&folded) {
        if let Ok(n) = cap[2].parse::<u32>() {
            return format!("{}{}号", &cap[1], n);
        }
    }
    folded
}
