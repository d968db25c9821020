use thiserror::Error;

/// 抽出・照合処理のエラー種別
///
/// 行・表レベルの不整合 (ヘッダー不検出、参照番号の欠落) はログして読み飛ばす
/// 方針のため、ここには現れない。ドキュメント/シートレベルの失敗のみ呼び出し元へ
/// 伝播する。
#[derive(Debug, Error)]
pub enum ReconError {
    /// ドキュメント自体が読めない (ページ0件、壊れた入力など)
    #[error("ドキュメントを読み込めません: {0}")]
    DocumentUnreadable(String),

    /// 指定シートが存在しない。利用可能なシート名を添えて返す
    #[error("シート '{requested}' が見つかりません (利用可能: {available:?})")]
    SheetNotFound {
        requested: String,
        available: Vec<String>,
    },

    /// ページ範囲の指定が不正
    #[error("ページ範囲が不正です: {start}〜{end}")]
    InvalidPageRange { start: u32, end: u32 },

    /// 解析は成功したが抽出項目が0件 (空の比較として黙って返してはならない)
    #[error("抽出項目が0件でした: {0}")]
    NoExtractableItems(String),

    /// キャッシュセッションが存在しないか期限切れ
    #[error("セッション '{0}' が見つからないか期限切れです")]
    SessionNotFound(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;

impl ReconError {
    /// 呼び出し側の入力起因エラーかどうか (HTTP層で 400/500 を分けるのに使う)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReconError::DocumentUnreadable(_)
                | ReconError::SheetNotFound { .. }
                | ReconError::InvalidPageRange { .. }
                | ReconError::NoExtractableItems(_)
                | ReconError::SessionNotFound(_)
        )
    }
}
