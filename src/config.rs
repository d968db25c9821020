use serde::{Deserialize, Serialize};

/// あいまい照合を候補とみなす最小 Levenshtein 比率
pub const MIN_FUZZY_CONFIDENCE: f64 = 0.8;
/// 数量差をミスマッチとみなす閾値
pub const QUANTITY_EPSILON: f64 = 0.001;
/// 副表の終端とみなす連続空白行数
pub const BLANK_ROW_RUN: usize = 3;
/// ヘッダー行を探索する先頭行数
pub const HEADER_SCAN_ROWS: usize = 10;
/// 参照番号の直後にヘッダーを探す最大行数
pub const SUBTABLE_HEADER_LOOKAHEAD: usize = 5;
/// 名称行を数量行で補完できる最大行間隔
pub const COMPLETION_LOOKAHEAD: usize = 3;
/// セル結合による列ずれを許容する隣接列数
pub const ADJACENT_COLUMN_SPAN: usize = 3;
/// 参照番号語彙の走査上限 (不正なドキュメントで走査が際限なく伸びないように)
pub const REFERENCE_SCAN_MAX_ROWS: usize = 3000;
pub const REFERENCE_SCAN_MAX_COLS: usize = 25;
/// 標準様式の本工事内訳書の論理行数
pub const EXPECTED_LOGICAL_ROWS: usize = 15;
/// 空白行を境界と確定するための先読み行数
pub const BLANK_CONFIRM_LOOKAHEAD: usize = 3;
/// セッションキャッシュの既定TTL (分)
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 30;

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            cache: CacheConfig {
                ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            },
        }
    }
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            cache: CacheConfig {
                ttl_minutes: std::env::var("CACHE_TTL_MINUTES")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(DEFAULT_CACHE_TTL_MINUTES),
            },
        }
    }
}
