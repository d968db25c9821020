use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_CACHE_TTL_MINUTES;
use crate::models::ExtractionBundle;

/// キャッシュエントリ (成果物 + 期限・アクセス統計)
struct CacheEntry {
    bundle: ExtractionBundle,
    expires_at: DateTime<Utc>,
    access_count: u64,
    last_accessed: DateTime<Utc>,
}

/// 抽出結果のセッションキャッシュ
///
/// 同じドキュメントに対する複数回の照合呼び出しで再解析を避けるための
/// メモリ内キャッシュ。期限切れはアクセス時に除去する。
pub struct ExtractionCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_MINUTES)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub active_sessions: usize,
    pub expired_sessions: usize,
    pub total_sessions: usize,
    pub total_items_cached: usize,
    pub total_subtables_cached: usize,
}

impl ExtractionCache {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// 成果物を格納してセッションIDを発行する
    pub fn put(&self, bundle: ExtractionBundle) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        info!(
            "セッション {} を格納: PDF {}件 / Excel {}件 / PDF副表 {}件 / Excel副表 {}件",
            session_id,
            bundle.pdf_items.len(),
            bundle.excel_items.len(),
            bundle.pdf_subtables.len(),
            bundle.excel_subtables.len()
        );
        self.entries.insert(
            session_id.clone(),
            CacheEntry {
                bundle,
                expires_at: now + self.ttl,
                access_count: 0,
                last_accessed: now,
            },
        );
        session_id
    }

    /// セッションIDから成果物を取り出す。期限切れならその場で除去して None
    pub fn get(&self, session_id: &str) -> Option<ExtractionBundle> {
        let now = Utc::now();
        let expired = match self.entries.get_mut(session_id) {
            None => {
                warn!("セッション {} は存在しません", session_id);
                return None;
            }
            Some(mut entry) => {
                if now <= entry.expires_at {
                    entry.access_count += 1;
                    entry.last_accessed = now;
                    return Some(entry.bundle.clone());
                }
                true
            }
        };
        if expired {
            warn!("セッション {} は期限切れです", session_id);
            self.entries.remove(session_id);
        }
        None
    }

    /// セッションの期限を延長する (現在の期限より短くはしない)
    pub fn extend(&self, session_id: &str, additional_minutes: i64) -> bool {
        let Some(mut entry) = self.entries.get_mut(session_id) else {
            return false;
        };
        let candidate = Utc::now() + Duration::minutes(additional_minutes);
        if candidate > entry.expires_at {
            entry.expires_at = candidate;
        }
        info!("セッション {} を {}分延長", session_id, additional_minutes);
        true
    }

    /// セッションを明示的に破棄する
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.entries.remove(session_id).is_some();
        if removed {
            info!("セッション {} を破棄", session_id);
        }
        removed
    }

    /// 期限切れセッションを一括除去し、除去数を返す
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| now <= e.expires_at);
        let purged = before - self.entries.len();
        if purged > 0 {
            info!("期限切れセッション {}件を除去", purged);
        }
        purged
    }

    /// キャッシュ統計
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let mut stats = CacheStats {
            active_sessions: 0,
            expired_sessions: 0,
            total_sessions: 0,
            total_items_cached: 0,
            total_subtables_cached: 0,
        };
        for entry in self.entries.iter() {
            stats.total_sessions += 1;
            if now <= entry.expires_at {
                stats.active_sessions += 1;
                stats.total_items_cached +=
                    entry.bundle.pdf_items.len() + entry.bundle.excel_items.len();
                stats.total_subtables_cached +=
                    entry.bundle.pdf_subtables.len() + entry.bundle.excel_subtables.len();
            } else {
                stats.expired_sessions += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemSource, LineItem};

    fn bundle() -> ExtractionBundle {
        ExtractionBundle {
            pdf_items: vec![LineItem::new("土工", ItemSource::Pdf)],
            excel_items: vec![LineItem::new("土工", ItemSource::Excel)],
            pdf_subtables: vec![],
            excel_subtables: vec![],
        }
    }

    #[test]
    fn put_and_get_roundtrip() {
        let cache = ExtractionCache::new(30);
        let id = cache.put(bundle());
        let got = cache.get(&id).expect("session should exist");
        assert_eq!(got.pdf_items[0].item_key, "土工");
        assert!(cache.get("no-such-session").is_none());
    }

    #[test]
    fn expired_session_is_removed_on_access() {
        let cache = ExtractionCache::new(-1);
        let id = cache.put(bundle());
        assert!(cache.get(&id).is_none());
        assert_eq!(cache.stats().total_sessions, 0);
    }

    #[test]
    fn extend_keeps_longer_deadline() {
        let cache = ExtractionCache::new(-1);
        let id = cache.put(bundle());
        assert!(cache.extend(&id, 30));
        assert!(cache.get(&id).is_some());
    }

    #[test]
    fn purge_and_stats() {
        let cache = ExtractionCache::new(-1);
        cache.put(bundle());
        cache.put(bundle());
        assert_eq!(cache.stats().expired_sessions, 2);
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.stats().total_sessions, 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let cache = ExtractionCache::new(30);
        let id = cache.put(bundle());
        assert!(cache.remove(&id));
        assert!(!cache.remove(&id));
    }
}
