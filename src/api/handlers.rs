use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ReconError;
use crate::extract::{GridDocument, Workbook};
use crate::models::{
    ComparisonResult, ComparisonSummary, ExtractionBundle, LineItem, NameMismatchDetail,
    SubtableItem,
};
use crate::service::{CacheStats, ExtractionCache, ExtractionParams, ExtractionService, Matcher};

/// 共有状態: 抽出・照合・キャッシュの3サービス
#[derive(Clone)]
pub struct AppState {
    pub extraction: Arc<ExtractionService>,
    pub matcher: Arc<Matcher>,
    pub cache: Arc<ExtractionCache>,
}

/// 抽出リクエスト: デジタイザが生成した両ドキュメント + 範囲指定
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub pdf_document: GridDocument,
    pub workbook: Workbook,
    #[serde(flatten)]
    pub params: ExtractionParams,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub message: String,
    pub session_id: Option<String>,
    pub pdf_items: usize,
    pub excel_items: usize,
    pub pdf_subtables: usize,
    pub excel_subtables: usize,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct CompareMainResponse {
    pub success: bool,
    pub message: String,
    pub summary: Option<ComparisonSummary>,
}

#[derive(Debug, Serialize)]
pub struct CompareSubtablesResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<ComparisonResult<SubtableItem>>,
}

#[derive(Debug, Serialize)]
pub struct ExtraItemsResponse {
    pub success: bool,
    pub message: String,
    pub extra_items: Vec<ComparisonResult<LineItem>>,
}

/// ワンショット照合の応答 (キャッシュを経由しない)
#[derive(Debug, Serialize)]
pub struct CompareAllResponse {
    pub success: bool,
    pub message: String,
    pub summary: Option<ComparisonSummary>,
    pub subtable_results: Vec<ComparisonResult<SubtableItem>>,
    pub extra_items: Vec<ComparisonResult<LineItem>>,
    pub name_mismatches: Vec<NameMismatchDetail>,
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    /// 省略時は期限切れセッションの一括除去
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub success: bool,
    pub stats: CacheStats,
}

/// 健全性チェック
pub async fn health_check() -> &'static str {
    "OK"
}

fn error_status(e: &ReconError) -> StatusCode {
    if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// 抽出してセッションに格納する
pub async fn extract(State(state): State<AppState>, Json(req): Json<ExtractRequest>) -> Response {
    match state
        .extraction
        .extract_all(&req.pdf_document, &req.workbook, &req.params)
    {
        Ok(bundle) => {
            let counts = (
                bundle.pdf_items.len(),
                bundle.excel_items.len(),
                bundle.pdf_subtables.len(),
                bundle.excel_subtables.len(),
            );
            let session_id = state.cache.put(bundle);
            let response = ExtractResponse {
                success: true,
                message: format!("Extracted into session {}", session_id),
                session_id: Some(session_id),
                pdf_items: counts.0,
                excel_items: counts.1,
                pdf_subtables: counts.2,
                excel_subtables: counts.3,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = ExtractResponse {
                success: false,
                message: format!("Error: {}", e),
                session_id: None,
                pdf_items: 0,
                excel_items: 0,
                pdf_subtables: 0,
                excel_subtables: 0,
            };
            (error_status(&e), Json(response)).into_response()
        }
    }
}

fn load_session(state: &AppState, session_id: &str) -> Result<ExtractionBundle, ReconError> {
    state
        .cache
        .get(session_id)
        .ok_or_else(|| ReconError::SessionNotFound(session_id.to_string()))
}

/// 本表の照合 (セッション経由)
pub async fn compare_main(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Response {
    match load_session(&state, &req.session_id) {
        Ok(bundle) => {
            let summary = state
                .matcher
                .compare_main_tables(&bundle.pdf_items, &bundle.excel_items);
            let response = CompareMainResponse {
                success: true,
                message: format!("Compared {} result rows", summary.results.len()),
                summary: Some(summary),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = CompareMainResponse {
                success: false,
                message: format!("Error: {}", e),
                summary: None,
            };
            (error_status(&e), Json(response)).into_response()
        }
    }
}

/// 副表の照合 (セッション経由)
pub async fn compare_subtables(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Response {
    match load_session(&state, &req.session_id) {
        Ok(bundle) => {
            let results = state
                .matcher
                .compare_subtables(&bundle.pdf_subtables, &bundle.excel_subtables);
            let response = CompareSubtablesResponse {
                success: true,
                message: format!("Compared {} subtable rows", results.len()),
                results,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = CompareSubtablesResponse {
                success: false,
                message: format!("Error: {}", e),
                results: Vec::new(),
            };
            (error_status(&e), Json(response)).into_response()
        }
    }
}

/// 簡易余剰項目クエリ (セッション経由)
pub async fn compare_extra_items(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Response {
    match load_session(&state, &req.session_id) {
        Ok(bundle) => {
            let extra_items = state
                .matcher
                .extra_items_simplified(&bundle.pdf_items, &bundle.excel_items);
            let response = ExtraItemsResponse {
                success: true,
                message: format!("{} extra items", extra_items.len()),
                extra_items,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = ExtraItemsResponse {
                success: false,
                message: format!("Error: {}", e),
                extra_items: Vec::new(),
            };
            (error_status(&e), Json(response)).into_response()
        }
    }
}

/// ワンショット照合: 抽出から照合まで一括 (キャッシュ非経由)
pub async fn compare_all(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Response {
    match state
        .extraction
        .extract_all(&req.pdf_document, &req.workbook, &req.params)
    {
        Ok(bundle) => {
            let summary = state
                .matcher
                .compare_main_tables(&bundle.pdf_items, &bundle.excel_items);
            let subtable_results = state
                .matcher
                .compare_subtables(&bundle.pdf_subtables, &bundle.excel_subtables);
            let extra_items = state
                .matcher
                .extra_items_simplified(&bundle.pdf_items, &bundle.excel_items);
            let mut name_mismatches = state.matcher.name_mismatch_details(&summary.results);
            name_mismatches.extend(state.matcher.name_mismatch_details(&subtable_results));
            let response = CompareAllResponse {
                success: true,
                message: format!(
                    "Compared {} main rows, {} subtable rows",
                    summary.results.len(),
                    subtable_results.len()
                ),
                summary: Some(summary),
                subtable_results,
                extra_items,
                name_mismatches,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = CompareAllResponse {
                success: false,
                message: format!("Error: {}", e),
                summary: None,
                subtable_results: Vec::new(),
                extra_items: Vec::new(),
                name_mismatches: Vec::new(),
            };
            (error_status(&e), Json(response)).into_response()
        }
    }
}

/// キャッシュ統計
pub async fn cache_stats(State(state): State<AppState>) -> Response {
    let response = CacheStatsResponse {
        success: true,
        stats: state.cache.stats(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// キャッシュ掃除: セッション指定で破棄、省略で期限切れの一括除去
pub async fn cache_cleanup(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> Response {
    let removed = match &req.session_id {
        Some(id) => usize::from(state.cache.remove(id)),
        None => state.cache.purge_expired(),
    };
    let response = CleanupResponse {
        success: true,
        message: format!("Removed {} sessions", removed),
        removed,
    };
    (StatusCode::OK, Json(response)).into_response()
}
