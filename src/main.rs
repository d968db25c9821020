use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tender_recon_rust::api::{self, AppState};
use tender_recon_rust::{AppConfig, ExtractionCache, ExtractionService, Matcher};
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログ初期化 - ローカル時刻フォーマット
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 設定読み込み
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // サービス構築
    let state = AppState {
        extraction: Arc::new(ExtractionService::new()),
        matcher: Arc::new(Matcher::new()),
        cache: Arc::new(ExtractionCache::new(config.cache.ttl_minutes)),
    };

    // ルーティング
    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/extract", post(api::extract))
        .route("/api/compare", post(api::compare_all))
        .route("/api/compare/main", post(api::compare_main))
        .route("/api/compare/subtables", post(api::compare_subtables))
        .route("/api/compare/extra-items", post(api::compare_extra_items))
        .route("/api/cache/stats", get(api::cache_stats))
        .route("/api/cache/cleanup", post(api::cache_cleanup))
        .layer(ServiceBuilder::new())
        .with_state(state);

    // サーバー起動
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/extract             - 抽出 + セッション格納");
    info!("  POST /api/compare             - ワンショット照合");
    info!("  POST /api/compare/main        - 本表照合");
    info!("  POST /api/compare/subtables   - 副表照合");
    info!("  POST /api/compare/extra-items - 簡易余剰項目");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
