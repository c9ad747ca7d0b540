mod config;
mod database;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod store;
mod utils;
mod workflow;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::Config;
use database::{create_database_pool, run_migrations};
use handlers::equipment_audit as audit;
use services::EquipmentAuditService;
use state::AppState;
use store::PgAuditStore;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let db = create_database_pool(&config).await?;
    if config.run_migrations {
        run_migrations(&db).await?;
    }

    let addr = config.bind_addr();
    let service = EquipmentAuditService::new(Arc::new(PgAuditStore::new(db)));
    let app = create_router(AppState::new(service, config));

    log::info!("Equipment audit server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    let procedures = Router::new()
        // Queries
        .route("/list", get(audit::list))
        .route("/get", get(audit::get))
        .route("/listCounts", get(audit::list_counts))
        .route("/getSummary", get(audit::get_summary))
        // Audit lifecycle
        .route("/create", post(audit::create))
        .route("/update", post(audit::update))
        .route("/delete", post(audit::delete))
        .route("/start", post(audit::start))
        .route("/complete", post(audit::complete))
        .route("/cancel", post(audit::cancel))
        // Counting
        .route("/recordCount", post(audit::record_count))
        .route("/batchRecordCounts", post(audit::batch_record_counts))
        .route("/skipCount", post(audit::skip_count))
        .route("/verifyCount", post(audit::verify_count))
        // Adjustments
        .route("/approveAdjustment", post(audit::approve_adjustment))
        .route("/rejectAdjustment", post(audit::reject_adjustment))
        .route("/bulkApproveAdjustments", post(audit::bulk_approve_adjustments));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/organizations/:organization_id/equipmentAudit", procedures)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}
