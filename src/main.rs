//! Org-chart Backend
//!
//! REST backend for the HR module: employee and department records in SQLite,
//! org-chart and department hierarchies built on demand, and a Tantivy-backed
//! employee directory.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod hierarchy;
mod models;
mod search;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // RUST_LOG takes precedence over the configured level
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Org-chart Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_key.is_none() {
        tracing::warn!(
            "No API key configured ({}). Authentication is disabled!",
            config::ENV_API_KEY
        );
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    tracing::info!("Building directory index...");
    let snapshot = repo.get_datastore().await?;
    search
        .rebuild(&snapshot.employees, &snapshot.departments)
        .await?;
    tracing::info!(
        employees = snapshot.employees.len(),
        departments = snapshot.departments.len(),
        revision_id = snapshot.revision_id,
        "Datastore loaded"
    );

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_key = state.config.api_key.clone();

    let api_routes = Router::new()
        // Datastore
        .route("/datastore", get(api::get_datastore))
        .route("/datastore/revision", get(api::get_revision))
        // Employees
        .route(
            "/employees",
            get(api::list_employees).post(api::create_employee),
        )
        .route(
            "/employees/{id}",
            get(api::get_employee)
                .put(api::update_employee)
                .delete(api::delete_employee),
        )
        // Departments
        .route(
            "/departments",
            get(api::list_departments).post(api::create_department),
        )
        .route(
            "/departments/{id}",
            get(api::get_department)
                .put(api::update_department)
                .delete(api::delete_department),
        )
        // Hierarchy
        .route("/hierarchy", get(api::get_hierarchy))
        .route("/hierarchy/stats", get(api::get_hierarchy_stats))
        .route("/hierarchy/root", get(api::get_hierarchy_root))
        .route("/hierarchy/bootstrap", post(api::bootstrap_hierarchy))
        // Directory search
        .route("/search", get(api::search_employees))
        .layer(middleware::from_fn(move |req, next| {
            auth::api_key_layer(api_key.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
