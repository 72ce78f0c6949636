pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod ports;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use crate::config::{Config, Environment};
use crate::middleware::{expose_error_detail, request_logger_middleware, RequestLogSettings};
use crate::openapi::ApiDoc;
use crate::ports::SaccoStore;
use crate::services::{CallbackStore, ReconciliationEngine, RetryService, TransactionLocator};

#[derive(Clone)]
pub struct AppState {
    pub callbacks: CallbackStore,
    pub engine: ReconciliationEngine,
    pub locator: TransactionLocator,
    pub retries: RetryService,
    pub service_name: Arc<str>,
    pub environment: Environment,
    pub log_settings: RequestLogSettings,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn SaccoStore>, config: &Config) -> Self {
        Self {
            callbacks: CallbackStore::new(store.clone()),
            engine: ReconciliationEngine::new(store.clone(), config.notification_failure_policy),
            locator: TransactionLocator::new(store.clone()),
            retries: RetryService::new(store),
            service_name: Arc::from(config.service_name.as_str()),
            environment: config.environment,
            log_settings: RequestLogSettings {
                log_body: config.log_request_body,
            },
            started_at: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let environment = state.environment;
    let log_settings = state.log_settings;

    Router::new()
        .route("/momo-callback", post(handlers::callback::momo_callback))
        .route(
            "/payment-status/:transaction_id",
            get(handlers::payments::payment_status),
        )
        .route(
            "/retry-payment/:transaction_id",
            post(handlers::payments::retry_payment),
        )
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            environment,
            expose_error_detail,
        ))
        .layer(axum::middleware::from_fn_with_state(
            log_settings,
            request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
