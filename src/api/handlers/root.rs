use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::api::state::AppState;

#[derive(Serialize)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub status: String,
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Sojourn API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Property booking backend with provider-verified payments",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "api": "/api",
            "users": "/api/users",
            "listings": "/api/listings",
            "bookings": "/api/bookings",
            "payments_webhook": "/api/payments/webhook"
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1")
        .execute(&state.service_context.db_pool)
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            "unreachable"
        }
    };

    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database == "ok" { "ok" } else { "degraded" },
            "database": database,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

pub async fn api_info() -> impl IntoResponse {
    Json(ApiInfo {
        name: "Sojourn API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Property booking backend with provider-verified payments".to_string(),
        status: "operational".to_string(),
    })
}
