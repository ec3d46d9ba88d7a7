use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;

/// GET / - service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "LexCase API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Case management backend for law firms",
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/login, /auth/register (public - token acquisition)",
                "session": "/api/auth/me, /api/auth/password, /api/auth/refresh",
                "users": "/api/users[/:id] (admin)",
                "clients": "/api/clients[/:id]",
                "cases": "/api/cases[/:id], /api/cases/:id/{status,hearings,documents}",
                "hearings": "/api/hearings[/:id], /api/hearings/:id/adjourn",
                "invoices": "/api/invoices[/:id], /api/invoices/:id/{status,pay}",
                "documents": "/api/documents[/:id], /api/documents/:id/content",
                "dashboard": "/api/dashboard",
                "find": "/api/find/:resource"
            }
        }
    }))
}

/// GET /health - liveness plus database reachability
pub async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            let detail = if is_development!() { Some(e.to_string()) } else { None };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable",
                        "detail": detail
                    }
                })),
            )
        }
    }
}
