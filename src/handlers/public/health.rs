// handlers/public/health.rs - Service root and health check

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;

/// GET / - Service name, version and route map
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "MSSP API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "MSSP back office: clients, contracts, hardware, financials and integrations",
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/login/:tenant, /auth/refresh (public - token acquisition)",
                "session": "/api/auth/whoami, /api/auth/password (protected)",
                "users": "/api/users[/:id] (protected - admin)",
                "clients": "/api/clients[/:id][/overview|/restore|/team] (protected)",
                "contracts": "/api/contracts[/:id][/renew|/scopes], /api/contracts/expiring (protected)",
                "scopes": "/api/scopes/:id[/saf] (protected)",
                "hardware": "/api/hardware[/:id][/history], /api/hardware/assignments[/:id][/return|/replace] (protected)",
                "financials": "/api/financials[/:id], /api/financials/summary, /api/financials/trend (protected)",
                "team": "/api/team/:id[/deactivate] (protected)",
                "dashboard": "/api/dashboard/* (protected)",
                "integrations": "/api/integrations/{sources,queries,data} (protected)",
            }
        }
    }))
}

/// GET /health - 200 when the system database answers, 503 otherwise
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
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                    }
                })),
            )
        }
    }
}
